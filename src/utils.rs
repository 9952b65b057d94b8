//! Utility functions for common operations

use chrono::{DurationRound, Duration, Utc};

use crate::types::{MetricName, MetricSample, MetricValue, TimeRange, Timestamp};

/// Samples for one metric spaced `cadence` apart, starting at `start`
pub fn spaced_samples(
    metric: MetricName,
    start: Timestamp,
    cadence: Duration,
    values: &[MetricValue],
) -> Vec<MetricSample> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| MetricSample::new(start + cadence * i as i32, metric, *value))
        .collect()
}

/// Hourly samples for one metric, starting at `start`
pub fn hourly_samples(metric: MetricName, start: Timestamp, values: &[MetricValue]) -> Vec<MetricSample> {
    spaced_samples(metric, start, Duration::hours(1), values)
}

/// `points` values moving linearly from `from` to `to`
pub fn linear_ramp(points: usize, from: f64, to: f64) -> Vec<MetricValue> {
    match points {
        0 => Vec::new(),
        1 => vec![from],
        _ => (0..points)
            .map(|i| from + (to - from) * i as f64 / (points - 1) as f64)
            .collect(),
    }
}

/// Truncate a timestamp to the start of its hour
pub fn floor_to_hour(timestamp: Timestamp) -> Timestamp {
    timestamp
        .duration_trunc(Duration::hours(1))
        .unwrap_or(timestamp)
}

/// Current time truncated to the hour
pub fn current_hour() -> Timestamp {
    floor_to_hour(Utc::now())
}

/// The range covering `days` up to the current hour
pub fn lookback_days(days: i64) -> TimeRange {
    TimeRange::last_days(current_hour(), days)
}
