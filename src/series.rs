//! Normalizes raw, irregular samples into fixed-cadence series.
//!
//! Samples are grouped per metric and bucketed onto a grid of
//! `range.start + k * cadence`. Each bucket covers `[g, g + cadence)`;
//! several samples in one bucket are averaged. Empty buckets carry the last
//! known value forward, or zero when nothing has been seen yet.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ForesightError, ForesightResult};
use crate::types::{MetricName, MetricSample, MetricSeries, MetricValue, TimeRange, Timestamp};

/// What to do when the source yields no samples at all
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum EmptySourceFallback {
    /// Fail with `EmptySource`
    #[default]
    Fail,
    /// Produce all-zero series for these metrics
    ZeroFill(Vec<MetricName>),
}

/// Groups and resamples raw samples onto a fixed grid
#[derive(Debug, Clone, Default)]
pub struct MetricSeriesBuilder {
    fallback: EmptySourceFallback,
}

impl MetricSeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure behaviour for an empty source
    pub fn with_fallback(mut self, fallback: EmptySourceFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Normalize `raw_samples` onto a `cadence` grid spanning `range`
    pub fn build(
        &self,
        raw_samples: &[MetricSample],
        cadence: Duration,
        range: TimeRange,
    ) -> ForesightResult<BTreeMap<MetricName, MetricSeries>> {
        let grid = grid_points(cadence, &range)?;

        if raw_samples.is_empty() {
            return match &self.fallback {
                EmptySourceFallback::Fail => Err(ForesightError::EmptySource),
                EmptySourceFallback::ZeroFill(metrics) => {
                    warn!(
                        metrics = metrics.len(),
                        "metric source is empty, zero-filling configured metrics"
                    );
                    metrics
                        .iter()
                        .map(|metric| {
                            fill_grid(*metric, cadence, &grid, &BTreeMap::new())
                                .map(|series| (*metric, series))
                        })
                        .collect()
                }
            };
        }

        let mut grouped: BTreeMap<MetricName, Vec<&MetricSample>> = BTreeMap::new();
        for sample in raw_samples {
            grouped.entry(sample.metric_name).or_default().push(sample);
        }

        let mut result = BTreeMap::new();
        for (metric, samples) in grouped {
            let buckets = bucket_means(&samples, cadence, &range);
            let dropped = samples.len() - buckets.values().map(|b| b.count).sum::<usize>();
            if dropped > 0 {
                debug!(%metric, dropped, "dropped samples outside the requested range");
            }

            let series = fill_grid(metric, cadence, &grid, &buckets)?;
            debug!(
                %metric,
                raw = samples.len(),
                points = series.len(),
                "normalized metric series"
            );
            result.insert(metric, series);
        }

        Ok(result)
    }
}

impl MetricSeries {
    /// Re-grid this series over `[first, last]` at `cadence`.
    ///
    /// Resampling a series onto its own cadence returns an identical series.
    pub fn resample(&self, cadence: Duration) -> ForesightResult<MetricSeries> {
        let (first, last) = match (self.first(), self.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp),
            _ => return MetricSeries::new(self.metric_name(), cadence, Vec::new()),
        };

        let range = TimeRange::new(first, last)?;
        let grid = grid_points(cadence, &range)?;
        let samples: Vec<&MetricSample> = self.samples().iter().collect();
        let buckets = bucket_means(&samples, cadence, &range);
        fill_grid(self.metric_name(), cadence, &grid, &buckets)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    sum: f64,
    count: usize,
}

impl Bucket {
    fn mean(&self) -> MetricValue {
        self.sum / self.count as f64
    }
}

fn grid_points(cadence: Duration, range: &TimeRange) -> ForesightResult<Vec<Timestamp>> {
    if cadence <= Duration::zero() {
        return Err(ForesightError::config("cadence must be positive"));
    }
    if range.end < range.start {
        return Err(ForesightError::config("time range ends before it starts"));
    }

    let mut grid = Vec::new();
    let mut point = range.start;
    while point <= range.end {
        grid.push(point);
        point += cadence;
    }
    Ok(grid)
}

/// Bucket index -> running mean accumulator, for samples inside `range`
fn bucket_means(
    samples: &[&MetricSample],
    cadence: Duration,
    range: &TimeRange,
) -> BTreeMap<i64, Bucket> {
    let step = cadence.num_milliseconds();
    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();

    for sample in samples {
        if !range.contains(sample.timestamp) {
            continue;
        }
        let offset = (sample.timestamp - range.start).num_milliseconds();
        let bucket = buckets.entry(offset / step).or_default();
        bucket.sum += sample.value;
        bucket.count += 1;
    }

    buckets
}

fn fill_grid(
    metric: MetricName,
    cadence: Duration,
    grid: &[Timestamp],
    buckets: &BTreeMap<i64, Bucket>,
) -> ForesightResult<MetricSeries> {
    let mut last_seen: Option<MetricValue> = None;
    let samples = grid
        .iter()
        .enumerate()
        .map(|(index, timestamp)| {
            let value = match buckets.get(&(index as i64)) {
                Some(bucket) => {
                    let mean = bucket.mean();
                    last_seen = Some(mean);
                    mean
                }
                None => last_seen.unwrap_or(0.0),
            };
            MetricSample::new(*timestamp, metric, value)
        })
        .collect();

    MetricSeries::new(metric, cadence, samples)
}
