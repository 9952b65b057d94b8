// src/types.rs

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForesightError, ForesightResult};

/// Instant at which a sample was recorded or a forecast applies
pub type Timestamp = DateTime<Utc>;

/// A metric value (CPU %, disk %, node count)
pub type MetricValue = f64;

/// The cluster metrics the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricName {
    /// Node CPU utilization (percent)
    Cpu,
    /// Node filesystem utilization (percent)
    Disk,
    /// Number of nodes in the cluster
    NodeCount,
}

impl MetricName {
    /// Every metric, in flat-format column order
    pub const ALL: [MetricName; 3] = [MetricName::Cpu, MetricName::Disk, MetricName::NodeCount];

    /// Column header used by the flat export format
    pub fn column(&self) -> &'static str {
        match self {
            MetricName::Cpu => "CPU_Usage",
            MetricName::Disk => "Disk_Usage",
            MetricName::NodeCount => "Number_of_Nodes",
        }
    }

    /// Container Insights metric name in the monitoring namespace
    pub fn insights_metric(&self) -> &'static str {
        match self {
            MetricName::Cpu => "node_cpu_utilization",
            MetricName::Disk => "node_filesystem_utilization",
            MetricName::NodeCount => "cluster_node_count",
        }
    }

    /// Short query id used to correlate monitoring responses
    pub fn query_id(&self) -> &'static str {
        match self {
            MetricName::Cpu => "cpu",
            MetricName::Disk => "disk",
            MetricName::NodeCount => "nodes",
        }
    }

    /// Human-readable axis label
    pub fn unit_label(&self) -> &'static str {
        match self {
            MetricName::Cpu => "CPU Usage (%)",
            MetricName::Disk => "Disk Usage (%)",
            MetricName::NodeCount => "Nodes",
        }
    }

    pub fn from_query_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.query_id() == id)
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.column() == column)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_id())
    }
}

/// A single observation of one metric at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// When the value was recorded
    pub timestamp: Timestamp,
    /// Which metric this is
    pub metric_name: MetricName,
    /// The observed value
    pub value: MetricValue,
}

impl MetricSample {
    pub fn new(timestamp: Timestamp, metric_name: MetricName, value: MetricValue) -> Self {
        Self {
            timestamp,
            metric_name,
            value,
        }
    }
}

/// Inclusive time range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> ForesightResult<Self> {
        if end < start {
            return Err(ForesightError::config(format!(
                "Time range ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` leading up to `end`
    pub fn last_days(end: Timestamp, days: i64) -> Self {
        Self {
            start: end - Duration::days(days.max(0)),
            end,
        }
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// An ordered, fixed-cadence series of samples for a single metric.
///
/// Timestamps are strictly increasing and exactly `cadence` apart; the
/// constructor rejects anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    metric_name: MetricName,
    #[serde(with = "cadence_seconds")]
    cadence: Duration,
    samples: Vec<MetricSample>,
}

impl MetricSeries {
    pub fn new(
        metric_name: MetricName,
        cadence: Duration,
        samples: Vec<MetricSample>,
    ) -> ForesightResult<Self> {
        if cadence <= Duration::zero() {
            return Err(ForesightError::invalid_series("cadence must be positive"));
        }

        if let Some(stray) = samples.iter().find(|s| s.metric_name != metric_name) {
            return Err(ForesightError::invalid_series(format!(
                "sample for '{}' in a '{}' series",
                stray.metric_name, metric_name
            )));
        }

        for pair in samples.windows(2) {
            let gap = pair[1].timestamp - pair[0].timestamp;
            if gap <= Duration::zero() {
                return Err(ForesightError::invalid_series(format!(
                    "timestamps not strictly increasing at {}",
                    pair[1].timestamp
                )));
            }
            if gap != cadence {
                return Err(ForesightError::invalid_series(format!(
                    "gap of {}s at {} does not match cadence of {}s",
                    gap.num_seconds(),
                    pair[1].timestamp,
                    cadence.num_seconds()
                )));
            }
        }

        Ok(Self {
            metric_name,
            cadence,
            samples,
        })
    }

    /// Build a series from consecutive values starting at `start`
    pub fn from_values(
        metric_name: MetricName,
        start: Timestamp,
        cadence: Duration,
        values: &[MetricValue],
    ) -> ForesightResult<Self> {
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new(start + cadence * i as i32, metric_name, *v))
            .collect();
        Self::new(metric_name, cadence, samples)
    }

    pub fn metric_name(&self) -> MetricName {
        self.metric_name
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn values(&self) -> Vec<MetricValue> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&MetricSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&MetricSample> {
        self.samples.last()
    }

    /// The trailing `n` samples (or all of them if the series is shorter)
    pub fn tail(&self, n: usize) -> &[MetricSample] {
        let start = self.samples.len().saturating_sub(n);
        &self.samples[start..]
    }
}

/// A single predicted step with its uncertainty band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: Timestamp,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

impl ForecastPoint {
    pub fn is_ordered(&self) -> bool {
        self.p10 <= self.p50 && self.p50 <= self.p90
    }

    pub fn is_finite(&self) -> bool {
        self.p10.is_finite() && self.p50.is_finite() && self.p90.is_finite()
    }
}

/// Contiguous forecast steps following the last historical sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastHorizon {
    pub metric_name: MetricName,
    #[serde(with = "cadence_seconds")]
    pub cadence: Duration,
    /// Name of the model that produced the points
    pub model: String,
    pub points: Vec<ForecastPoint>,
}

impl ForecastHorizon {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Checks p10 <= p50 <= p90 on every point
    pub fn validate_ordering(&self) -> ForesightResult<()> {
        match self
            .points
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || !p.is_ordered())
        {
            Some((index, p)) => Err(ForesightError::InvalidQuantileOrdering {
                index,
                p10: p.p10,
                p50: p.p50,
                p90: p.p90,
            }),
            None => Ok(()),
        }
    }
}

/// Aggregate figures over a forecast horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Mean of the median forecast
    pub avg_p50: f64,
    /// Highest upper-band value
    pub peak_p90: f64,
}

/// Whether predicted load warrants capacity action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingRecommendation {
    /// True when at least one point's p90 exceeds the threshold
    pub flagged: bool,
    /// Points whose p90 exceeds the threshold, in horizon order
    pub breaching_points: Vec<ForecastPoint>,
    pub threshold: f64,
    pub summary_stats: SummaryStats,
}

/// Serde helper storing a chrono `Duration` as whole seconds
pub(crate) mod cadence_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(cadence: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(cadence.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(seconds))
    }
}
