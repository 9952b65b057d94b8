// src/source.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ForesightError, ForesightResult};
use crate::types::{MetricName, MetricSample, TimeRange, Timestamp};

/// Monitoring namespace holding EKS Container Insights metrics
pub const CONTAINER_INSIGHTS_NAMESPACE: &str = "ContainerInsights";

/// Aggregation period used by the default queries (one hour)
pub const DEFAULT_PERIOD_SECONDS: u32 = 3600;

/// Statistic applied over each aggregation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Sum,
    Minimum,
    Maximum,
    SampleCount,
}

/// Order in which datapoints are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanOrder {
    TimestampAscending,
    TimestampDescending,
}

/// A name/value pair narrowing a metric (e.g. `ClusterName`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

/// Fully qualified metric identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricIdentity {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
}

/// What to aggregate and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricStat {
    pub metric: MetricIdentity,
    pub period_seconds: u32,
    pub stat: Statistic,
}

/// One query in a batch; `id` correlates it with its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDataQuery {
    pub id: String,
    pub metric_stat: MetricStat,
}

/// A batch metric-data request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDataRequest {
    pub queries: Vec<MetricDataQuery>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub scan_by: ScanOrder,
}

impl MetricDataRequest {
    /// CPU, filesystem and node-count queries for one EKS cluster
    pub fn container_insights(cluster_name: &str, range: TimeRange, period_seconds: u32) -> Self {
        let queries = MetricName::ALL
            .iter()
            .map(|metric| MetricDataQuery {
                id: metric.query_id().to_string(),
                metric_stat: MetricStat {
                    metric: MetricIdentity {
                        namespace: CONTAINER_INSIGHTS_NAMESPACE.to_string(),
                        metric_name: metric.insights_metric().to_string(),
                        dimensions: vec![Dimension {
                            name: "ClusterName".to_string(),
                            value: cluster_name.to_string(),
                        }],
                    },
                    period_seconds,
                    stat: Statistic::Average,
                },
            })
            .collect();

        Self {
            queries,
            start_time: range.start,
            end_time: range.end,
            scan_by: ScanOrder::TimestampAscending,
        }
    }

    pub fn range(&self) -> ForesightResult<TimeRange> {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// Values for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDataResult {
    pub id: String,
    pub timestamps: Vec<Timestamp>,
    pub values: Vec<f64>,
}

/// Response to a [`MetricDataRequest`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDataResponse {
    pub results: Vec<MetricDataResult>,
}

impl MetricDataResponse {
    /// Flatten every result into samples, mapping query ids to metrics
    pub fn into_samples(self) -> ForesightResult<Vec<MetricSample>> {
        let mut samples = Vec::new();

        for (index, result) in self.results.into_iter().enumerate() {
            let metric = MetricName::from_query_id(&result.id).ok_or_else(|| {
                ForesightError::malformed(index + 1, format!("unknown query id '{}'", result.id))
            })?;

            if result.timestamps.len() != result.values.len() {
                return Err(ForesightError::malformed(
                    index + 1,
                    format!(
                        "result '{}' has {} timestamps but {} values",
                        result.id,
                        result.timestamps.len(),
                        result.values.len()
                    ),
                ));
            }

            debug!(%metric, points = result.values.len(), "converted metric result");
            samples.extend(
                result
                    .timestamps
                    .into_iter()
                    .zip(result.values)
                    .map(|(timestamp, value)| MetricSample::new(timestamp, metric, value)),
            );
        }

        Ok(samples)
    }
}

/// Trait for fetching raw metric data from a monitoring backend
///
/// Implement this to connect the pipeline to CloudWatch, Prometheus, a
/// fixture file, or anything else that can answer a metric-data query.
/// Retries belong here, not in the pipeline.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Run the batch query
    ///
    /// # Returns
    /// * `Ok(response)` - The backend answered (possibly with no datapoints)
    /// * `Err(error)` - The backend could not be reached or refused the query
    async fn get_metric_data(&self, request: &MetricDataRequest) -> ForesightResult<MetricDataResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_container_insights_request() {
        let range = TimeRange::last_days(t0(), 14);
        let request = MetricDataRequest::container_insights("prod", range, DEFAULT_PERIOD_SECONDS);

        assert_eq!(request.queries.len(), 3);
        assert_eq!(request.scan_by, ScanOrder::TimestampAscending);
        assert_eq!(request.range().unwrap(), range);

        let ids: Vec<&str> = request.queries.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["cpu", "disk", "nodes"]);

        let cpu = &request.queries[0].metric_stat;
        assert_eq!(cpu.metric.namespace, "ContainerInsights");
        assert_eq!(cpu.metric.metric_name, "node_cpu_utilization");
        assert_eq!(cpu.metric.dimensions[0].value, "prod");
        assert_eq!(cpu.period_seconds, 3600);
        assert_eq!(cpu.stat, Statistic::Average);
    }

    #[test]
    fn test_response_into_samples() {
        let response = MetricDataResponse {
            results: vec![
                MetricDataResult {
                    id: "cpu".to_string(),
                    timestamps: vec![t0(), t0() + Duration::hours(1)],
                    values: vec![41.0, 43.5],
                },
                MetricDataResult {
                    id: "nodes".to_string(),
                    timestamps: vec![t0()],
                    values: vec![3.0],
                },
            ],
        };

        let samples = response.into_samples().unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1], MetricSample::new(t0() + Duration::hours(1), MetricName::Cpu, 43.5));
        assert_eq!(samples[2].metric_name, MetricName::NodeCount);
    }

    #[test]
    fn test_unknown_query_id_is_malformed() {
        let response = MetricDataResponse {
            results: vec![MetricDataResult {
                id: "memory".to_string(),
                timestamps: vec![],
                values: vec![],
            }],
        };
        let err = response.into_samples().unwrap_err();
        assert!(matches!(err, ForesightError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_length_mismatch_is_malformed() {
        let response = MetricDataResponse {
            results: vec![MetricDataResult {
                id: "disk".to_string(),
                timestamps: vec![t0()],
                values: vec![1.0, 2.0],
            }],
        };
        assert!(matches!(
            response.into_samples(),
            Err(ForesightError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_request_serializes_with_typed_fields() {
        let request = MetricDataRequest::container_insights(
            "dev",
            TimeRange::last_days(t0(), 1),
            DEFAULT_PERIOD_SECONDS,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["scan_by"], "TimestampAscending");
        assert_eq!(json["queries"][2]["metric_stat"]["metric"]["metric_name"], "cluster_node_count");
    }
}
