// src/advisor.rs

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ForecastHorizon, ForecastPoint, MetricName, ScalingRecommendation, SummaryStats};

/// A named upper-band threshold for one metric
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdPolicy {
    /// Name of this policy (e.g., "cpu-scaling")
    pub name: String,
    /// Metric the threshold applies to
    pub metric: MetricName,
    /// Flag the horizon when any p90 exceeds this value
    pub threshold: f64,
}

/// Derives scaling recommendations from forecasts
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalingAdvisor;

impl ScalingAdvisor {
    pub fn new() -> Self {
        Self
    }

    /// Flag every point whose p90 exceeds `threshold`.
    ///
    /// An empty horizon is never flagged and reports zeroed summary stats.
    pub fn evaluate(&self, horizon: &ForecastHorizon, threshold: f64) -> ScalingRecommendation {
        let breaching_points: Vec<ForecastPoint> = horizon
            .points
            .iter()
            .filter(|p| p.p90 > threshold)
            .copied()
            .collect();

        let summary_stats = if horizon.is_empty() {
            SummaryStats {
                avg_p50: 0.0,
                peak_p90: 0.0,
            }
        } else {
            SummaryStats {
                avg_p50: horizon.points.iter().map(|p| p.p50).sum::<f64>() / horizon.len() as f64,
                peak_p90: horizon
                    .points
                    .iter()
                    .map(|p| p.p90)
                    .fold(f64::NEG_INFINITY, f64::max),
            }
        };

        debug!(
            metric = %horizon.metric_name,
            threshold,
            breaches = breaching_points.len(),
            "evaluated forecast against threshold"
        );

        ScalingRecommendation {
            flagged: !breaching_points.is_empty(),
            breaching_points,
            threshold,
            summary_stats,
        }
    }

    /// Evaluate with a policy's threshold
    pub fn evaluate_policy(
        &self,
        horizon: &ForecastHorizon,
        policy: &ThresholdPolicy,
    ) -> ScalingRecommendation {
        self.evaluate(horizon, policy.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn horizon(p90s: &[f64]) -> ForecastHorizon {
        ForecastHorizon {
            metric_name: MetricName::Cpu,
            cadence: Duration::hours(1),
            model: "test".to_string(),
            points: p90s
                .iter()
                .enumerate()
                .map(|(i, p90)| ForecastPoint {
                    timestamp: t0() + Duration::hours(i as i64 + 1),
                    p10: p90 - 20.0,
                    p50: p90 - 10.0,
                    p90: *p90,
                })
                .collect(),
        }
    }

    #[test]
    fn test_no_breach_is_not_flagged() {
        let rec = ScalingAdvisor::new().evaluate(&horizon(&[60.0, 70.0, 79.9]), 80.0);
        assert!(!rec.flagged);
        assert!(rec.breaching_points.is_empty());
        assert_eq!(rec.threshold, 80.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let rec = ScalingAdvisor::new().evaluate(&horizon(&[80.0]), 80.0);
        assert!(!rec.flagged);
    }

    #[test]
    fn test_breaches_keep_horizon_order() {
        let h = horizon(&[85.0, 70.0, 90.0, 81.0]);
        let rec = ScalingAdvisor::new().evaluate(&h, 80.0);
        assert!(rec.flagged);
        let p90s: Vec<f64> = rec.breaching_points.iter().map(|p| p.p90).collect();
        assert_eq!(p90s, vec![85.0, 90.0, 81.0]);
        assert_eq!(rec.breaching_points[0].timestamp, h.points[0].timestamp);
        assert_eq!(rec.breaching_points[1].timestamp, h.points[2].timestamp);
    }

    #[test]
    fn test_summary_stats() {
        let rec = ScalingAdvisor::new().evaluate(&horizon(&[60.0, 80.0, 100.0]), 95.0);
        assert!((rec.summary_stats.avg_p50 - 70.0).abs() < 1e-9);
        assert_eq!(rec.summary_stats.peak_p90, 100.0);
    }

    #[test]
    fn test_empty_horizon() {
        let rec = ScalingAdvisor::new().evaluate(&horizon(&[]), 80.0);
        assert!(!rec.flagged);
        assert_eq!(rec.summary_stats, SummaryStats { avg_p50: 0.0, peak_p90: 0.0 });
    }

    #[test]
    fn test_lowering_threshold_never_drops_breaches() {
        let h = horizon(&[55.0, 72.5, 64.0, 91.0, 80.0, 79.0, 101.0, 12.0]);
        let advisor = ScalingAdvisor::new();
        let mut previous = 0;
        for threshold in (0..=120).rev().map(|t| t as f64) {
            let count = advisor.evaluate(&h, threshold).breaching_points.len();
            assert!(count >= previous, "threshold {} lost breaches", threshold);
            previous = count;
        }
        assert_eq!(previous, h.len());
    }

    #[test]
    fn test_evaluate_policy_uses_policy_threshold() {
        let policy = ThresholdPolicy {
            name: "cpu-scaling".to_string(),
            metric: MetricName::Cpu,
            threshold: 75.0,
        };
        let rec = ScalingAdvisor::new().evaluate_policy(&horizon(&[76.0]), &policy);
        assert!(rec.flagged);
        assert_eq!(rec.threshold, 75.0);
    }
}
