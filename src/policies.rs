//! Convenience builders for common threshold policies

use crate::advisor::ThresholdPolicy;
use crate::types::MetricName;

/// Flag when predicted CPU utilization (%) may exceed `threshold`
pub fn cpu_scaling_policy(threshold: f64) -> ThresholdPolicy {
    ThresholdPolicy {
        name: "cpu-scaling".to_string(),
        metric: MetricName::Cpu,
        threshold,
    }
}

/// Flag when predicted disk utilization (%) may exceed `threshold`
pub fn disk_scaling_policy(threshold: f64) -> ThresholdPolicy {
    ThresholdPolicy {
        name: "disk-scaling".to_string(),
        metric: MetricName::Disk,
        threshold,
    }
}

/// Flag when the predicted node count may exceed `max_nodes`
pub fn node_count_policy(max_nodes: f64) -> ThresholdPolicy {
    ThresholdPolicy {
        name: "node-count".to_string(),
        metric: MetricName::NodeCount,
        threshold: max_nodes,
    }
}

/// The dashboard default: scale when P90 CPU is above 80%
pub fn default_policy() -> ThresholdPolicy {
    cpu_scaling_policy(80.0)
}
