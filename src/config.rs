// src/config.rs

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::advisor::ThresholdPolicy;
use crate::error::{ForesightError, ForesightResult};
use crate::forecast::ForecastConfig;
use crate::policies::default_policy;
use crate::series::EmptySourceFallback;
use crate::view::PresentationConfig;

/// Main configuration for a forecasting pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Spacing of the normalized series
    #[serde(rename = "cadence_seconds", with = "crate::types::cadence_seconds")]
    pub cadence: Duration,
    /// How many cadence steps to forecast
    pub horizon_steps: usize,
    /// Metric and threshold to evaluate
    pub policy: ThresholdPolicy,
    /// What to do when the source returns nothing
    pub fallback: EmptySourceFallback,
    /// Forecaster settings
    pub forecast: ForecastConfig,
    /// View model settings
    pub presentation: PresentationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::hours(1),
            horizon_steps: 24,
            policy: default_policy(),
            fallback: EmptySourceFallback::Fail,
            forecast: ForecastConfig::default(),
            presentation: PresentationConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Check the settings that would otherwise only fail mid-run
    pub fn validate(&self) -> ForesightResult<()> {
        if self.cadence <= Duration::zero() {
            return Err(ForesightError::config("cadence must be positive"));
        }
        if self.horizon_steps == 0 {
            return Err(ForesightError::config("horizon_steps must be at least 1"));
        }
        if !self.policy.threshold.is_finite() {
            return Err(ForesightError::config(format!(
                "threshold for policy '{}' must be a finite number",
                self.policy.name
            )));
        }
        self.forecast.validate()
    }

    pub fn from_json_str(text: &str) -> ForesightResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "config-toml")]
    pub fn from_toml_str(text: &str) -> ForesightResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json` file, or a `.toml` file with the `config-toml` feature
    pub fn from_file<P: AsRef<Path>>(path: P) -> ForesightResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            #[cfg(feature = "config-toml")]
            Some("toml") => Self::from_toml_str(&text),
            other => Err(ForesightError::config(format!(
                "unsupported config format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }
}

/// Builder for creating pipeline configurations easily
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    pub fn cadence(mut self, cadence: Duration) -> Self {
        self.config.cadence = cadence;
        self
    }

    pub fn horizon_steps(mut self, steps: usize) -> Self {
        self.config.horizon_steps = steps;
        self
    }

    pub fn policy(mut self, policy: ThresholdPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn fallback(mut self, fallback: EmptySourceFallback) -> Self {
        self.config.fallback = fallback;
        self
    }

    pub fn forecast(mut self, forecast: ForecastConfig) -> Self {
        self.config.forecast = forecast;
        self
    }

    pub fn presentation(mut self, presentation: PresentationConfig) -> Self {
        self.config.presentation = presentation;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastModel;
    use crate::policies::disk_scaling_policy;
    use crate::types::MetricName;

    #[test]
    fn test_defaults_match_dashboard() {
        let config = PipelineConfig::default();
        assert_eq!(config.cadence, Duration::hours(1));
        assert_eq!(config.horizon_steps, 24);
        assert_eq!(config.policy.metric, MetricName::Cpu);
        assert_eq!(config.policy.threshold, 80.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::builder()
            .cadence(Duration::minutes(30))
            .horizon_steps(6)
            .policy(disk_scaling_policy(90.0))
            .fallback(EmptySourceFallback::ZeroFill(vec![MetricName::Disk]))
            .forecast(ForecastConfig::builder().model(ForecastModel::HoltSmoothing).build())
            .build();

        assert_eq!(config.cadence, Duration::minutes(30));
        assert_eq!(config.horizon_steps, 6);
        assert_eq!(config.policy.name, "disk-scaling");
        assert_eq!(config.forecast.model, ForecastModel::HoltSmoothing);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(PipelineConfig::builder().horizon_steps(0).build().validate().is_err());
        assert!(PipelineConfig::builder().cadence(Duration::zero()).build().validate().is_err());
        let mut config = PipelineConfig::default();
        config.policy.threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_partial_config_uses_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "cadence_seconds": 1800, "horizon_steps": 12, "forecast": { "min_history": 6, "encoder_window": 12, "model": "MovingAverageTrend", "repair": "Reject", "min_band": 1.0, "non_negative": true } }"#,
        )
        .unwrap();
        assert_eq!(config.cadence, Duration::minutes(30));
        assert_eq!(config.horizon_steps, 12);
        assert_eq!(config.forecast.model, ForecastModel::MovingAverageTrend);
        assert_eq!(config.policy, default_policy());
    }

    #[test]
    fn test_json_round_trip() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_json_config_is_rejected() {
        let err = PipelineConfig::from_json_str(r#"{ "horizon_steps": 0 }"#).unwrap_err();
        assert!(matches!(err, ForesightError::Config { .. }));
    }

    #[test]
    fn test_from_file_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.ini");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&path),
            Err(ForesightError::Config { .. })
        ));
    }

    #[cfg(feature = "config-toml")]
    #[test]
    fn test_toml_config() {
        let config = PipelineConfig::from_toml_str(
            r#"
            cadence_seconds = 3600
            horizon_steps = 48

            [policy]
            name = "node-count"
            metric = "NodeCount"
            threshold = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(config.horizon_steps, 48);
        assert_eq!(config.policy.metric, MetricName::NodeCount);
    }
}
