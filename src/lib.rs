//! # Foresight - Capacity Forecasting for Kubernetes Clusters
//!
//! Foresight turns a few weeks of cluster metrics (node CPU, node disk, node count)
//! into a probabilistic forecast of the next day and a yes/no scaling recommendation.
//! Every stage is a plain function of its inputs, so the same history always yields
//! the same report.
//!
//! ## 📊 Pipeline Overview
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌────────────────────┐
//! │ MetricSource │──▶│ MetricSeriesBuilder│──▶│ QuantileForecaster │
//! │ (async)      │   │ grid, mean, fill   │   │ P10 / P50 / P90    │
//! └──────────────┘   └─────────┬──────────┘   └─────────┬──────────┘
//!                              │                        │
//!                    ┌─────────▼──────────┐   ┌─────────▼──────────┐
//!                    │  Flat CSV export   │   │   ScalingAdvisor   │
//!                    │  (lossless)        │   │   p90 > threshold  │
//!                    └────────────────────┘   └─────────┬──────────┘
//!                                                       │
//!                                             ┌─────────▼──────────┐
//!                                             │PresentationAdapter │
//!                                             │ ViewModel / render │
//!                                             └────────────────────┘
//! ```
//!
//! ## 🎛️ Usage
//!
//! ```rust,no_run
//! use foresight::{CapacityPipeline, PipelineConfig, MetricName, TimeRange};
//! use foresight::utils::{hourly_samples, linear_ramp};
//! use chrono::{Duration, TimeZone, Utc};
//!
//! # fn main() -> foresight::ForesightResult<()> {
//! let start = Utc.with_ymd_and_hms(2024, 11, 4, 0, 0, 0).unwrap();
//! let raw = hourly_samples(MetricName::Cpu, start, &linear_ramp(48, 40.0, 75.0));
//! let range = TimeRange::new(start, start + Duration::hours(47))?;
//!
//! let pipeline = CapacityPipeline::new(PipelineConfig::default())?;
//! let report = pipeline.run(&raw, range)?;
//!
//! if report.recommendation.flagged {
//!     println!("{} hours above threshold", report.recommendation.breaching_points.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `config-toml`: load [`PipelineConfig`] from TOML files as well as JSON
//! - `full`: everything above

pub mod error;
pub mod utils;
pub mod types;
pub mod tests;
pub mod series;
pub mod forecast;
pub mod advisor;
pub mod policies;
pub mod view;
pub mod source;
pub mod export;
pub mod config;
pub mod pipeline;

// Re-export common types for convenience
pub use types::{
    MetricName, MetricSample, MetricSeries, MetricValue, Timestamp, TimeRange,
    ForecastPoint, ForecastHorizon, SummaryStats, ScalingRecommendation,
};

pub use error::{ErrorKind, ForesightError, ForesightResult, PipelineStage};

pub use series::{EmptySourceFallback, MetricSeriesBuilder};

pub use forecast::{
    ForecastConfig, ForecastConfigBuilder, ForecastModel, QuantileForecaster,
    QuantileModel, QuantileRepair, Quantiles,
};

pub use advisor::{ScalingAdvisor, ThresholdPolicy};

pub use view::{
    JsonRenderer, PresentationAdapter, PresentationConfig, StatusBanner,
    ViewModel, ViewRenderer,
};

pub use source::{
    MetricDataRequest, MetricDataResponse, MetricDataResult, MetricSource,
};

pub use config::{PipelineConfig, PipelineConfigBuilder};

pub use pipeline::{CapacityPipeline, PipelineReport};
