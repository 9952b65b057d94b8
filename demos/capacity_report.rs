// demos/capacity_report.rs
//! End-to-end capacity report against a simulated metric source
//!
//! This example demonstrates:
//! - Implementing the `MetricSource` collaborator
//! - Building a Container Insights style request for the last two weeks
//! - Running the pipeline and rendering the view model as JSON
//!
//! Run with: cargo run --example capacity_report [config.json]
//! Set RUST_LOG=foresight=debug to see the stage logs.

use async_trait::async_trait;
use chrono::Duration;
use foresight::source::DEFAULT_PERIOD_SECONDS;
use foresight::{
    CapacityPipeline, ForesightResult, JsonRenderer, MetricDataRequest, MetricDataResponse,
    MetricDataResult, MetricSource, PipelineConfig, StatusBanner,
};
use foresight::utils::lookback_days;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Produces a daily CPU cycle on top of a slow upward drift
struct SimulatedClusterSource {
    drift_per_hour: f64,
}

impl SimulatedClusterSource {
    fn value_for(&self, id: &str, hour: i64) -> f64 {
        let daily = (hour as f64 * std::f64::consts::TAU / 24.0).sin();
        match id {
            "cpu" => 50.0 + 15.0 * daily + self.drift_per_hour * hour as f64,
            "disk" => 55.0 + 0.02 * hour as f64,
            _ => 3.0 + (daily > 0.5) as u8 as f64,
        }
    }
}

#[async_trait]
impl MetricSource for SimulatedClusterSource {
    async fn get_metric_data(&self, request: &MetricDataRequest) -> ForesightResult<MetricDataResponse> {
        let hours = (request.end_time - request.start_time).num_hours();
        let timestamps: Vec<_> = (0..=hours)
            .map(|h| request.start_time + Duration::hours(h))
            .collect();

        let results = request
            .queries
            .iter()
            .map(|query| MetricDataResult {
                id: query.id.clone(),
                timestamps: timestamps.clone(),
                values: (0..=hours).map(|h| self.value_for(&query.id, h)).collect(),
            })
            .collect();

        Ok(MetricDataResponse { results })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    let request = MetricDataRequest::container_insights(
        "my-production-cluster",
        lookback_days(14),
        DEFAULT_PERIOD_SECONDS,
    );
    let source = SimulatedClusterSource { drift_per_hour: 0.08 };

    let pipeline = CapacityPipeline::new(config)?;
    let report = pipeline.fetch_and_run(&source, &request).await?;

    match &report.view.status {
        StatusBanner::Alert(message) => info!("⚠️  {}", message),
        StatusBanner::Stable(message) => info!("✅ {}", message),
    }
    info!(
        "{}: {} | {}: {}",
        report.view.avg_predicted.label,
        report.view.avg_predicted.display,
        report.view.peak_predicted.label,
        report.view.peak_predicted.display
    );

    let mut renderer = JsonRenderer::new(std::io::stdout());
    pipeline.render(&report, &mut renderer)?;
    Ok(())
}
