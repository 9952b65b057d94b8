// demos/csv_roundtrip.rs
//! Export normalized history to the flat format, load it back and forecast
//!
//! Run with: cargo run --example csv_roundtrip [history.csv]
//!
//! Without an argument a synthetic two-day history is written to a temp file first.

use chrono::Duration;
use foresight::export::{load_history, save_forecast, save_history};
use foresight::utils::{current_hour, hourly_samples, linear_ramp};
use foresight::{CapacityPipeline, MetricName, MetricSeriesBuilder, PipelineConfig, TimeRange};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dir = std::env::temp_dir().join("foresight-demo");
    std::fs::create_dir_all(&dir)?;

    let history_path = match std::env::args().nth(1) {
        Some(path) => path.into(),
        None => {
            let start = current_hour() - Duration::hours(47);
            let mut raw = hourly_samples(MetricName::Cpu, start, &linear_ramp(48, 40.0, 75.0));
            raw.extend(hourly_samples(MetricName::Disk, start, &linear_ramp(48, 60.0, 64.0)));
            raw.extend(hourly_samples(MetricName::NodeCount, start, &[3.0; 48]));

            let range = TimeRange::new(start, start + Duration::hours(47))?;
            let history = MetricSeriesBuilder::new().build(&raw, Duration::hours(1), range)?;

            let path = dir.join("history.csv");
            save_history(&path, &history)?;
            info!("Wrote synthetic history to {}", path.display());
            path
        }
    };

    let history = load_history(&history_path)?;
    info!("Loaded {} metric columns from {}", history.len(), history_path.display());

    let pipeline = CapacityPipeline::new(PipelineConfig::default())?;
    let report = pipeline.analyze_history(history)?;

    let forecast_path = dir.join("forecast.csv");
    save_forecast(&forecast_path, &report.horizon)?;
    info!("Wrote {} forecast rows to {}", report.horizon.len(), forecast_path.display());

    if report.recommendation.flagged {
        warn!(
            "{} steps exceed {} (peak p90 {:.1})",
            report.recommendation.breaching_points.len(),
            report.recommendation.threshold,
            report.recommendation.summary_stats.peak_p90
        );
    } else {
        info!("No scaling required");
    }
    Ok(())
}
