// src/view.rs

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::ForesightResult;
use crate::types::{ForecastHorizon, MetricSeries, ScalingRecommendation, Timestamp};

/// Settings for shaping a view model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PresentationConfig {
    /// Page title shown by the display host
    pub title: String,
    /// How many trailing historical points to include in the chart
    pub history_window: usize,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            title: "EKS Forecasting Dashboard".to_string(),
            history_window: 48,
        }
    }
}

/// A labelled line on the chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub label: String,
    pub points: Vec<(Timestamp, f64)>,
}

/// One step of the shaded uncertainty band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandPoint {
    pub timestamp: Timestamp,
    pub lower: f64,
    pub upper: f64,
}

/// One row of the alert table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertRow {
    pub timestamp: Timestamp,
    /// Upper-band (p90) prediction for that step
    pub max_predicted: f64,
}

/// Banner shown above the alert table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusBanner {
    Alert(String),
    Stable(String),
}

/// A scalar figure with its display label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetric {
    pub label: String,
    pub value: f64,
    /// Pre-formatted value, e.g. "63.2%"
    pub display: String,
}

/// Everything a display host needs to draw the forecast page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub title: String,
    pub y_axis_label: String,
    pub history: Trace,
    pub median: Trace,
    pub band: Vec<BandPoint>,
    pub alerts: Vec<AlertRow>,
    pub status: StatusBanner,
    pub avg_predicted: SummaryMetric,
    pub peak_predicted: SummaryMetric,
}

impl ViewModel {
    pub fn to_json(&self) -> ForesightResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Shapes pipeline results into a [`ViewModel`]
#[derive(Debug, Clone, Default)]
pub struct PresentationAdapter {
    config: PresentationConfig,
}

impl PresentationAdapter {
    pub fn new(config: PresentationConfig) -> Self {
        Self { config }
    }

    pub fn present(
        &self,
        series: &MetricSeries,
        horizon: &ForecastHorizon,
        recommendation: &ScalingRecommendation,
    ) -> ViewModel {
        let metric = series.metric_name();
        let percent = if metric.unit_label().ends_with("(%)") { "%" } else { "" };

        let history = Trace {
            label: "History".to_string(),
            points: series
                .tail(self.config.history_window)
                .iter()
                .map(|s| (s.timestamp, s.value))
                .collect(),
        };

        let median = Trace {
            label: "Prediction (Median)".to_string(),
            points: horizon.points.iter().map(|p| (p.timestamp, p.p50)).collect(),
        };

        let band = horizon
            .points
            .iter()
            .map(|p| BandPoint {
                timestamp: p.timestamp,
                lower: p.p10,
                upper: p.p90,
            })
            .collect();

        let alerts = recommendation
            .breaching_points
            .iter()
            .map(|p| AlertRow {
                timestamp: p.timestamp,
                max_predicted: p.p90,
            })
            .collect();

        let status = if recommendation.flagged {
            StatusBanner::Alert(format!(
                "Alert: {} hours predicted to exceed {}{} {}.",
                recommendation.breaching_points.len(),
                recommendation.threshold,
                percent,
                metric.query_id().to_uppercase()
            ))
        } else {
            StatusBanner::Stable(format!(
                "Cluster stable. No scaling required for the next {}h.",
                horizon_hours(horizon)
            ))
        };

        let stats = recommendation.summary_stats;
        ViewModel {
            title: self.config.title.clone(),
            y_axis_label: metric.unit_label().to_string(),
            history,
            median,
            band,
            alerts,
            status,
            avg_predicted: SummaryMetric {
                label: "Avg Predicted".to_string(),
                value: stats.avg_p50,
                display: format!("{:.1}{}", stats.avg_p50, percent),
            },
            peak_predicted: SummaryMetric {
                label: "Peak Predicted Load".to_string(),
                value: stats.peak_p90,
                display: format!("{:.1}{}", stats.peak_p90, percent),
            },
        }
    }
}

fn horizon_hours(horizon: &ForecastHorizon) -> i64 {
    (horizon.cadence * horizon.len() as i32).num_hours()
}

/// The display collaborator that draws a view model
pub trait ViewRenderer {
    fn render(&mut self, view: &ViewModel) -> ForesightResult<()>;
}

/// Writes view models as pretty-printed JSON
pub struct JsonRenderer<W: Write> {
    writer: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ViewRenderer for JsonRenderer<W> {
    fn render(&mut self, view: &ViewModel) -> ForesightResult<()> {
        serde_json::to_writer_pretty(&mut self.writer, view)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
