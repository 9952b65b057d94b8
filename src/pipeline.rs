// src/pipeline.rs

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::advisor::ScalingAdvisor;
use crate::config::PipelineConfig;
use crate::error::{ForesightError, ForesightResult, PipelineStage};
use crate::forecast::{QuantileForecaster, QuantileModel};
use crate::series::MetricSeriesBuilder;
use crate::source::{MetricDataRequest, MetricSource};
use crate::types::{
    ForecastHorizon, MetricName, MetricSample, MetricSeries, ScalingRecommendation, TimeRange,
};
use crate::view::{PresentationAdapter, ViewModel, ViewRenderer};

/// Everything one pipeline run produced
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Normalized series for every metric the source returned
    pub history: BTreeMap<MetricName, MetricSeries>,
    /// Metric the forecast was made for
    pub target: MetricName,
    pub horizon: ForecastHorizon,
    pub recommendation: ScalingRecommendation,
    pub view: ViewModel,
}

impl PipelineReport {
    /// The series the forecast was based on
    pub fn target_series(&self) -> Option<&MetricSeries> {
        self.history.get(&self.target)
    }
}

/// Runs raw samples through build, forecast, evaluate and present.
///
/// Each stage is a pure function of its inputs. The first failing stage
/// aborts the run and its error is tagged with that stage.
pub struct CapacityPipeline {
    config: PipelineConfig,
    builder: MetricSeriesBuilder,
    forecaster: QuantileForecaster,
    advisor: ScalingAdvisor,
    presenter: PresentationAdapter,
}

impl CapacityPipeline {
    /// Create a pipeline using the model named in the config
    pub fn new(config: PipelineConfig) -> ForesightResult<Self> {
        config.validate()?;
        let forecaster = QuantileForecaster::new(config.forecast.clone());
        Ok(Self::assemble(config, forecaster))
    }

    /// Create a pipeline backed by a custom forecasting model
    pub fn with_model(config: PipelineConfig, model: Box<dyn QuantileModel>) -> ForesightResult<Self> {
        config.validate()?;
        let forecaster = QuantileForecaster::with_model(config.forecast.clone(), model);
        Ok(Self::assemble(config, forecaster))
    }

    fn assemble(config: PipelineConfig, forecaster: QuantileForecaster) -> Self {
        Self {
            builder: MetricSeriesBuilder::new().with_fallback(config.fallback.clone()),
            forecaster,
            advisor: ScalingAdvisor::new(),
            presenter: PresentationAdapter::new(config.presentation.clone()),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Normalize `raw_samples` over `range`, then forecast the policy metric
    pub fn run(&self, raw_samples: &[MetricSample], range: TimeRange) -> ForesightResult<PipelineReport> {
        info!(
            "Pipeline run starting: {} raw samples, {} to {}",
            raw_samples.len(),
            range.start,
            range.end
        );

        let history = self
            .builder
            .build(raw_samples, self.config.cadence, range)
            .map_err(|e| e.at_stage(PipelineStage::Build))?;

        self.analyze_history(history)
    }

    /// Run the forecast stages on an already-normalized series, e.g. one
    /// loaded from a flat export
    pub fn analyze(&self, series: MetricSeries) -> ForesightResult<PipelineReport> {
        let mut history = BTreeMap::new();
        history.insert(series.metric_name(), series);
        self.analyze_history(history)
    }

    /// Run the forecast stages on a set of normalized series
    pub fn analyze_history(
        &self,
        history: BTreeMap<MetricName, MetricSeries>,
    ) -> ForesightResult<PipelineReport> {
        let target = self.config.policy.metric;
        let series = match history.get(&target) {
            Some(series) if !series.is_empty() => series,
            _ => {
                warn!("No '{}' samples to forecast", target);
                return Err(ForesightError::EmptySource.at_stage(PipelineStage::Build));
            }
        };

        let horizon = self
            .forecaster
            .forecast(series, self.config.horizon_steps)
            .map_err(|e| e.at_stage(PipelineStage::Forecast))?;

        let recommendation = self.advisor.evaluate_policy(&horizon, &self.config.policy);
        if recommendation.flagged {
            info!(
                "Scaling recommended: {} of {} steps exceed {:.1} (peak p90 {:.1})",
                recommendation.breaching_points.len(),
                horizon.len(),
                recommendation.threshold,
                recommendation.summary_stats.peak_p90
            );
        } else {
            debug!("No scaling required for '{}'", self.config.policy.name);
        }

        let view = self.presenter.present(series, &horizon, &recommendation);

        Ok(PipelineReport {
            history,
            target,
            horizon,
            recommendation,
            view,
        })
    }

    /// Fetch from `source`, then run. Fetch failures are reported as such;
    /// retrying is the source's business.
    pub async fn fetch_and_run(
        &self,
        source: &dyn MetricSource,
        request: &MetricDataRequest,
    ) -> ForesightResult<PipelineReport> {
        let range = request.range().map_err(|e| e.at_stage(PipelineStage::Fetch))?;

        let response = source
            .get_metric_data(request)
            .await
            .map_err(|e| e.at_stage(PipelineStage::Fetch))?;

        let samples = response
            .into_samples()
            .map_err(|e| e.at_stage(PipelineStage::Fetch))?;

        debug!("Fetched {} samples from metric source", samples.len());
        self.run(&samples, range)
    }

    /// Hand a report's view to the display collaborator
    pub fn render(&self, report: &PipelineReport, renderer: &mut dyn ViewRenderer) -> ForesightResult<()> {
        renderer
            .render(&report.view)
            .map_err(|e| e.at_stage(PipelineStage::Present))
    }
}
