//! # Quantile Forecasting
//!
//! Turns a historical [`MetricSeries`] into a [`ForecastHorizon`] of
//! P10/P50/P90 points. The forecaster itself never predicts anything: it
//! delegates to a [`QuantileModel`], then checks the model's output and
//! stamps each step with its timestamp.
//!
//! ## Models
//!
//! Three statistical models ship with the crate and are selected through
//! [`ForecastModel`]:
//!
//! - **LinearTrend**: least-squares trend with a residual noise band
//! - **HoltSmoothing**: double exponential smoothing with an error band
//! - **MovingAverageTrend**: moving-average slope extrapolated from the last value
//!
//! A trained model or a remote inference client plugs in by implementing
//! [`QuantileModel`] and passing it to [`QuantileForecaster::with_model`].
//!
//! ## Guarantees
//!
//! Every point of a returned horizon satisfies `p10 <= p50 <= p90`, whatever
//! the model produced. Out-of-order triplets are sorted (or rejected, see
//! [`QuantileRepair`]); non-finite values are always rejected.
//!
//! ```rust,ignore
//! let forecaster = QuantileForecaster::new(ForecastConfig::builder()
//!     .min_history(24)
//!     .model(ForecastModel::HoltSmoothing)
//!     .build());
//! let horizon = forecaster.forecast(&series, 24)?;
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ForesightError, ForesightResult};
use crate::types::{ForecastHorizon, ForecastPoint, MetricSeries, MetricValue};

/// z-score of the 90th percentile of a standard normal
const Z_P90: f64 = 1.2816;

/// Converts a mean absolute error into a standard deviation estimate
const MAE_TO_SIGMA: f64 = 1.2533;

/// Raw quantiles for one future step, as a model emits them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantiles {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

impl Quantiles {
    pub fn new(p10: f64, p50: f64, p90: f64) -> Self {
        Self { p10, p50, p90 }
    }

    /// Symmetric band of `half_width` around `median`
    pub fn around(median: f64, half_width: f64) -> Self {
        Self::new(median - half_width, median, median + half_width)
    }

    fn is_finite(&self) -> bool {
        self.p10.is_finite() && self.p50.is_finite() && self.p90.is_finite()
    }

    fn is_ordered(&self) -> bool {
        self.p10 <= self.p50 && self.p50 <= self.p90
    }

    fn sorted(self) -> Self {
        let mut values = [self.p10, self.p50, self.p90];
        values.sort_by(|a, b| a.total_cmp(b));
        Self::new(values[0], values[1], values[2])
    }
}

/// The pluggable prediction capability behind the forecaster.
///
/// `history` holds the most recent values at the series cadence, oldest
/// first. Implementations must return exactly `steps` triplets; ordering is
/// checked by the caller.
#[cfg_attr(test, mockall::automock)]
pub trait QuantileModel: Send + Sync {
    /// Short identifier recorded on every horizon this model produces
    fn name(&self) -> &'static str;

    /// Predict `steps` future quantile triplets from `history`
    fn predict(&self, history: &[MetricValue], steps: usize) -> ForesightResult<Vec<Quantiles>>;
}

/// Built-in forecasting models
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ForecastModel {
    /// Least-squares linear trend
    LinearTrend,
    /// Holt's double exponential smoothing
    HoltSmoothing,
    /// Moving average with weighted recent trend
    MovingAverageTrend,
}

impl ForecastModel {
    /// Instantiate the model with the band settings from `config`
    pub fn build(&self, config: &ForecastConfig) -> Box<dyn QuantileModel> {
        match self {
            ForecastModel::LinearTrend => Box::new(LinearTrendModel {
                min_band: config.min_band,
            }),
            ForecastModel::HoltSmoothing => Box::new(HoltModel {
                alpha: 0.3,
                beta: 0.1,
                min_band: config.min_band,
            }),
            ForecastModel::MovingAverageTrend => Box::new(MovingAverageModel {
                min_band: config.min_band,
            }),
        }
    }
}

/// How to treat a model step whose quantiles are out of order
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum QuantileRepair {
    /// Sort the triplet so p10 <= p50 <= p90
    #[default]
    Sort,
    /// Fail with `InvalidQuantileOrdering`
    Reject,
}

/// Configuration for quantile forecasting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ForecastConfig {
    /// Minimum number of historical points required to forecast
    pub min_history: usize,

    /// How many of the most recent points the model sees
    pub encoder_window: usize,

    /// Model used by `QuantileForecaster::new`
    pub model: ForecastModel,

    /// Treatment of out-of-order quantiles
    pub repair: QuantileRepair,

    /// Smallest half-width of the p10-p90 band
    pub min_band: f64,

    /// Clamp predictions at zero
    pub non_negative: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_history: 24,
            encoder_window: 48,
            model: ForecastModel::LinearTrend,
            repair: QuantileRepair::Sort,
            min_band: 2.0,
            non_negative: true,
        }
    }
}

impl ForecastConfig {
    /// Create a new config builder
    pub fn builder() -> ForecastConfigBuilder {
        ForecastConfigBuilder::default()
    }

    pub fn validate(&self) -> ForesightResult<()> {
        if self.min_history < 2 {
            return Err(ForesightError::config("min_history must be at least 2"));
        }
        if self.encoder_window < self.min_history {
            return Err(ForesightError::config(format!(
                "encoder_window ({}) must not be smaller than min_history ({})",
                self.encoder_window, self.min_history
            )));
        }
        if !self.min_band.is_finite() || self.min_band < 0.0 {
            return Err(ForesightError::config("min_band must be a non-negative number"));
        }
        Ok(())
    }
}

/// Builder for ForecastConfig
#[derive(Default)]
pub struct ForecastConfigBuilder {
    min_history: Option<usize>,
    encoder_window: Option<usize>,
    model: Option<ForecastModel>,
    repair: Option<QuantileRepair>,
    min_band: Option<f64>,
    non_negative: Option<bool>,
}

impl ForecastConfigBuilder {
    /// Set the minimum history length
    pub fn min_history(mut self, points: usize) -> Self {
        self.min_history = Some(points);
        self
    }

    /// Set the encoder window
    pub fn encoder_window(mut self, points: usize) -> Self {
        self.encoder_window = Some(points);
        self
    }

    /// Set the forecasting model
    pub fn model(mut self, model: ForecastModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the quantile repair strategy
    pub fn repair(mut self, repair: QuantileRepair) -> Self {
        self.repair = Some(repair);
        self
    }

    /// Set the minimum band half-width
    pub fn min_band(mut self, band: f64) -> Self {
        self.min_band = Some(band.max(0.0));
        self
    }

    /// Enable or disable clamping at zero
    pub fn non_negative(mut self, enable: bool) -> Self {
        self.non_negative = Some(enable);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ForecastConfig {
        let default = ForecastConfig::default();
        let min_history = self.min_history.unwrap_or(default.min_history);
        ForecastConfig {
            min_history,
            encoder_window: self.encoder_window.unwrap_or(default.encoder_window.max(min_history)),
            model: self.model.unwrap_or(default.model),
            repair: self.repair.unwrap_or(default.repair),
            min_band: self.min_band.unwrap_or(default.min_band),
            non_negative: self.non_negative.unwrap_or(default.non_negative),
        }
    }
}

/// Produces quantile horizons from historical series
pub struct QuantileForecaster {
    config: ForecastConfig,
    model: Box<dyn QuantileModel>,
}

impl QuantileForecaster {
    /// Create a forecaster using the model named in `config`
    pub fn new(config: ForecastConfig) -> Self {
        let model = config.model.build(&config);
        Self { config, model }
    }

    /// Create a forecaster backed by a custom model
    pub fn with_model(config: ForecastConfig, model: Box<dyn QuantileModel>) -> Self {
        Self { config, model }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Forecast `horizon_steps` steps past the end of `series`
    pub fn forecast(
        &self,
        series: &MetricSeries,
        horizon_steps: usize,
    ) -> ForesightResult<ForecastHorizon> {
        if horizon_steps == 0 {
            return Err(ForesightError::config("horizon_steps must be at least 1"));
        }

        let last = match series.last() {
            Some(last) if series.len() >= self.config.min_history => *last,
            _ => {
                return Err(ForesightError::insufficient_history(
                    self.config.min_history,
                    series.len(),
                ))
            }
        };

        let history: Vec<MetricValue> = series
            .tail(self.config.encoder_window)
            .iter()
            .map(|s| s.value)
            .collect();

        debug!(
            metric = %series.metric_name(),
            model = self.model.name(),
            history = history.len(),
            steps = horizon_steps,
            "running quantile model"
        );

        let raw = self.model.predict(&history, horizon_steps)?;
        if raw.len() != horizon_steps {
            return Err(ForesightError::model(
                self.model.name().to_string(),
                format!("returned {} steps, expected {}", raw.len(), horizon_steps),
            ));
        }

        let mut repaired = 0usize;
        let mut points = Vec::with_capacity(horizon_steps);
        for (index, quantiles) in raw.into_iter().enumerate() {
            let quantiles = self.enforce_ordering(index, quantiles, &mut repaired)?;
            let quantiles = if self.config.non_negative {
                Quantiles::new(
                    quantiles.p10.max(0.0),
                    quantiles.p50.max(0.0),
                    quantiles.p90.max(0.0),
                )
            } else {
                quantiles
            };

            points.push(ForecastPoint {
                timestamp: last.timestamp + series.cadence() * (index as i32 + 1),
                p10: quantiles.p10,
                p50: quantiles.p50,
                p90: quantiles.p90,
            });
        }

        if repaired > 0 {
            warn!(
                model = self.model.name(),
                repaired, "model emitted out-of-order quantiles, sorted them"
            );
        }

        let horizon = ForecastHorizon {
            metric_name: series.metric_name(),
            cadence: series.cadence(),
            model: self.model.name().to_string(),
            points,
        };

        info!(
            metric = %horizon.metric_name,
            model = %horizon.model,
            steps = horizon.len(),
            "forecast generated"
        );

        Ok(horizon)
    }

    fn enforce_ordering(
        &self,
        index: usize,
        quantiles: Quantiles,
        repaired: &mut usize,
    ) -> ForesightResult<Quantiles> {
        let invalid = || ForesightError::InvalidQuantileOrdering {
            index,
            p10: quantiles.p10,
            p50: quantiles.p50,
            p90: quantiles.p90,
        };

        if !quantiles.is_finite() {
            return Err(invalid());
        }
        if quantiles.is_ordered() {
            return Ok(quantiles);
        }

        match self.config.repair {
            QuantileRepair::Sort => {
                *repaired += 1;
                Ok(quantiles.sorted())
            }
            QuantileRepair::Reject => Err(invalid()),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Least-squares trend line with a band from the residual spread.
///
/// The band widens with distance from the fitted data.
#[derive(Debug, Clone)]
pub struct LinearTrendModel {
    pub min_band: f64,
}

impl QuantileModel for LinearTrendModel {
    fn name(&self) -> &'static str {
        "linear-trend"
    }

    fn predict(&self, history: &[MetricValue], steps: usize) -> ForesightResult<Vec<Quantiles>> {
        if history.is_empty() {
            return Err(ForesightError::model("linear-trend", "empty history"));
        }

        let n = history.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = mean(history);

        let numerator: f64 = history
            .iter()
            .enumerate()
            .map(|(x, y)| (x as f64 - x_mean) * (y - y_mean))
            .sum();
        let denominator: f64 = (0..history.len()).map(|x| (x as f64 - x_mean).powi(2)).sum();

        let slope = if denominator != 0.0 { numerator / denominator } else { 0.0 };
        let intercept = y_mean - slope * x_mean;

        let ss_res: f64 = history
            .iter()
            .enumerate()
            .map(|(x, y)| (y - (intercept + slope * x as f64)).powi(2))
            .sum();
        let sigma = (ss_res / n).sqrt();

        Ok((1..=steps)
            .map(|h| {
                let x = n - 1.0 + h as f64;
                let median = intercept + slope * x;
                let spread = Z_P90 * sigma * (1.0 + h as f64 / n).sqrt();
                Quantiles::around(median, spread.max(self.min_band))
            })
            .collect())
    }
}

/// Holt's linear exponential smoothing.
///
/// The band comes from the in-sample one-step error and grows with the
/// square root of the step.
#[derive(Debug, Clone)]
pub struct HoltModel {
    /// Level smoothing factor
    pub alpha: f64,
    /// Trend smoothing factor
    pub beta: f64,
    pub min_band: f64,
}

impl QuantileModel for HoltModel {
    fn name(&self) -> &'static str {
        "holt-smoothing"
    }

    fn predict(&self, history: &[MetricValue], steps: usize) -> ForesightResult<Vec<Quantiles>> {
        let (first, rest) = history
            .split_first()
            .ok_or_else(|| ForesightError::model("holt-smoothing", "empty history"))?;

        let mut level = *first;
        let mut trend = rest.first().map(|second| second - first).unwrap_or(0.0);
        let mut abs_errors = Vec::with_capacity(rest.len());

        for &value in rest {
            abs_errors.push((value - (level + trend)).abs());
            let prev_level = level;
            level = self.alpha * value + (1.0 - self.alpha) * (level + trend);
            trend = self.beta * (level - prev_level) + (1.0 - self.beta) * trend;
        }

        let sigma = mean(&abs_errors) * MAE_TO_SIGMA;

        Ok((1..=steps)
            .map(|h| {
                let median = level + trend * h as f64;
                let spread = Z_P90 * sigma * (h as f64).sqrt();
                Quantiles::around(median, spread.max(self.min_band))
            })
            .collect())
    }
}

/// Extrapolates the last value along the recent slope of moving averages
#[derive(Debug, Clone)]
pub struct MovingAverageModel {
    pub min_band: f64,
}

impl QuantileModel for MovingAverageModel {
    fn name(&self) -> &'static str {
        "moving-average-trend"
    }

    fn predict(&self, history: &[MetricValue], steps: usize) -> ForesightResult<Vec<Quantiles>> {
        let last_value = *history
            .last()
            .ok_or_else(|| ForesightError::model("moving-average-trend", "empty history"))?;

        let window = (history.len() / 4).clamp(1, 12);
        let averages: Vec<f64> = history.windows(window).map(mean).collect();
        let trends: Vec<f64> = averages.windows(2).map(|w| w[1] - w[0]).collect();

        // Weight the last few trends toward the most recent
        let recent_trend = if trends.is_empty() {
            0.0
        } else {
            let trend_window = trends.len().min(5);
            let recent = &trends[trends.len() - trend_window..];
            recent
                .iter()
                .enumerate()
                .map(|(i, t)| t * (i + 1) as f64)
                .sum::<f64>()
                / (1..=trend_window).sum::<usize>() as f64
        };

        let diffs: Vec<f64> = history.windows(2).map(|w| w[1] - w[0]).collect();
        let sigma = std_dev(&diffs);

        Ok((1..=steps)
            .map(|h| {
                let median = last_value + recent_trend * h as f64;
                let spread = Z_P90 * sigma * (h as f64).sqrt();
                Quantiles::around(median, spread.max(self.min_band))
            })
            .collect())
    }
}
