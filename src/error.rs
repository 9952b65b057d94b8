// src/error.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result type used throughout the foresight library
pub type ForesightResult<T> = Result<T, ForesightError>;

/// Pipeline stage that detected an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Fetching raw samples from the metric source
    Fetch,
    /// Normalizing raw samples into fixed-cadence series
    Build,
    /// Producing the quantile forecast
    Forecast,
    /// Evaluating the forecast against the threshold
    Evaluate,
    /// Shaping the view model
    Present,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Fetch => "fetch",
            PipelineStage::Build => "build",
            PipelineStage::Forecast => "forecast",
            PipelineStage::Evaluate => "evaluate",
            PipelineStage::Present => "present",
        };
        f.write_str(name)
    }
}

/// Coarse classification of an error, independent of the stage it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EmptySource,
    InsufficientHistory,
    InvalidQuantileOrdering,
    MalformedRecord,
    Config,
    InvalidSeries,
    Model,
    Source,
    Serialization,
    Io,
}

/// All possible errors that can occur in the foresight library
#[derive(thiserror::Error, Debug)]
pub enum ForesightError {
    /// The metric source returned no samples and no fallback is configured
    #[error("No samples available from the metric source")]
    EmptySource,

    /// The series is shorter than the forecaster's minimum history
    #[error("Insufficient history: need at least {required} points, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    /// A forecast point violates p10 <= p50 <= p90 and could not be repaired
    #[error("Invalid quantile ordering at step {index}: p10={p10}, p50={p50}, p90={p90}")]
    InvalidQuantileOrdering {
        index: usize,
        p10: f64,
        p50: f64,
        p90: f64,
    },

    /// Imported data failed schema validation
    #[error("Malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A series violates ordering or cadence invariants
    #[error("Invalid series: {message}")]
    InvalidSeries { message: String },

    /// The forecasting model failed or produced unusable output
    #[error("Model '{model}' failed: {message}")]
    Model { model: String, message: String },

    /// The metric source collaborator failed
    #[error("Metric source failed: {message}")]
    Source { message: String },

    /// An error annotated with the pipeline stage that raised it
    #[error("Pipeline stage '{stage}' failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<ForesightError>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Helper methods for creating common errors
impl ForesightError {
    pub fn insufficient_history(required: usize, actual: usize) -> Self {
        Self::InsufficientHistory { required, actual }
    }

    pub fn malformed<S: Into<String>>(line: usize, message: S) -> Self {
        Self::MalformedRecord {
            line,
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_series<S: Into<String>>(message: S) -> Self {
        Self::InvalidSeries {
            message: message.into(),
        }
    }

    pub fn model<M: Into<String>, S: Into<String>>(model: M, message: S) -> Self {
        Self::Model {
            model: model.into(),
            message: message.into(),
        }
    }

    pub fn source<S: Into<String>>(message: S) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Wrap this error with the stage that detected it.
    /// Already-wrapped errors keep their original stage.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            wrapped @ Self::Stage { .. } => wrapped,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage that raised this error, if the pipeline recorded one
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The root error kind, looking through stage annotations
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptySource => ErrorKind::EmptySource,
            Self::InsufficientHistory { .. } => ErrorKind::InsufficientHistory,
            Self::InvalidQuantileOrdering { .. } => ErrorKind::InvalidQuantileOrdering,
            Self::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            Self::Config { .. } => ErrorKind::Config,
            Self::InvalidSeries { .. } => ErrorKind::InvalidSeries,
            Self::Model { .. } => ErrorKind::Model,
            Self::Source { .. } => ErrorKind::Source,
            Self::Stage { source, .. } => source.kind(),
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

#[cfg(feature = "config-toml")]
impl From<toml::de::Error> for ForesightError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config {
            message: format!("Failed to parse TOML: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapping_keeps_kind() {
        let err = ForesightError::EmptySource.at_stage(PipelineStage::Build);
        assert_eq!(err.stage(), Some(PipelineStage::Build));
        assert_eq!(err.kind(), ErrorKind::EmptySource);
        assert!(err.to_string().contains("build"));
    }

    #[test]
    fn test_stage_wrapping_is_not_nested() {
        let err = ForesightError::insufficient_history(24, 3)
            .at_stage(PipelineStage::Forecast)
            .at_stage(PipelineStage::Evaluate);
        assert_eq!(err.stage(), Some(PipelineStage::Forecast));
        assert_eq!(err.kind(), ErrorKind::InsufficientHistory);
    }

    #[test]
    fn test_unstaged_error_has_no_stage() {
        let err = ForesightError::malformed(3, "bad float");
        assert_eq!(err.stage(), None);
        assert_eq!(err.to_string(), "Malformed record at line 3: bad float");
    }
}
