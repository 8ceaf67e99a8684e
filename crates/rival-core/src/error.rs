//! Error types for rival-core.
//!
//! This module defines error types that are used across the core library,
//! including input parsing, splitting, strategy selection, metric access and
//! statistical testing errors.

use thiserror::Error;

/// Errors that can occur while reading or building data models.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    /// A line could not be parsed
    #[error("Malformed input at line {line}: {reason}")]
    Malformed {
        /// 1-based line number in the source
        line: usize,
        /// What was wrong with the line
        reason: String,
    },
    /// Failed to read from the underlying source
    #[error("Failed to read input: {0}")]
    Io(String),
}

/// Errors that can occur when accessing metric results.
#[derive(Debug, Clone, Error)]
pub enum MetricError {
    /// Accessor does not apply at this granularity (e.g. per-user values of a
    /// system-level metric)
    #[error("{metric} is not applicable {granularity}")]
    NotApplicable {
        /// Metric name
        metric: String,
        /// Granularity that was requested
        granularity: &'static str,
    },
    /// Metric name not recognized
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
    /// Metric needs a training model that was not supplied
    #[error("{0} requires a training model")]
    MissingTraining(String),
}

/// Errors that can occur when selecting or configuring an evaluation strategy.
#[derive(Debug, Clone, Error)]
pub enum StrategyError {
    /// Strategy name not recognized
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
    /// Output format name not recognized
    #[error("Unknown output format: {0}")]
    UnknownFormat(String),
}

/// Errors that can occur while computing statistics.
#[derive(Debug, Clone, Error)]
pub enum StatsError {
    /// Not enough observations for the requested statistic
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    /// Significance level outside (0, 1)
    #[error("Invalid alpha {0}: must be in (0, 1)")]
    InvalidAlpha(f64),
    /// Distribution could not be constructed
    #[error("Distribution error: {0}")]
    Distribution(String),
    /// Test name not recognized
    #[error("Unknown statistical test: {0}")]
    UnknownTest(String),
}

/// Errors that can occur while splitting a data model.
#[derive(Debug, Clone, Error)]
pub enum SplitError {
    /// Training ratio outside [0, 1]
    #[error("Invalid training ratio {0}: must be in [0, 1]")]
    InvalidRatio(f64),
    /// Fewer than two folds requested
    #[error("Invalid fold count {0}: need at least 2")]
    InvalidFolds(usize),
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Failed to parse the configuration document
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
    /// An option has an unusable value
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue {
        /// Option name
        key: String,
        /// What was wrong with it
        reason: String,
    },
}

// Conversion implementations for error chaining

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<statrs::distribution::StudentsTError> for StatsError {
    fn from(err: statrs::distribution::StudentsTError) -> Self {
        StatsError::Distribution(err.to_string())
    }
}

impl From<statrs::distribution::NormalError> for StatsError {
    fn from(err: statrs::distribution::NormalError) -> Self {
        StatsError::Distribution(err.to_string())
    }
}
