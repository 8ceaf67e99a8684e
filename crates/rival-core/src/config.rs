//! Evaluation configuration.
//!
//! Constants define the defaults used throughout the library and by the CLI.
//! [`EvaluationConfig`] bundles every tunable of an evaluation run and can be
//! read from a TOML document; missing keys take the defaults below.
//!
//! # Usage
//!
//! ```
//! use rival_core::config::EvaluationConfig;
//!
//! let config = EvaluationConfig::from_toml_str(
//!     r#"
//!     threshold = 4.0
//!     cutoffs = [5, 10]
//!     strategy = "rel_plus_n"
//!     metrics = ["precision", "ndcg"]
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.cutoffs, vec![5, 10]);
//! ```

use crate::error::ConfigError;
use crate::metric::{DistanceKind, ErrorStrategy, MetricKind, MetricSettings, NdcgType, RankDiscount};
use crate::stats::{ComparisonSettings, SignificanceTest};
use crate::strategy::{OutputFormat, StrategyKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

// =============================================================================
// Ranking
// =============================================================================

/// Cutoffs evaluated when none are configured.
pub const DEFAULT_CUTOFFS: [usize; 5] = [1, 5, 10, 20, 50];

/// Minimum test preference for an item to count as relevant.
pub const DEFAULT_THRESHOLD: f64 = 1.0;

/// Popularity correction of PopularityStratifiedRecall.
pub const DEFAULT_GAMMA: f64 = 1.0;

// =============================================================================
// Strategies
// =============================================================================

/// Non-relevant items sampled per user by RelPlusN.
pub const DEFAULT_REL_PLUS_N: usize = 100;

/// Base seed for RelPlusN sampling, splitting and bootstrapping.
pub const DEFAULT_SEED: u64 = 2048;

// =============================================================================
// Statistics
// =============================================================================

/// Significance level for tests and confidence intervals.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Largest sample (non-zero differences) for which the Wilcoxon test uses
/// the exact null distribution.
pub const EXACT_WILCOXON_LIMIT: usize = 50;

/// Resamples drawn by the bootstrap confidence interval.
pub const DEFAULT_BOOTSTRAP_SAMPLES: usize = 1000;

/// Every tunable of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub threshold: f64,
    pub cutoffs: Vec<usize>,
    pub strategy: StrategyKind,
    /// RelPlusN sample size
    pub rel_plus_n: usize,
    pub seed: u64,
    pub metrics: Vec<MetricKind>,
    pub error_strategy: ErrorStrategy,
    pub ndcg_type: NdcgType,
    pub gamma: f64,
    pub distance: DistanceKind,
    pub discount: RankDiscount,
    pub num_items: Option<usize>,
    pub gini_complement: bool,
    pub alpha: f64,
    pub significance_tests: Vec<SignificanceTest>,
    pub bootstrap_samples: usize,
    pub output_format: OutputFormat,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            cutoffs: DEFAULT_CUTOFFS.to_vec(),
            strategy: StrategyKind::TestItems,
            rel_plus_n: DEFAULT_REL_PLUS_N,
            seed: DEFAULT_SEED,
            metrics: vec![
                MetricKind::Rmse,
                MetricKind::Precision,
                MetricKind::Recall,
                MetricKind::Map,
                MetricKind::Ndcg,
            ],
            error_strategy: ErrorStrategy::default(),
            ndcg_type: NdcgType::default(),
            gamma: DEFAULT_GAMMA,
            distance: DistanceKind::default(),
            discount: RankDiscount::default(),
            num_items: None,
            gini_complement: false,
            alpha: DEFAULT_ALPHA,
            significance_tests: SignificanceTest::all().to_vec(),
            bootstrap_samples: DEFAULT_BOOTSTRAP_SAMPLES,
            output_format: OutputFormat::default(),
        }
    }
}

impl EvaluationConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&text)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "alpha".to_string(),
                reason: format!("{} is not in (0, 1)", self.alpha),
            });
        }
        if self.cutoffs.contains(&0) {
            return Err(ConfigError::InvalidValue {
                key: "cutoffs".to_string(),
                reason: "cutoffs must be positive".to_string(),
            });
        }
        if self.threshold.is_nan() {
            return Err(ConfigError::InvalidValue {
                key: "threshold".to_string(),
                reason: "threshold must be a number".to_string(),
            });
        }
        if self.gamma < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "gamma".to_string(),
                reason: format!("{} is negative", self.gamma),
            });
        }
        Ok(())
    }

    /// Tests, significance level and bootstrap resampling of a comparison.
    pub fn comparison_settings(&self) -> ComparisonSettings {
        ComparisonSettings {
            tests: self.significance_tests.clone(),
            alpha: self.alpha,
            bootstrap_samples: self.bootstrap_samples,
            seed: self.seed,
        }
    }

    /// Settings shared by the configured metrics.
    pub fn metric_settings(&self) -> MetricSettings {
        MetricSettings {
            threshold: self.threshold,
            cutoffs: self.cutoffs.clone(),
            error_strategy: self.error_strategy,
            ndcg_type: self.ndcg_type,
            gamma: self.gamma,
            distance: self.distance,
            discount: self.discount,
            num_items: self.num_items,
            gini_complement: self.gini_complement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EvaluationConfig::default();
        assert_eq!(config.cutoffs, vec![1, 5, 10, 20, 50]);
        assert_eq!(config.threshold, 1.0);
        assert_eq!(config.alpha, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EvaluationConfig::from_toml_str(
            r#"
            threshold = 4.0
            strategy = "rel_plus_n"
            rel_plus_n = 50
            metrics = ["precision", "gini_index"]
            ndcg_type = "trec_eval"
            significance_tests = ["wilcoxon"]
            output_format = "treceval"
            "#,
        )
        .unwrap();

        assert_eq!(config.threshold, 4.0);
        assert_eq!(config.strategy, StrategyKind::RelPlusN);
        assert_eq!(config.rel_plus_n, 50);
        assert_eq!(config.metrics, vec![MetricKind::Precision, MetricKind::GiniIndex]);
        assert_eq!(config.ndcg_type, NdcgType::TrecEval);
        assert_eq!(config.significance_tests, vec![SignificanceTest::Wilcoxon]);
        assert_eq!(config.output_format, OutputFormat::TrecEval);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.metric_settings().threshold, 4.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(EvaluationConfig::from_toml_str("alpha = 1.5").is_err());
        assert!(EvaluationConfig::from_toml_str("cutoffs = [0, 5]").is_err());
        assert!(EvaluationConfig::from_toml_str("strategy = \"popular\"").is_err());
        assert!(EvaluationConfig::from_toml_str("threshold = ").is_err());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = EvaluationConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(EvaluationConfig::from_toml_str(&text).unwrap(), config);
    }
}
