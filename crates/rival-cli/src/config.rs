//! Configuration loading and command-line overrides.
//!
//! Every subcommand starts from an [`EvaluationConfig`]: the TOML file given
//! with `--config`, or the library defaults. Flags given on the command line
//! replace the corresponding config values.

use crate::{CompareArgs, EvaluateArgs, EvaluationInputs};
use anyhow::{Context, Result};
use rival_core::config::EvaluationConfig;
use std::path::Path;
use tracing::info;

/// Loads the configuration file, or the defaults when none is given.
pub fn load(path: Option<&Path>) -> Result<EvaluationConfig> {
    match path {
        Some(path) => {
            let config = EvaluationConfig::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?;
            info!("Using configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(EvaluationConfig::default()),
    }
}

/// Applies the strategy flags shared by `strategy` and `evaluate`.
pub fn with_inputs(base: &EvaluationConfig, inputs: &EvaluationInputs) -> Result<EvaluationConfig> {
    let mut config = base.clone();
    if let Some(strategy) = inputs.strategy {
        config.strategy = strategy;
    }
    if let Some(threshold) = inputs.threshold {
        config.threshold = threshold;
    }
    if let Some(n) = inputs.rel_plus_n {
        config.rel_plus_n = n;
    }
    if let Some(seed) = inputs.seed {
        config.seed = seed;
    }
    config.validate().context("Invalid evaluation settings")?;
    Ok(config)
}

/// Applies the `evaluate` flags on top of the strategy flags.
pub fn for_evaluate(base: &EvaluationConfig, args: &EvaluateArgs) -> Result<EvaluationConfig> {
    let mut config = with_inputs(base, &args.inputs)?;
    if !args.metrics.is_empty() {
        config.metrics = args.metrics.clone();
    }
    if !args.cutoffs.is_empty() {
        config.cutoffs = args.cutoffs.clone();
    }
    if let Some(ndcg_type) = args.ndcg_type {
        config.ndcg_type = ndcg_type;
    }
    config.validate().context("Invalid evaluation settings")?;
    Ok(config)
}

/// Applies the `compare` flags.
pub fn for_compare(base: &EvaluationConfig, args: &CompareArgs) -> Result<EvaluationConfig> {
    let mut config = base.clone();
    if !args.tests.is_empty() {
        config.significance_tests = args.tests.clone();
    }
    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if let Some(samples) = args.bootstrap_samples {
        config.bootstrap_samples = samples;
    }
    config.validate().context("Invalid comparison settings")?;
    Ok(config)
}
