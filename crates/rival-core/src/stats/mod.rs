//! Statistical utilities for comparing recommenders.
//!
//! This module compares a baseline's per-user metric values against other
//! methods', including:
//! - Significance tests (t-test, paired t-test, Wilcoxon signed-rank)
//! - Effect sizes (Cohen's d, paired effect size)
//! - Standard error of paired differences
//! - Confidence intervals (t-based, two-way ANOVA, bootstrap)
//!
//! Paired statistics use the users present in both maps; NaN values (users
//! without a defined metric value) are skipped everywhere.
//!
//! # References
//!
//! - Smucker et al. (2007). "A comparison of statistical significance tests for IR evaluation"
//! - Sakai (2014). "Statistical reform in information retrieval?"
//! - Efron & Tibshirani (1993). "An Introduction to the Bootstrap"

pub mod confidence;
pub mod descriptive;
pub mod effect_size;
pub mod report;
pub mod significance;

pub use confidence::{
    anova_intervals, bootstrap_ci, paired_interval, t_interval, unpaired_interval, ConfidenceInterval,
};
pub use descriptive::{defined_values, paired_values, standard_error, SampleStats};
pub use effect_size::{cohens_d, interpret_cohens_d, paired_effect_size, EffectSize};
pub use report::{ComparisonSettings, MethodComparison, StatisticsReport};
pub use significance::{
    paired_ttest, ttest, wilcoxon, SignificanceTest, StatisticalSignificance, TTestResult, WilcoxonResult,
};

use crate::error::StatsError;

/// Checks that `alpha` is a usable significance level.
pub(crate) fn check_alpha(alpha: f64) -> Result<(), StatsError> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(StatsError::InvalidAlpha(alpha))
    }
}
