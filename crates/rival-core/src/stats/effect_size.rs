//! Effect size measures.
//!
//! Cohen's d measures the standardized difference between two means. It is
//! useful for understanding practical significance beyond statistical
//! significance.
//!
//! # Interpretation (Cohen's conventions)
//!
//! - |d| < 0.2: negligible effect
//! - 0.2 <= |d| < 0.5: small effect
//! - 0.5 <= |d| < 0.8: medium effect
//! - |d| >= 0.8: large effect

use super::descriptive::{differences, paired_values, SampleStats};
use crate::data::Id;
use crate::error::StatsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Denominator used to pool the two standard deviations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSize {
    /// `sqrt(((n1-1)s1² + (n2-1)s2²) / (n1 + n2))`
    #[default]
    Classic,
    /// `sqrt(((n1-1)s1² + (n2-1)s2²) / (n1 + n2 - 2))`
    LeastSquares,
}

impl EffectSize {
    /// Cohen's d from two summaries: `|mean2 - mean1| / pooled_std`.
    ///
    /// Returns 0.0 when the pooled standard deviation is zero.
    pub fn cohens_d(self, baseline: &SampleStats, other: &SampleStats) -> f64 {
        let sum_sq = (baseline.n.saturating_sub(1)) as f64 * baseline.variance()
            + (other.n.saturating_sub(1)) as f64 * other.variance();
        let denominator = match self {
            EffectSize::Classic => (baseline.n + other.n) as f64,
            EffectSize::LeastSquares => (baseline.n + other.n).saturating_sub(2) as f64,
        };
        if denominator <= 0.0 {
            return 0.0;
        }
        let pooled_std = (sum_sq / denominator).sqrt();
        if pooled_std == 0.0 {
            return 0.0;
        }
        (other.mean - baseline.mean).abs() / pooled_std
    }
}

/// Cohen's d between two independent samples (NaN values skipped).
pub fn cohens_d(baseline: &[f64], other: &[f64], kind: EffectSize) -> Result<f64, StatsError> {
    let b = SampleStats::from_values(baseline)?;
    let o = SampleStats::from_values(other)?;
    Ok(kind.cohens_d(&b, &o))
}

/// Paired effect size: `|mean(d)| / sd(d)` over per-user differences.
///
/// Returns 0.0 when every difference is identical.
pub fn paired_effect_size<U: Id>(
    baseline: &BTreeMap<U, f64>,
    other: &BTreeMap<U, f64>,
) -> Result<f64, StatsError> {
    let (b, o) = paired_values(baseline, other);
    if b.len() < 2 {
        return Err(StatsError::InsufficientData(format!(
            "paired effect size needs at least 2 paired users, got {}",
            b.len()
        )));
    }
    let stats = SampleStats::from_values(&differences(&b, &o))?;
    if stats.std == 0.0 {
        return Ok(0.0);
    }
    Ok(stats.mean.abs() / stats.std)
}

/// Interprets Cohen's d value.
pub fn interpret_cohens_d(d: f64) -> &'static str {
    let d_abs = d.abs();
    if d_abs < 0.2 {
        "negligible"
    } else if d_abs < 0.5 {
        "small"
    } else if d_abs < 0.8 {
        "medium"
    } else {
        "large"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cohens_d_large_effect() {
        // Large difference
        let group_a = vec![0.9, 0.92, 0.88, 0.91, 0.89];
        let group_b = vec![0.5, 0.52, 0.48, 0.51, 0.49];

        let d = cohens_d(&group_a, &group_b, EffectSize::LeastSquares).unwrap();

        // Should be a very large effect, reported as a magnitude
        assert!(d > 2.0);
        assert_eq!(interpret_cohens_d(d), "large");
    }

    #[test]
    fn test_classic_vs_least_squares_denominator() {
        let a = SampleStats {
            n: 10,
            mean: 0.5,
            std: 0.1,
        };
        let b = SampleStats {
            n: 10,
            mean: 0.6,
            std: 0.1,
        };
        // sum of squares 18 * 0.01 = 0.18
        let classic = EffectSize::Classic.cohens_d(&a, &b);
        let ls = EffectSize::LeastSquares.cohens_d(&a, &b);
        assert!((classic - 0.1 / (0.18f64 / 20.0).sqrt()).abs() < 1e-9);
        assert!((ls - 1.0).abs() < 1e-9);
        assert!(classic < ls);
    }

    #[test]
    fn test_zero_spread_is_zero() {
        let d = cohens_d(&[0.5, 0.5], &[0.5, 0.5], EffectSize::Classic).unwrap();
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_paired_effect_size() {
        let a: BTreeMap<u32, f64> = [(1, 1.0), (2, 2.0), (3, 3.0)].into_iter().collect();
        let b: BTreeMap<u32, f64> = [(1, 2.0), (2, 4.0), (3, 6.0)].into_iter().collect();
        // differences 1, 2, 3: mean 2, sd 1
        assert!((paired_effect_size(&a, &b).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cohens_d_interpretation() {
        assert_eq!(interpret_cohens_d(0.1), "negligible");
        assert_eq!(interpret_cohens_d(0.3), "small");
        assert_eq!(interpret_cohens_d(0.6), "medium");
        assert_eq!(interpret_cohens_d(1.0), "large");
        assert_eq!(interpret_cohens_d(-0.9), "large"); // Absolute value
    }
}
