//! Confidence intervals.
//!
//! All intervals are two-sided: the margin uses the `1 - alpha/2` quantile.

use super::check_alpha;
use super::descriptive::{differences, paired_values, SampleStats};
use crate::data::Id;
use crate::error::StatsError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::BTreeMap;
use tracing::debug;

/// A point estimate with its interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Point estimate
    pub mean: f64,
    /// Lower bound of confidence interval
    pub lower: f64,
    /// Upper bound of confidence interval
    pub upper: f64,
}

impl ConfidenceInterval {
    fn symmetric(mean: f64, margin: f64) -> Self {
        Self {
            mean,
            lower: mean - margin,
            upper: mean + margin,
        }
    }

    /// Half-width of the interval.
    pub fn margin(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Formats the interval as "mean [lower, upper]".
    pub fn format(&self, precision: usize) -> String {
        format!(
            "{:.prec$} [{:.prec$}, {:.prec$}]",
            self.mean,
            self.lower,
            self.upper,
            prec = precision
        )
    }
}

/// Critical value `t(1 - alpha/2, df)`.
pub(crate) fn t_critical(alpha: f64, df: f64) -> Result<f64, StatsError> {
    let dist = StudentsT::new(0.0, 1.0, df)?;
    Ok(dist.inverse_cdf(1.0 - alpha / 2.0))
}

/// Interval for the mean of one sample.
pub fn t_interval(values: &[f64], alpha: f64) -> Result<ConfidenceInterval, StatsError> {
    check_alpha(alpha)?;
    let stats = SampleStats::from_values(values)?;
    if stats.n < 2 {
        return Err(StatsError::InsufficientData(
            "t interval needs at least 2 values".to_string(),
        ));
    }
    let margin = t_critical(alpha, (stats.n - 1) as f64)? * stats.std / (stats.n as f64).sqrt();
    Ok(ConfidenceInterval::symmetric(stats.mean, margin))
}

/// Interval for the mean paired difference `other - baseline`.
pub fn paired_interval<U: Id>(
    baseline: &BTreeMap<U, f64>,
    other: &BTreeMap<U, f64>,
    alpha: f64,
) -> Result<ConfidenceInterval, StatsError> {
    let (b, o) = paired_values(baseline, other);
    t_interval(&differences(&b, &o), alpha)
}

/// Interval for the difference of means `other - baseline` of two
/// independent samples, using the pooled standard deviation.
pub fn unpaired_interval(
    baseline: &[f64],
    other: &[f64],
    alpha: f64,
) -> Result<ConfidenceInterval, StatsError> {
    check_alpha(alpha)?;
    let b = SampleStats::from_values(baseline)?;
    let o = SampleStats::from_values(other)?;
    let df = b.n + o.n;
    if df < 3 {
        return Err(StatsError::InsufficientData(
            "unpaired interval needs at least 3 values".to_string(),
        ));
    }
    let df = (df - 2) as f64;
    let pooled = (((b.n - 1) as f64 * b.variance() + (o.n - 1) as f64 * o.variance()) / df).sqrt();
    let se = pooled * (1.0 / b.n as f64 + 1.0 / o.n as f64).sqrt();
    let margin = t_critical(alpha, df)? * se;
    Ok(ConfidenceInterval::symmetric(o.mean - b.mean, margin))
}

/// Per-system intervals from a two-way ANOVA (system × user) without
/// replication.
///
/// Only users with a defined value for every system are used. The residual
/// mean square pools the error variance of all systems, so every interval has
/// the same margin:
///
/// ```text
/// SSE    = Σ_s Σ_u (x_su - x̄_s - x̄_u + x̄)²
/// MSE    = SSE / ((S - 1)(N - 1))
/// margin = t(1 - alpha/2, (S - 1)(N - 1)) * sqrt(MSE / N)
/// ```
pub fn anova_intervals<U: Id>(
    systems: &BTreeMap<String, BTreeMap<U, f64>>,
    alpha: f64,
) -> Result<BTreeMap<String, ConfidenceInterval>, StatsError> {
    check_alpha(alpha)?;
    let num_systems = systems.len();
    if num_systems < 2 {
        return Err(StatsError::InsufficientData(
            "ANOVA needs at least 2 systems".to_string(),
        ));
    }

    let users: Vec<&U> = systems
        .values()
        .next()
        .map(|first| {
            first
                .keys()
                .filter(|user| {
                    systems
                        .values()
                        .all(|s| s.get(*user).is_some_and(|v| !v.is_nan()))
                })
                .collect()
        })
        .unwrap_or_default();
    let num_users = users.len();
    if num_users < 2 {
        return Err(StatsError::InsufficientData(format!(
            "ANOVA needs at least 2 users shared by all systems, got {}",
            num_users
        )));
    }

    // rows: systems, columns: users
    let matrix: Vec<Vec<f64>> = systems
        .values()
        .map(|s| users.iter().map(|u| s.get(*u).copied().unwrap_or(f64::NAN)).collect())
        .collect();
    let system_means: Vec<f64> = matrix
        .iter()
        .map(|row| row.iter().sum::<f64>() / num_users as f64)
        .collect();
    let user_means: Vec<f64> = (0..num_users)
        .map(|u| matrix.iter().map(|row| row[u]).sum::<f64>() / num_systems as f64)
        .collect();
    let grand_mean = system_means.iter().sum::<f64>() / num_systems as f64;

    let sse: f64 = matrix
        .iter()
        .zip(&system_means)
        .flat_map(|(row, s_mean)| {
            row.iter()
                .zip(&user_means)
                .map(move |(x, u_mean)| (x - s_mean - u_mean + grand_mean).powi(2))
        })
        .sum();
    let df = ((num_systems - 1) * (num_users - 1)) as f64;
    let mse = sse / df;
    let margin = t_critical(alpha, df)? * (mse / num_users as f64).sqrt();
    debug!(
        "ANOVA over {} systems x {} users: MSE={:.6}, margin={:.6}",
        num_systems, num_users, mse, margin
    );

    Ok(systems
        .keys()
        .cloned()
        .zip(system_means)
        .map(|(name, mean)| (name, ConfidenceInterval::symmetric(mean, margin)))
        .collect())
}

/// Computes a percentile bootstrap confidence interval for the mean.
///
/// Bootstrap resampling estimates the sampling distribution of the mean by:
/// 1. Resampling with replacement from the original data
/// 2. Computing the mean of each resample
/// 3. Taking the `alpha/2` and `1 - alpha/2` percentiles as the CI bounds
///
/// # Arguments
///
/// * `values` - Sample values (e.g., per-user NDCG scores)
/// * `n_bootstrap` - Number of bootstrap resamples (typically 1000-10000)
/// * `alpha` - Significance level (0.05 gives a 95% interval)
/// * `seed` - Random seed for reproducibility
///
/// Returns NaN bounds if `values` has no defined value.
pub fn bootstrap_ci(values: &[f64], n_bootstrap: usize, alpha: f64, seed: u64) -> ConfidenceInterval {
    let values: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if values.is_empty() || n_bootstrap == 0 {
        return ConfidenceInterval {
            mean: f64::NAN,
            lower: f64::NAN,
            upper: f64::NAN,
        };
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut bootstrap_means: Vec<f64> = (0..n_bootstrap)
        .map(|_| (0..n).map(|_| values[rng.gen_range(0..n)]).sum::<f64>() / n as f64)
        .collect();
    bootstrap_means.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let last = bootstrap_means.len() - 1;
    let lower_idx = ((n_bootstrap as f64) * alpha / 2.0) as usize;
    let upper_idx = ((n_bootstrap as f64) * (1.0 - alpha / 2.0)) as usize;

    ConfidenceInterval {
        mean,
        lower: bootstrap_means[lower_idx.min(last)],
        upper: bootstrap_means[upper_idx.min(last)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_t_interval_known_values() {
        // mean 5, sd sqrt(2/3), n 4: margin = t(0.975, 3) * sd / 2
        let result = t_interval(&[4.0, 5.0, 5.0, 6.0], 0.05).unwrap();
        let sd = (2.0f64 / 3.0).sqrt();
        let expected = 3.182446 * sd / 2.0;
        assert!((result.mean - 5.0).abs() < 1e-9);
        assert!((result.margin() - expected).abs() < 1e-4);
        assert!(result.contains(5.0));
    }

    #[test]
    fn test_interval_rejects_bad_alpha() {
        assert!(matches!(
            t_interval(&[1.0, 2.0], 0.0),
            Err(StatsError::InvalidAlpha(_))
        ));
        assert!(t_interval(&[1.0], 0.05).is_err());
    }

    #[test]
    fn test_paired_interval() {
        let a: BTreeMap<u32, f64> = [(1, 0.1), (2, 0.2), (3, 0.3), (4, 0.4)].into_iter().collect();
        let b: BTreeMap<u32, f64> = [(1, 0.3), (2, 0.5), (3, 0.4), (4, 0.6)].into_iter().collect();
        let result = paired_interval(&a, &b, 0.05).unwrap();
        // differences 0.2, 0.3, 0.1, 0.2
        assert!((result.mean - 0.2).abs() < 1e-9);
        assert!(result.lower > 0.0);
    }

    #[test]
    fn test_unpaired_interval_contains_difference() {
        let a = [0.70, 0.75, 0.72, 0.68, 0.74];
        let b = [0.80, 0.85, 0.82, 0.78, 0.84];
        let result = unpaired_interval(&a, &b, 0.05).unwrap();
        assert!((result.mean - 0.1).abs() < 1e-9);
        assert!(result.lower > 0.0);
        assert!(result.upper < 0.2);
    }

    #[test]
    fn test_anova_intervals_share_margin() {
        let mut systems: BTreeMap<String, BTreeMap<u32, f64>> = BTreeMap::new();
        systems.insert(
            "a".to_string(),
            [(1, 0.5), (2, 0.6), (3, 0.7), (4, 0.4)].into_iter().collect(),
        );
        systems.insert(
            "b".to_string(),
            [(1, 0.6), (2, 0.8), (3, 0.7), (4, 0.5), (5, 0.9)].into_iter().collect(),
        );
        let intervals = anova_intervals(&systems, 0.05).unwrap();

        assert!((intervals["a"].mean - 0.55).abs() < 1e-9);
        assert!((intervals["b"].mean - 0.65).abs() < 1e-9);
        assert!((intervals["a"].margin() - intervals["b"].margin()).abs() < 1e-12);
        assert!(intervals["a"].margin() > 0.0);
    }

    #[test]
    fn test_anova_matches_paired_margin_for_two_systems() {
        // With two systems the ANOVA margin is half the paired-difference margin
        let a: BTreeMap<u32, f64> = [(1, 0.1), (2, 0.4), (3, 0.3), (4, 0.2)].into_iter().collect();
        let b: BTreeMap<u32, f64> = [(1, 0.3), (2, 0.5), (3, 0.6), (4, 0.2)].into_iter().collect();
        let mut systems = BTreeMap::new();
        systems.insert("a".to_string(), a.clone());
        systems.insert("b".to_string(), b.clone());

        let anova = anova_intervals(&systems, 0.05).unwrap();
        let paired = paired_interval(&a, &b, 0.05).unwrap();
        assert!((anova["a"].margin() * 2.0 / 2f64.sqrt() - paired.margin()).abs() < 1e-9);
    }

    #[test]
    fn test_bootstrap_ci_basic() {
        let values = vec![0.85, 0.90, 0.88, 0.92, 0.87, 0.89, 0.91, 0.86, 0.88, 0.90];
        let result = bootstrap_ci(&values, 1000, 0.05, 42);

        // Mean should be approximately 0.886
        assert!((result.mean - 0.886).abs() < 0.01);

        // CI should contain the mean
        assert!(result.lower <= result.mean);
        assert!(result.upper >= result.mean);

        // CI width should be reasonable
        let width = result.upper - result.lower;
        assert!(width > 0.01 && width < 0.1);

        assert_eq!(result, bootstrap_ci(&values, 1000, 0.05, 42));
    }

    #[test]
    fn test_bootstrap_ci_single_value() {
        let result = bootstrap_ci(&[0.9], 100, 0.05, 42);
        assert!((result.lower - 0.9).abs() < 0.001);
        assert!((result.upper - 0.9).abs() < 0.001);
    }

    #[test]
    fn test_bootstrap_ci_empty() {
        let result = bootstrap_ci(&[], 100, 0.05, 42);
        assert!(result.mean.is_nan());
    }
}
