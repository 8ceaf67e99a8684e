//! Significance tests between a baseline and another method.
//!
//! | Test | Pairing | Statistic |
//! |------|---------|-----------|
//! | [`ttest`] | independent | Welch's t |
//! | [`paired_ttest`] | users in both | t on differences |
//! | [`wilcoxon`] | users in both | signed-rank W+ |
//!
//! All p-values are two-tailed. Positive statistics mean the other method
//! scores higher than the baseline.

use super::descriptive::{defined_values, differences, paired_values, SampleStats};
use crate::config::EXACT_WILCOXON_LIMIT;
use crate::data::Id;
use crate::error::StatsError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Result of a t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    /// t-statistic (positive if the other method > baseline)
    pub t_statistic: f64,
    /// Two-tailed p-value
    pub p_value: f64,
    /// Degrees of freedom (fractional for Welch's test)
    pub df: f64,
}

impl TTestResult {
    /// Returns true if the difference is significant at the given alpha level.
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }

    /// Formats the result for display.
    pub fn format(&self) -> String {
        let sig_marker = if self.is_significant(0.05) { "*" } else { "" };
        format!(
            "t({:.1})={:.3}, p={:.4}{}",
            self.df, self.t_statistic, self.p_value, sig_marker
        )
    }
}

/// Two-tailed p-value of `t` under Student's t with `df` degrees of freedom.
fn t_p_value(t: f64, df: f64) -> Result<f64, StatsError> {
    let dist = StudentsT::new(0.0, 1.0, df)?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).min(1.0))
}

/// Welch's unequal-variance t-test on two independent samples.
///
/// # Errors
///
/// `InsufficientData` if either sample has fewer than 2 defined values.
pub fn ttest(baseline: &[f64], other: &[f64]) -> Result<TTestResult, StatsError> {
    let b = SampleStats::from_values(baseline)?;
    let o = SampleStats::from_values(other)?;
    if b.n < 2 || o.n < 2 {
        return Err(StatsError::InsufficientData(
            "t-test needs at least 2 values per sample".to_string(),
        ));
    }

    let vb = b.variance() / b.n as f64;
    let vo = o.variance() / o.n as f64;
    let se = (vb + vo).sqrt();
    if se == 0.0 {
        return Ok(no_difference(b.mean, o.mean, (b.n + o.n - 2) as f64));
    }

    let t = (o.mean - b.mean) / se;
    // Welch-Satterthwaite
    let df = (vb + vo).powi(2)
        / (vb.powi(2) / (b.n - 1) as f64 + vo.powi(2) / (o.n - 1) as f64);
    Ok(TTestResult {
        t_statistic: t,
        p_value: t_p_value(t, df)?,
        df,
    })
}

/// Performs a paired t-test on the users present in both maps.
///
/// # Errors
///
/// `InsufficientData` if fewer than 2 users are paired.
pub fn paired_ttest<U: Id>(
    baseline: &BTreeMap<U, f64>,
    other: &BTreeMap<U, f64>,
) -> Result<TTestResult, StatsError> {
    let (b, o) = paired_values(baseline, other);
    let n = b.len();
    if n < 2 {
        return Err(StatsError::InsufficientData(format!(
            "paired t-test needs at least 2 paired users, got {}",
            n
        )));
    }

    let diffs = SampleStats::from_values(&differences(&b, &o))?;
    let df = (n - 1) as f64;

    // Standard error of the mean difference
    let se = diffs.std / (n as f64).sqrt();
    if se == 0.0 {
        return Ok(no_difference(0.0, diffs.mean, df));
    }

    let t = diffs.mean / se;
    Ok(TTestResult {
        t_statistic: t,
        p_value: t_p_value(t, df)?,
        df,
    })
}

/// Zero-variance case: identical means are not significant, any other
/// constant shift is.
fn no_difference(baseline_mean: f64, other_mean: f64, df: f64) -> TTestResult {
    let diff = other_mean - baseline_mean;
    if diff == 0.0 {
        TTestResult {
            t_statistic: 0.0,
            p_value: 1.0,
            df,
        }
    } else {
        TTestResult {
            t_statistic: diff.signum() * f64::INFINITY,
            p_value: 0.0,
            df,
        }
    }
}

// ============================================================================
// Wilcoxon signed-rank test
// ============================================================================

/// Result of a Wilcoxon signed-rank test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WilcoxonResult {
    /// Sum of ranks of positive differences (other > baseline)
    pub w_plus: f64,
    /// Sum of ranks of negative differences
    pub w_minus: f64,
    /// Number of non-zero differences
    pub n: usize,
    /// Two-tailed p-value
    pub p_value: f64,
    /// Whether the exact null distribution was used
    pub exact: bool,
}

/// Wilcoxon signed-rank test on the users present in both maps.
///
/// Zero differences are dropped. Tied absolute differences get average
/// ranks. Both comparisons allow for floating-point noise, so `0.3 - 0.1`
/// and `0.5 - 0.3` tie. Samples of at most [`EXACT_WILCOXON_LIMIT`] differences without
/// ties use the exact null distribution; otherwise a normal approximation
/// with tie and continuity correction is used.
///
/// # Errors
///
/// `InsufficientData` if every paired difference is zero.
pub fn wilcoxon<U: Id>(
    baseline: &BTreeMap<U, f64>,
    other: &BTreeMap<U, f64>,
) -> Result<WilcoxonResult, StatsError> {
    let (b, o) = paired_values(baseline, other);
    let mut diffs: Vec<f64> = differences(&b, &o)
        .into_iter()
        .filter(|d| !nearly_equal(*d, 0.0))
        .collect();
    let n = diffs.len();
    if n == 0 {
        return Err(StatsError::InsufficientData(
            "Wilcoxon test needs at least one non-zero difference".to_string(),
        ));
    }

    diffs.sort_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap_or(std::cmp::Ordering::Equal));

    // Average ranks over groups of equal |d|
    let mut w_plus = 0.0;
    let mut tie_correction = 0.0;
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && nearly_equal(diffs[end + 1].abs(), diffs[start].abs()) {
            end += 1;
        }
        let size = (end - start + 1) as f64;
        let rank = (start + end) as f64 / 2.0 + 1.0;
        w_plus += diffs[start..=end].iter().filter(|d| **d > 0.0).count() as f64 * rank;
        tie_correction += size.powi(3) - size;
        start = end + 1;
    }

    let total = (n * (n + 1)) as f64 / 2.0;
    let w_minus = total - w_plus;

    let (p_value, exact) = if n <= EXACT_WILCOXON_LIMIT && tie_correction == 0.0 {
        (exact_p_value(w_plus.min(w_minus).round() as usize, n), true)
    } else {
        (normal_p_value(w_plus, n, tie_correction)?, false)
    };

    Ok(WilcoxonResult {
        w_plus,
        w_minus,
        n,
        p_value,
        exact,
    })
}

/// Equality up to a relative tolerance of 1e-12 (absolute below 1).
fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
}

/// `2 * P(W <= w)` under the exact null distribution of W+ for `n` ranks.
fn exact_p_value(w: usize, n: usize) -> f64 {
    let max = n * (n + 1) / 2;
    // counts[s] = number of rank subsets summing to s
    let mut counts = vec![0.0f64; max + 1];
    counts[0] = 1.0;
    for rank in 1..=n {
        for s in (rank..=max).rev() {
            counts[s] += counts[s - rank];
        }
    }
    let total = 2f64.powi(n as i32);
    let tail: f64 = counts[..=w.min(max)].iter().sum();
    (2.0 * tail / total).min(1.0)
}

fn normal_p_value(w_plus: f64, n: usize, tie_correction: f64) -> Result<f64, StatsError> {
    let n = n as f64;
    let mean = n * (n + 1.0) / 4.0;
    let variance = n * (n + 1.0) * (2.0 * n + 1.0) / 24.0 - tie_correction / 48.0;
    if variance <= 0.0 {
        return Ok(1.0);
    }
    let z = ((w_plus - mean).abs() - 0.5).max(0.0) / variance.sqrt();
    let normal = Normal::new(0.0, 1.0)?;
    Ok((2.0 * (1.0 - normal.cdf(z))).min(1.0))
}

// ============================================================================
// Test selection
// ============================================================================

/// Significance tests selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceTest {
    TTest,
    PairedTTest,
    Wilcoxon,
}

impl SignificanceTest {
    /// Returns all tests for iteration.
    pub fn all() -> &'static [SignificanceTest] {
        &[
            SignificanceTest::TTest,
            SignificanceTest::PairedTTest,
            SignificanceTest::Wilcoxon,
        ]
    }
}

impl fmt::Display for SignificanceTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignificanceTest::TTest => f.write_str("t_test"),
            SignificanceTest::PairedTTest => f.write_str("paired_t_test"),
            SignificanceTest::Wilcoxon => f.write_str("wilcoxon"),
        }
    }
}

impl FromStr for SignificanceTest {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "ttest" | "t" => Ok(SignificanceTest::TTest),
            "pairedttest" | "pairedt" => Ok(SignificanceTest::PairedTTest),
            "wilcoxon" | "wilcoxonsignedrank" => Ok(SignificanceTest::Wilcoxon),
            _ => Err(StatsError::UnknownTest(s.to_string())),
        }
    }
}

/// Per-user scores of a baseline and another method, ready for testing.
#[derive(Debug, Clone)]
pub struct StatisticalSignificance<'a, U: Id> {
    baseline: &'a BTreeMap<U, f64>,
    other: &'a BTreeMap<U, f64>,
}

impl<'a, U: Id> StatisticalSignificance<'a, U> {
    pub fn new(baseline: &'a BTreeMap<U, f64>, other: &'a BTreeMap<U, f64>) -> Self {
        Self { baseline, other }
    }

    /// Two-tailed p-value of the chosen test.
    pub fn p_value(&self, test: SignificanceTest) -> Result<f64, StatsError> {
        match test {
            SignificanceTest::TTest => {
                ttest(&defined_values(self.baseline), &defined_values(self.other)).map(|r| r.p_value)
            }
            SignificanceTest::PairedTTest => paired_ttest(self.baseline, self.other).map(|r| r.p_value),
            SignificanceTest::Wilcoxon => wilcoxon(self.baseline, self.other).map(|r| r.p_value),
        }
    }

    /// p-values of several tests; failing tests map to NaN.
    pub fn p_values(&self, tests: &[SignificanceTest]) -> BTreeMap<SignificanceTest, f64> {
        tests
            .iter()
            .map(|&test| (test, self.p_value(test).unwrap_or(f64::NAN)))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
