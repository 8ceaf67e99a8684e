//! Baseline-vs-methods comparison report.

use super::confidence::{anova_intervals, bootstrap_ci, paired_interval, unpaired_interval, ConfidenceInterval};
use super::descriptive::{defined_values, paired_values, standard_error, SampleStats};
use super::effect_size::{paired_effect_size, EffectSize};
use super::significance::{SignificanceTest, StatisticalSignificance};
use super::check_alpha;
use crate::config::{DEFAULT_ALPHA, DEFAULT_BOOTSTRAP_SAMPLES, DEFAULT_SEED};
use crate::data::Id;
use crate::error::StatsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// What a comparison computes.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSettings {
    pub tests: Vec<SignificanceTest>,
    pub alpha: f64,
    /// Bootstrap resamples per system; 0 skips the bootstrap intervals
    pub bootstrap_samples: usize,
    /// Seed of every bootstrap resampling
    pub seed: u64,
}

impl Default for ComparisonSettings {
    fn default() -> Self {
        Self {
            tests: SignificanceTest::all().to_vec(),
            alpha: DEFAULT_ALPHA,
            bootstrap_samples: DEFAULT_BOOTSTRAP_SAMPLES,
            seed: DEFAULT_SEED,
        }
    }
}

/// Statistics of one method against the baseline.
///
/// Values that cannot be computed (too few users) are `None` and serialize
/// as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodComparison {
    pub method: String,
    /// Users with a defined value in both the baseline and this method
    pub paired_users: usize,
    pub baseline_mean: Option<f64>,
    pub method_mean: Option<f64>,
    pub p_values: BTreeMap<SignificanceTest, Option<f64>>,
    pub cohens_d: Option<f64>,
    pub cohens_d_least_squares: Option<f64>,
    pub paired_effect_size: Option<f64>,
    pub standard_error: Option<f64>,
    /// Interval of the mean paired difference `method - baseline`
    pub difference_interval: Option<ConfidenceInterval>,
    /// Interval of `mean(method) - mean(baseline)` over every defined value
    /// of each side, paired or not
    pub unpaired_interval: Option<ConfidenceInterval>,
}

/// Comparison of a baseline against a set of methods on one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub baseline: String,
    pub alpha: f64,
    pub comparisons: Vec<MethodComparison>,
    /// Two-way ANOVA intervals per system (baseline included); empty when
    /// fewer than 2 users are shared by every system
    pub anova_intervals: BTreeMap<String, ConfidenceInterval>,
    /// Percentile bootstrap intervals of each system's mean (baseline
    /// included); systems without defined values are left out
    pub bootstrap_intervals: BTreeMap<String, ConfidenceInterval>,
}

impl StatisticsReport {
    /// Compares `baseline` against every method.
    ///
    /// # Errors
    ///
    /// `InvalidAlpha` for a significance level outside (0, 1).
    #[instrument(skip_all, fields(baseline = baseline_name, methods = methods.len()))]
    pub fn compute<U: Id>(
        baseline_name: &str,
        baseline: &BTreeMap<U, f64>,
        methods: &BTreeMap<String, BTreeMap<U, f64>>,
        settings: &ComparisonSettings,
    ) -> Result<Self, StatsError> {
        check_alpha(settings.alpha)?;

        let comparisons = methods
            .iter()
            .map(|(name, values)| compare(name, baseline, values, settings))
            .collect();

        let mut systems = methods.clone();
        systems.insert(baseline_name.to_string(), baseline.clone());
        let anova = match anova_intervals(&systems, settings.alpha) {
            Ok(intervals) => intervals,
            Err(e) => {
                warn!("Skipping ANOVA intervals: {}", e);
                BTreeMap::new()
            }
        };

        let bootstrap = if settings.bootstrap_samples == 0 {
            BTreeMap::new()
        } else {
            systems
                .iter()
                .map(|(name, values)| {
                    let interval = bootstrap_ci(
                        &defined_values(values),
                        settings.bootstrap_samples,
                        settings.alpha,
                        settings.seed,
                    );
                    (name.clone(), interval)
                })
                .filter(|(_, interval)| !interval.mean.is_nan())
                .collect()
        };

        info!("Compared {} methods against {}", methods.len(), baseline_name);
        Ok(Self {
            baseline: baseline_name.to_string(),
            alpha: settings.alpha,
            comparisons,
            anova_intervals: anova,
            bootstrap_intervals: bootstrap,
        })
    }

    pub fn comparison(&self, method: &str) -> Option<&MethodComparison> {
        self.comparisons.iter().find(|c| c.method == method)
    }
}

fn defined(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

fn compare<U: Id>(
    name: &str,
    baseline: &BTreeMap<U, f64>,
    other: &BTreeMap<U, f64>,
    settings: &ComparisonSettings,
) -> MethodComparison {
    let (paired, _) = paired_values(baseline, other);
    let baseline_values = defined_values(baseline);
    let other_values = defined_values(other);
    let mean = |values: &[f64]| SampleStats::from_values(values).ok().map(|s| s.mean);
    let cohen = |kind: EffectSize| {
        let b = SampleStats::from_values(&baseline_values).ok()?;
        let o = SampleStats::from_values(&other_values).ok()?;
        defined(kind.cohens_d(&b, &o))
    };

    MethodComparison {
        method: name.to_string(),
        paired_users: paired.len(),
        baseline_mean: mean(&baseline_values),
        method_mean: mean(&other_values),
        p_values: StatisticalSignificance::new(baseline, other)
            .p_values(&settings.tests)
            .into_iter()
            .map(|(test, p)| (test, defined(p)))
            .collect(),
        cohens_d: cohen(EffectSize::Classic),
        cohens_d_least_squares: cohen(EffectSize::LeastSquares),
        paired_effect_size: paired_effect_size(baseline, other).ok().and_then(defined),
        standard_error: standard_error(baseline, other).ok().and_then(defined),
        difference_interval: paired_interval(baseline, other, settings.alpha).ok(),
        unpaired_interval: unpaired_interval(&baseline_values, &other_values, settings.alpha).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: &[f64]) -> BTreeMap<u32, f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as u32, v))
            .collect()
    }

    #[test]
    fn test_report_covers_every_method() {
        let baseline = scores(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let mut methods = BTreeMap::new();
        methods.insert("better".to_string(), scores(&[0.2, 0.4, 0.35, 0.5, 0.65, 0.7]));
        methods.insert("same".to_string(), baseline.clone());

        let report =
            StatisticsReport::compute("base", &baseline, &methods, &ComparisonSettings::default()).unwrap();

        assert_eq!(report.comparisons.len(), 2);
        let better = report.comparison("better").unwrap();
        assert_eq!(better.paired_users, 6);
        assert!(better.p_values[&SignificanceTest::PairedTTest].unwrap() < 0.05);
        assert!(better.difference_interval.unwrap().lower > 0.0);

        let same = report.comparison("same").unwrap();
        assert_eq!(same.cohens_d, Some(0.0));
        // Wilcoxon has no non-zero differences
        assert_eq!(same.p_values[&SignificanceTest::Wilcoxon], None);

        assert_eq!(report.anova_intervals.len(), 3);
    }

    #[test]
    fn test_bootstrap_intervals_follow_settings() {
        let baseline = scores(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let mut methods = BTreeMap::new();
        methods.insert("m".to_string(), scores(&[0.3, 0.5, 0.4, 0.6, 0.8, 0.7]));
        let settings = ComparisonSettings {
            bootstrap_samples: 500,
            seed: 11,
            ..ComparisonSettings::default()
        };

        let report = StatisticsReport::compute("base", &baseline, &methods, &settings).unwrap();
        assert_eq!(report.bootstrap_intervals.len(), 2);
        let base = report.bootstrap_intervals["base"];
        assert_eq!(base, bootstrap_ci(&defined_values(&baseline), 500, 0.05, 11));
        assert!((base.mean - 0.35).abs() < 1e-12);
        assert!(base.lower <= base.mean && base.mean <= base.upper);

        let again = StatisticsReport::compute("base", &baseline, &methods, &settings).unwrap();
        assert_eq!(report, again);

        let disabled = ComparisonSettings {
            bootstrap_samples: 0,
            ..settings
        };
        let report = StatisticsReport::compute("base", &baseline, &methods, &disabled).unwrap();
        assert!(report.bootstrap_intervals.is_empty());
    }

    #[test]
    fn test_unpaired_interval_uses_every_user() {
        // the method covers users 0..6, the baseline only 0..3
        let baseline = scores(&[0.1, 0.2, 0.3]);
        let mut methods = BTreeMap::new();
        methods.insert("m".to_string(), scores(&[0.2, 0.3, 0.4, 0.8, 0.9, 1.0]));

        let report =
            StatisticsReport::compute("base", &baseline, &methods, &ComparisonSettings::default()).unwrap();
        let m = report.comparison("m").unwrap();
        assert_eq!(m.paired_users, 3);
        let unpaired = m.unpaired_interval.unwrap();
        assert!((unpaired.mean - (0.6 - 0.2)).abs() < 1e-12);
        assert!((m.difference_interval.unwrap().mean - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_report_serializes_undefined_as_null() {
        let baseline = scores(&[0.5]);
        let mut methods = BTreeMap::new();
        methods.insert("m".to_string(), scores(&[0.7]));
        let settings = ComparisonSettings {
            tests: vec![SignificanceTest::PairedTTest],
            ..ComparisonSettings::default()
        };
        let report = StatisticsReport::compute("base", &baseline, &methods, &settings).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        let comparison = &json["comparisons"][0];
        assert!(comparison["standard_error"].is_null());
        assert!(comparison["p_values"]["paired_t_test"].is_null());
        assert!(comparison["difference_interval"].is_null());
    }

    #[test]
    fn test_report_round_trips_with_undefined_values() {
        let baseline = scores(&[0.5]);
        let mut methods = BTreeMap::new();
        methods.insert("m".to_string(), scores(&[0.7]));
        let report =
            StatisticsReport::compute("base", &baseline, &methods, &ComparisonSettings::default()).unwrap();

        let json = serde_json::to_string(&report).unwrap();
        let parsed: StatisticsReport = serde_json::from_str(&json).unwrap();
        let comparison = parsed.comparison("m").unwrap();
        assert_eq!(comparison.paired_users, 1);
        assert_eq!(comparison.standard_error, None);
        assert_eq!(comparison.p_values[&SignificanceTest::PairedTTest], None);
        assert!(comparison.unpaired_interval.is_none());
    }

    #[test]
    fn test_report_rejects_bad_alpha() {
        let baseline = scores(&[0.5, 0.6]);
        let methods = BTreeMap::new();
        let settings = ComparisonSettings {
            alpha: 2.0,
            ..ComparisonSettings::default()
        };
        assert!(StatisticsReport::compute("base", &baseline, &methods, &settings).is_err());
    }
}
