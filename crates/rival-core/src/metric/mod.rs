//! Metric engine.
//!
//! Metrics are immutable configurations with a pure `compute` that consumes a
//! prediction model and a test model and returns a [`MetricResult`]. There is
//! no hidden cache: computing twice over the same inputs yields the same
//! result, and a metric can be reused across different inputs.
//!
//! # Metric families
//!
//! | Module | Metrics | Granularity |
//! |--------|---------|-------------|
//! | [`accuracy`] | MAE, RMSE | per user + pooled global |
//! | [`ranking`] | Precision, Recall, MAP, NDCG, PopularityStratifiedRecall | per user, @k |
//! | [`novelty`] | EPC, EFD, EPD, EILD | per user, @k |
//! | [`diversity`] | AggrDiv, GiniIndex | system level, @k |
//!
//! # Cutoffs
//!
//! Ranking-style metrics are evaluated at each requested cutoff k. When a
//! user's list is shorter than k, the state reached at the end of the list is
//! finished at k (carry-forward): Precision divides by k, Recall/MAP keep
//! their whole-list value, NDCG normalizes by the ideal DCG at k.
//!
//! Global values are the mean over users with a defined (non-NaN) value.
//! Users without predictions are absent, never zero-filled.

pub mod accuracy;
pub mod distance;
pub mod diversity;
pub mod novelty;
pub mod ranking;
pub mod registry;

use crate::data::{DataModel, Id};
use crate::error::MetricError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub use accuracy::{ErrorStrategy, Mae, Rmse};
pub use distance::{CosineDistance, ItemDistance, JaccardDistance};
pub use diversity::{AggrDiv, GiniIndex};
pub use novelty::{Efd, Eild, Epc, Epd, ItemNovelty, NoveltyMetric, RankDiscount};
pub use ranking::{Map, Ndcg, NdcgType, PopularityStratifiedRecall, Precision, Recall};
pub use registry::{DistanceKind, MetricKind, MetricSettings};

/// Common contract of every metric.
pub trait Metric<U: Id, I: Id> {
    /// Metric name used in reports.
    fn name(&self) -> String;

    /// Computes the metric for `predictions` against `test`.
    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U>;
}

/// Metrics evaluated at ranking cutoffs.
pub trait RankingMetric<U: Id, I: Id>: Metric<U, I> {
    /// Normalized (sorted, deduplicated, non-zero) cutoffs.
    fn cutoffs(&self) -> &[usize];
}

/// Values at one cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoffValue<U> {
    /// Aggregate value at the cutoff
    pub value: f64,
    /// Per-user values; `None` for system-level metrics
    pub per_user: Option<BTreeMap<U, f64>>,
}

/// One report entry: the aggregate value and the per-user values.
///
/// The aggregate lives in its own field, so no user id can shadow it.
/// NaN becomes `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub all: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub users: BTreeMap<String, Option<f64>>,
}

/// Immutable result of a metric computation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResult<U: Id> {
    name: String,
    value: f64,
    per_user: Option<BTreeMap<U, f64>>,
    at: BTreeMap<usize, CutoffValue<U>>,
}

impl<U: Id> MetricResult<U> {
    /// Result whose global value is the mean of the defined per-user values.
    pub fn from_users(name: impl Into<String>, per_user: BTreeMap<U, f64>) -> Self {
        Self {
            name: name.into(),
            value: mean_defined(per_user.values().copied()),
            per_user: Some(per_user),
            at: BTreeMap::new(),
        }
    }

    /// System-level result: no per-user breakdown.
    pub fn system(name: impl Into<String>, value: f64, at: BTreeMap<usize, f64>) -> Self {
        Self {
            name: name.into(),
            value,
            per_user: None,
            at: at
                .into_iter()
                .map(|(k, value)| {
                    (
                        k,
                        CutoffValue {
                            value,
                            per_user: None,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Overrides the global value (pooled metrics).
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    /// Adds per-user cutoff values, aggregated by mean of defined values.
    pub fn with_user_cutoffs(mut self, at: BTreeMap<usize, BTreeMap<U, f64>>) -> Self {
        for (k, users) in at {
            let value = mean_defined(users.values().copied());
            self.at.insert(
                k,
                CutoffValue {
                    value,
                    per_user: Some(users),
                },
            );
        }
        self
    }

    /// Overrides the aggregate at a cutoff (pooled metrics).
    pub fn with_value_at(mut self, cutoff: usize, value: f64) -> Self {
        if let Some(entry) = self.at.get_mut(&cutoff) {
            entry.value = value;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global value; NaN when no user contributed.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Per-user values over the whole list.
    pub fn value_per_user(&self) -> Result<&BTreeMap<U, f64>, MetricError> {
        self.per_user.as_ref().ok_or_else(|| self.not_applicable())
    }

    /// Whole-list value of one user; NaN for users that did not contribute.
    pub fn user_value(&self, user: &U) -> Result<f64, MetricError> {
        Ok(self
            .value_per_user()?
            .get(user)
            .copied()
            .unwrap_or(f64::NAN))
    }

    /// Aggregate at a cutoff; NaN for cutoffs that were not requested.
    pub fn value_at(&self, cutoff: usize) -> f64 {
        self.at.get(&cutoff).map(|c| c.value).unwrap_or(f64::NAN)
    }

    /// Value of one user at a cutoff; NaN when undefined.
    pub fn user_value_at(&self, user: &U, cutoff: usize) -> Result<f64, MetricError> {
        if self.per_user.is_none() {
            return Err(self.not_applicable());
        }
        Ok(self
            .at
            .get(&cutoff)
            .and_then(|c| c.per_user.as_ref())
            .and_then(|users| users.get(user))
            .copied()
            .unwrap_or(f64::NAN))
    }

    /// Per-user values at a cutoff.
    pub fn values_per_user_at(&self, cutoff: usize) -> Result<Option<&BTreeMap<U, f64>>, MetricError> {
        if self.per_user.is_none() {
            return Err(self.not_applicable());
        }
        Ok(self.at.get(&cutoff).and_then(|c| c.per_user.as_ref()))
    }

    /// Evaluated cutoffs in ascending order.
    pub fn cutoffs(&self) -> impl Iterator<Item = usize> + '_ {
        self.at.keys().copied()
    }

    /// True for metrics with no per-user breakdown.
    pub fn is_system_level(&self) -> bool {
        self.per_user.is_none()
    }

    /// Flattens the result into one `name` entry for the whole list plus one
    /// `name@k` entry per cutoff.
    pub fn report(&self) -> BTreeMap<String, ReportEntry> {
        let mut report = BTreeMap::new();
        report.insert(
            self.name.clone(),
            report_entry(self.value, self.per_user.as_ref()),
        );
        for (k, cutoff) in &self.at {
            report.insert(
                format!("{}@{}", self.name, k),
                report_entry(cutoff.value, cutoff.per_user.as_ref()),
            );
        }
        report
    }

    fn not_applicable(&self) -> MetricError {
        MetricError::NotApplicable {
            metric: self.name.clone(),
            granularity: "per user",
        }
    }
}

fn report_entry<U: Id>(value: f64, per_user: Option<&BTreeMap<U, f64>>) -> ReportEntry {
    ReportEntry {
        all: defined(value),
        users: per_user
            .map(|users| {
                users
                    .iter()
                    .map(|(user, &v)| (user.to_string(), defined(v)))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn defined(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

/// Mean of the non-NaN values; NaN if there are none.
pub fn mean_defined(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Sorts and deduplicates cutoffs, dropping zero.
pub fn normalize_cutoffs(cutoffs: &[usize]) -> Vec<usize> {
    let mut sorted: Vec<usize> = cutoffs
        .iter()
        .copied()
        .filter(|&k| {
            if k == 0 {
                warn!("Ignoring cutoff 0");
            }
            k > 0
        })
        .collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

/// Finishes a per-rank state sequence at each cutoff.
///
/// `states[r]` is the accumulated state after the first `r` ranked items
/// (`states[0]` is the empty list). A cutoff past the end of the list uses the
/// final state, still finished at the requested cutoff.
pub(crate) fn carry_forward<S, F>(states: &[S], cutoffs: &[usize], finish: F) -> BTreeMap<usize, f64>
where
    F: Fn(&S, usize) -> f64,
{
    let last = states.len().saturating_sub(1);
    cutoffs
        .iter()
        .filter_map(|&k| states.get(k.min(last)).map(|state| (k, finish(state, k))))
        .collect()
}

/// Moves per-user cutoff rows into cutoff-major layout.
pub(crate) fn transpose_cutoffs<U: Id>(
    rows: Vec<(U, BTreeMap<usize, f64>)>,
    cutoffs: &[usize],
) -> BTreeMap<usize, BTreeMap<U, f64>> {
    let mut at: BTreeMap<usize, BTreeMap<U, f64>> =
        cutoffs.iter().map(|&k| (k, BTreeMap::new())).collect();
    for (user, values) in rows {
        for (k, v) in values {
            at.entry(k).or_default().insert(user.clone(), v);
        }
    }
    at
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_defined_skips_nan() {
        assert_eq!(mean_defined([1.0, f64::NAN, 3.0]), 2.0);
        assert!(mean_defined([f64::NAN]).is_nan());
        assert!(mean_defined(Vec::<f64>::new()).is_nan());
    }

    #[test]
    fn test_normalize_cutoffs() {
        assert_eq!(normalize_cutoffs(&[10, 0, 5, 10, 1]), vec![1, 5, 10]);
    }

    #[test]
    fn test_carry_forward_uses_last_state() {
        // hits after 0, 1, 2 items
        let states = [0usize, 1, 1];
        let values = carry_forward(&states, &[1, 2, 5], |hits, k| *hits as f64 / k as f64);
        assert_eq!(values[&1], 1.0);
        assert_eq!(values[&2], 0.5);
        assert_eq!(values[&5], 0.2);
    }

    #[test]
    fn test_system_result_rejects_per_user_access() {
        let result: MetricResult<u32> = MetricResult::system("AggrDiv", 3.0, BTreeMap::new());
        assert!(result.value_per_user().is_err());
        assert!(result.user_value(&1).is_err());
        assert!(result.user_value_at(&1, 5).is_err());
        assert!(result.is_system_level());
    }

    #[test]
    fn test_report_layout() {
        let per_user: BTreeMap<u32, f64> = [(1, 0.5), (2, f64::NAN)].into_iter().collect();
        let at: BTreeMap<usize, BTreeMap<u32, f64>> =
            [(5, [(1, 0.2)].into_iter().collect())].into_iter().collect();
        let result = MetricResult::from_users("Precision", per_user).with_user_cutoffs(at);
        let report = result.report();

        assert_eq!(report["Precision"].all, Some(0.5));
        assert_eq!(report["Precision"].users["2"], None);
        assert_eq!(report["Precision@5"].users["1"], Some(0.2));
        assert!(result.value_at(10).is_nan());
    }

    #[test]
    fn test_report_user_named_all_keeps_aggregate() {
        let per_user: BTreeMap<String, f64> =
            [("all".to_string(), 0.0), ("bob".to_string(), 1.0)].into_iter().collect();
        let result = MetricResult::from_users("Precision", per_user);
        let report = result.report();

        assert_eq!(result.value(), 0.5);
        assert_eq!(report["Precision"].all, Some(0.5));
        assert_eq!(report["Precision"].users["all"], Some(0.0));
        assert_eq!(report["Precision"].users["bob"], Some(1.0));
    }

    #[test]
    fn test_system_report_has_no_users() {
        let at: BTreeMap<usize, f64> = [(5, 4.0)].into_iter().collect();
        let result: MetricResult<u32> = MetricResult::system("AggrDiv", 7.0, at);
        let report = result.report();
        assert_eq!(report["AggrDiv"].all, Some(7.0));
        assert!(report["AggrDiv@5"].users.is_empty());
    }
}
