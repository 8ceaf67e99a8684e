//! System-level (aggregate) diversity metrics.
//!
//! These look at the items recommended across all users at once, so they
//! have no per-user values: the per-user accessors of their results return
//! [`MetricError::NotApplicable`](crate::error::MetricError::NotApplicable).
//! The users considered are the test users that have predictions.

use super::{normalize_cutoffs, Metric, MetricResult, RankingMetric};
use crate::data::{DataModel, Id};
use crate::ranking::ranked_test_relevance;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Ranked item lists of every evaluated user.
fn ranked_lists<U: Id, I: Id>(predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> Vec<Vec<I>> {
    ranked_test_relevance(predictions, test)
        .into_values()
        .map(|list| list.items.into_iter().map(|(item, _)| item).collect())
        .collect()
}

/// Aggregate diversity: number of distinct items recommended to anyone.
#[derive(Debug, Clone)]
pub struct AggrDiv {
    cutoffs: Vec<usize>,
}

impl AggrDiv {
    pub fn new(cutoffs: &[usize]) -> Self {
        Self {
            cutoffs: normalize_cutoffs(cutoffs),
        }
    }
}

impl<U: Id, I: Id> RankingMetric<U, I> for AggrDiv {
    fn cutoffs(&self) -> &[usize] {
        &self.cutoffs
    }
}

impl<U: Id, I: Id> Metric<U, I> for AggrDiv {
    fn name(&self) -> String {
        "AggrDiv".to_string()
    }

    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U> {
        let lists = ranked_lists(predictions, test);
        let distinct = |depth: usize| -> f64 {
            lists
                .iter()
                .flat_map(|list| list.iter().take(depth))
                .collect::<HashSet<_>>()
                .len() as f64
        };

        let value = distinct(usize::MAX);
        let at = self.cutoffs.iter().map(|&k| (k, distinct(k))).collect();
        debug!("AggrDiv over {} lists: {}", lists.len(), value);
        MetricResult::system("AggrDiv", value, at)
    }
}

/// Gini index of how recommendations spread over the catalog.
///
/// # Formula
///
/// Item counts `c_1 ≤ … ≤ c_n` over the top-k of every list, padded with
/// zeros for the catalog items never recommended:
///
/// ```text
/// G = Σ_j (2j - n - 1) * c_j / ((n - 1) * Σ_j c_j)
/// ```
///
/// `G = 0` when every catalog item is recommended equally often and `G = 1`
/// when every recommendation is the same item. The complement `1 - G` reads
/// as a diversity score.
#[derive(Debug, Clone)]
pub struct GiniIndex {
    num_items: usize,
    cutoffs: Vec<usize>,
    complement: bool,
}

impl GiniIndex {
    /// # Arguments
    ///
    /// * `num_items` - Catalog size; raised to the number of distinct
    ///   recommended items if smaller
    pub fn new(num_items: usize, cutoffs: &[usize]) -> Self {
        Self {
            num_items,
            cutoffs: normalize_cutoffs(cutoffs),
            complement: false,
        }
    }

    /// Reports `1 - G` instead of `G`.
    pub fn complement(mut self, complement: bool) -> Self {
        self.complement = complement;
        self
    }

    /// Gini index of a count distribution over `num_items` catalog items.
    pub fn from_counts<I: Id>(counts: &HashMap<I, usize>, num_items: usize) -> f64 {
        let n = num_items.max(counts.len());
        let total: usize = counts.values().sum();
        if n <= 1 || total == 0 {
            return f64::NAN;
        }

        let mut sorted: Vec<usize> = counts.values().copied().collect();
        sorted.sort_unstable();
        // Zero counts occupy ranks 1..=offset and contribute nothing
        let offset = n - sorted.len();
        let weighted: f64 = sorted
            .iter()
            .enumerate()
            .map(|(idx, &count)| {
                let rank = (idx + 1 + offset) as f64;
                (2.0 * rank - n as f64 - 1.0) * count as f64
            })
            .sum();
        weighted / ((n - 1) as f64 * total as f64)
    }

    fn at_depth<I: Id>(&self, lists: &[Vec<I>], depth: usize) -> f64 {
        let mut counts: HashMap<I, usize> = HashMap::new();
        for item in lists.iter().flat_map(|list| list.iter().take(depth)) {
            *counts.entry(item.clone()).or_insert(0) += 1;
        }
        let gini = Self::from_counts(&counts, self.num_items);
        if self.complement {
            1.0 - gini
        } else {
            gini
        }
    }
}

impl<U: Id, I: Id> RankingMetric<U, I> for GiniIndex {
    fn cutoffs(&self) -> &[usize] {
        &self.cutoffs
    }
}

impl<U: Id, I: Id> Metric<U, I> for GiniIndex {
    fn name(&self) -> String {
        "GiniIndex".to_string()
    }

    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U> {
        let lists = ranked_lists(predictions, test);
        let value = self.at_depth(&lists, usize::MAX);
        let at = self
            .cutoffs
            .iter()
            .map(|&k| (k, self.at_depth(&lists, k)))
            .collect();
        debug!("GiniIndex over {} lists: {}", lists.len(), value);
        MetricResult::system("GiniIndex", value, at)
    }
}
