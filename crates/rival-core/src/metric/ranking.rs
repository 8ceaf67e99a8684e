//! Standard ranking metrics for evaluating recommendation lists.
//!
//! This module implements metrics commonly used in IR and recommender research:
//! - Precision@k, Recall@k
//! - MAP (Mean Average Precision)
//! - NDCG (Normalized Discounted Cumulative Gain)
//! - Popularity-stratified Recall
//!
//! Every user's predictions are ranked (score descending, ties by item id) and
//! labeled with the user's test preference (0.0 when the item is not in test).
//! An item is relevant when its test preference reaches the threshold.
//!
//! # References
//!
//! - Järvelin & Kekäläinen (2002). "Cumulated gain-based evaluation of IR techniques"
//! - Steck (2011). "Item popularity and recommendation accuracy"

use super::{carry_forward, normalize_cutoffs, transpose_cutoffs, Metric, MetricResult, RankingMetric};
use crate::data::{DataModel, Id};
use crate::error::MetricError;
use crate::ranking::{ranked_test_relevance, RankedRelevance};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Runs `per_user` over every ranked list and assembles the result.
///
/// `per_user` returns the whole-list value and the values at each cutoff.
fn evaluate<U, I, F>(
    name: String,
    predictions: &DataModel<U, I>,
    test: &DataModel<U, I>,
    cutoffs: &[usize],
    per_user: F,
) -> MetricResult<U>
where
    U: Id,
    I: Id,
    F: Fn(&U, &RankedRelevance<I>) -> (f64, BTreeMap<usize, f64>),
{
    let lists = ranked_test_relevance(predictions, test);
    let mut whole = BTreeMap::new();
    let mut rows = Vec::with_capacity(lists.len());
    for (user, list) in &lists {
        let (value, at) = per_user(user, list);
        whole.insert(user.clone(), value);
        rows.push((user.clone(), at));
    }

    let result =
        MetricResult::from_users(name, whole).with_user_cutoffs(transpose_cutoffs(rows, cutoffs));
    debug!(
        "{} over {} users: {}",
        result.name(),
        lists.len(),
        result.value()
    );
    result
}

/// Number of test items of `user` whose preference reaches `threshold`.
fn relevant_count<U: Id, I: Id>(test: &DataModel<U, I>, user: &U, threshold: f64) -> usize {
    test.user_preferences(user)
        .map(|prefs| prefs.values().filter(|&&p| p >= threshold).count())
        .unwrap_or(0)
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

/// Cumulative relevant hits after each rank (index 0 = empty list).
fn cumulative_hits<I>(list: &RankedRelevance<I>, threshold: f64) -> Vec<usize> {
    let mut states = Vec::with_capacity(list.len() + 1);
    states.push(0);
    let mut hits = 0;
    for rel in list.relevances() {
        if rel >= threshold {
            hits += 1;
        }
        states.push(hits);
    }
    states
}

macro_rules! cutoff_metric {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            threshold: f64,
            cutoffs: Vec<usize>,
        }

        impl $name {
            /// # Arguments
            ///
            /// * `threshold` - Minimum test preference for an item to be relevant
            /// * `cutoffs` - Ranking depths to evaluate at
            pub fn new(threshold: f64, cutoffs: &[usize]) -> Self {
                Self {
                    threshold,
                    cutoffs: normalize_cutoffs(cutoffs),
                }
            }
        }

        impl<U: Id, I: Id> RankingMetric<U, I> for $name {
            fn cutoffs(&self) -> &[usize] {
                &self.cutoffs
            }
        }
    };
}

// ============================================================================
// Set-Based Metrics: Precision, Recall
// ============================================================================

cutoff_metric!(
    /// Precision: fraction of ranked items that are relevant.
    ///
    /// # Formula
    ///
    /// ```text
    /// P@k = |relevant ∩ top_k| / k
    /// P   = |relevant ∩ list| / |list|
    /// ```
    ///
    /// Lists shorter than k count the missing positions as non-relevant.
    Precision
);

impl<U: Id, I: Id> Metric<U, I> for Precision {
    fn name(&self) -> String {
        "Precision".to_string()
    }

    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U> {
        evaluate(
            "Precision".to_string(),
            predictions,
            test,
            &self.cutoffs,
            |_, list| {
                let states = cumulative_hits(list, self.threshold);
                let whole = safe_div(states[list.len()] as f64, list.len() as f64);
                let at = carry_forward(&states, &self.cutoffs, |&hits, k| hits as f64 / k as f64);
                (whole, at)
            },
        )
    }
}

cutoff_metric!(
    /// Recall: fraction of the user's relevant test items that are ranked.
    ///
    /// # Formula
    ///
    /// ```text
    /// R@k = |relevant ∩ top_k| / |relevant|
    /// ```
    ///
    /// Undefined (NaN) for users without relevant test items.
    Recall
);

impl<U: Id, I: Id> Metric<U, I> for Recall {
    fn name(&self) -> String {
        "Recall".to_string()
    }

    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U> {
        evaluate(
            "Recall".to_string(),
            predictions,
            test,
            &self.cutoffs,
            |user, list| {
                let total = relevant_count(test, user, self.threshold) as f64;
                let states = cumulative_hits(list, self.threshold);
                let whole = safe_div(states[list.len()] as f64, total);
                let at = carry_forward(&states, &self.cutoffs, |&hits, _| safe_div(hits as f64, total));
                (whole, at)
            },
        )
    }
}

// ============================================================================
// MAP (Mean Average Precision)
// ============================================================================

cutoff_metric!(
    /// Mean Average Precision.
    ///
    /// # Formula
    ///
    /// ```text
    /// AP@k = (1 / |relevant|) * Σ_{r ≤ k} P@r * rel(r)
    /// ```
    ///
    /// The normalizer is the user's total number of relevant test items at
    /// every cutoff, so AP@k grows with k.
    Map
);

impl<U: Id, I: Id> Metric<U, I> for Map {
    fn name(&self) -> String {
        "MAP".to_string()
    }

    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U> {
        evaluate(
            "MAP".to_string(),
            predictions,
            test,
            &self.cutoffs,
            |user, list| {
                let total = relevant_count(test, user, self.threshold) as f64;

                // State: sum of precision values at relevant positions
                let mut states = Vec::with_capacity(list.len() + 1);
                states.push(0.0);
                let (mut hits, mut precision_sum) = (0usize, 0.0);
                for (idx, rel) in list.relevances().enumerate() {
                    if rel >= self.threshold {
                        hits += 1;
                        precision_sum += hits as f64 / (idx + 1) as f64;
                    }
                    states.push(precision_sum);
                }

                let whole = safe_div(precision_sum, total);
                let at = carry_forward(&states, &self.cutoffs, |&sum, _| safe_div(sum, total));
                (whole, at)
            },
        )
    }
}

// ============================================================================
// NDCG (Normalized Discounted Cumulative Gain)
// ============================================================================

/// Gain/discount formulation for NDCG.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NdcgType {
    /// `(2^rel - 1) / log₂(rank + 1)`
    #[default]
    Exp,
    /// `rel / log₂(rank)`, undiscounted at rank 1
    Lin,
    /// `rel / log₂(rank + 1)`
    TrecEval,
}

impl NdcgType {
    /// DCG contribution of relevance `rel` at 1-based `rank`.
    ///
    /// Items below the threshold contribute nothing.
    pub fn gain(self, rel: f64, rank: usize, threshold: f64) -> f64 {
        if rel < threshold {
            return 0.0;
        }
        let rank = rank as f64;
        match self {
            NdcgType::Exp => (2f64.powf(rel) - 1.0) / (rank + 1.0).log2(),
            NdcgType::Lin => {
                if rank > 1.0 {
                    rel / rank.log2()
                } else {
                    rel
                }
            }
            NdcgType::TrecEval => rel / (rank + 1.0).log2(),
        }
    }
}

impl fmt::Display for NdcgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NdcgType::Exp => f.write_str("exp"),
            NdcgType::Lin => f.write_str("lin"),
            NdcgType::TrecEval => f.write_str("trec_eval"),
        }
    }
}

impl FromStr for NdcgType {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "exp" => Ok(NdcgType::Exp),
            "lin" => Ok(NdcgType::Lin),
            "treceval" => Ok(NdcgType::TrecEval),
            _ => Err(MetricError::UnknownMetric(format!("ndcg type '{}'", s))),
        }
    }
}

/// Normalized Discounted Cumulative Gain.
///
/// # Formula
///
/// ```text
/// DCG@k  = Σ_{r ≤ k} gain(rel_r, r)
/// IDCG@k = DCG@k of the user's test relevances sorted descending
/// NDCG@k = DCG@k / IDCG@k
/// ```
///
/// The whole-list value uses the ideal DCG over the full test profile.
/// Undefined (NaN) when the ideal DCG is zero.
#[derive(Debug, Clone)]
pub struct Ndcg {
    threshold: f64,
    cutoffs: Vec<usize>,
    ndcg_type: NdcgType,
}

impl Ndcg {
    pub fn new(threshold: f64, cutoffs: &[usize], ndcg_type: NdcgType) -> Self {
        Self {
            threshold,
            cutoffs: normalize_cutoffs(cutoffs),
            ndcg_type,
        }
    }

    /// Ideal DCG over the first `depth` positions of the best ordering.
    fn ideal_dcg(&self, ideal: &[f64], depth: usize) -> f64 {
        ideal
            .iter()
            .take(depth)
            .enumerate()
            .map(|(i, &rel)| self.ndcg_type.gain(rel, i + 1, self.threshold))
            .sum()
    }
}

impl<U: Id, I: Id> RankingMetric<U, I> for Ndcg {
    fn cutoffs(&self) -> &[usize] {
        &self.cutoffs
    }
}

impl<U: Id, I: Id> Metric<U, I> for Ndcg {
    fn name(&self) -> String {
        "NDCG".to_string()
    }

    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U> {
        evaluate(
            "NDCG".to_string(),
            predictions,
            test,
            &self.cutoffs,
            |user, list| {
                let mut ideal: Vec<f64> = test
                    .user_preferences(user)
                    .map(|prefs| prefs.values().copied().collect())
                    .unwrap_or_default();
                ideal.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

                let mut states = Vec::with_capacity(list.len() + 1);
                states.push(0.0);
                let mut dcg = 0.0;
                for (idx, rel) in list.relevances().enumerate() {
                    dcg += self.ndcg_type.gain(rel, idx + 1, self.threshold);
                    states.push(dcg);
                }

                let whole = safe_div(dcg, self.ideal_dcg(&ideal, ideal.len()));
                let at = carry_forward(&states, &self.cutoffs, |&dcg, k| {
                    safe_div(dcg, self.ideal_dcg(&ideal, k))
                });
                (whole, at)
            },
        )
    }
}

// ============================================================================
// Popularity-Stratified Recall
// ============================================================================

/// Recall where each relevant hit is weighted by inverse item popularity.
///
/// # Formula
///
/// ```text
/// s_i   = obs(i)^(-γ / (γ + 1))
/// PSR_u = Σ_{hits i} s_i / Σ_{relevant i} s_i
/// PSR   = Σ_u Σ_{hits i} s_i / Σ_u Σ_{relevant i} s_i
/// ```
///
/// `obs(i)` is the observed relevance count of the item (at least 1). The
/// global value pools the weighted hits of every user instead of averaging
/// per-user ratios.
#[derive(Debug, Clone)]
pub struct PopularityStratifiedRecall<I: Id> {
    threshold: f64,
    cutoffs: Vec<usize>,
    gamma: f64,
    observed: HashMap<I, usize>,
}

impl<I: Id> PopularityStratifiedRecall<I> {
    /// # Arguments
    ///
    /// * `gamma` - Popularity correction strength (0 = plain recall)
    /// * `observed` - Observed relevance count per item
    pub fn new(threshold: f64, cutoffs: &[usize], gamma: f64, observed: HashMap<I, usize>) -> Self {
        Self {
            threshold,
            cutoffs: normalize_cutoffs(cutoffs),
            gamma,
            observed,
        }
    }

    /// Counts, per item, the users of `model` whose preference reaches the threshold.
    pub fn from_model<U: Id>(threshold: f64, cutoffs: &[usize], gamma: f64, model: &DataModel<U, I>) -> Self {
        let observed = model
            .item_user_preferences()
            .iter()
            .map(|(item, users)| {
                let count = users.values().filter(|&&p| p >= threshold).count();
                (item.clone(), count)
            })
            .collect();
        Self::new(threshold, cutoffs, gamma, observed)
    }

    /// Inverse-popularity weight of an item.
    pub fn weight(&self, item: &I) -> f64 {
        let obs = self.observed.get(item).copied().unwrap_or(0).max(1) as f64;
        obs.powf(-self.gamma / (self.gamma + 1.0))
    }
}

impl<U: Id, I: Id> RankingMetric<U, I> for PopularityStratifiedRecall<I> {
    fn cutoffs(&self) -> &[usize] {
        &self.cutoffs
    }
}

impl<U: Id, I: Id> Metric<U, I> for PopularityStratifiedRecall<I> {
    fn name(&self) -> String {
        "PopularityStratifiedRecall".to_string()
    }

    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U> {
        let lists = ranked_test_relevance(predictions, test);

        let mut whole = BTreeMap::new();
        let mut rows = Vec::with_capacity(lists.len());
        let mut pooled_total = 0.0;
        let mut pooled_hits = 0.0;
        let mut pooled_hits_at: BTreeMap<usize, f64> =
            self.cutoffs.iter().map(|&k| (k, 0.0)).collect();

        for (user, list) in &lists {
            let total: f64 = test
                .user_preferences(user)
                .map(|prefs| {
                    prefs
                        .iter()
                        .filter(|(_, &p)| p >= self.threshold)
                        .map(|(item, _)| self.weight(item))
                        .sum()
                })
                .unwrap_or(0.0);

            let mut states = Vec::with_capacity(list.len() + 1);
            states.push(0.0);
            let mut hits = 0.0;
            for (item, rel) in &list.items {
                if *rel >= self.threshold {
                    hits += self.weight(item);
                }
                states.push(hits);
            }

            pooled_total += total;
            pooled_hits += hits;
            let hits_at = carry_forward(&states, &self.cutoffs, |&h, _| h);
            for (k, h) in &hits_at {
                *pooled_hits_at.entry(*k).or_insert(0.0) += h;
            }

            whole.insert(user.clone(), safe_div(hits, total));
            let at = hits_at
                .into_iter()
                .map(|(k, h)| (k, safe_div(h, total)))
                .collect();
            rows.push((user.clone(), at));
        }

        let mut result = MetricResult::from_users("PopularityStratifiedRecall", whole)
            .with_value(safe_div(pooled_hits, pooled_total))
            .with_user_cutoffs(transpose_cutoffs(rows, &self.cutoffs));
        for (k, h) in pooled_hits_at {
            result = result.with_value_at(k, safe_div(h, pooled_total));
        }
        debug!(
            "PopularityStratifiedRecall over {} users: {}",
            lists.len(),
            result.value()
        );
        result
    }
}

// ============================================================================
// Tests
// ============================================================================
