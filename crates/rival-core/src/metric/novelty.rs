//! Novelty and intra-list diversity metrics.
//!
//! All four metrics share one template: rank each user's predictions, sum an
//! item novelty over the ranked prefix, and divide by a normalizer that grows
//! with the cutoff.
//!
//! ```text
//! value@k = Σ_{r ≤ min(k, len)} disc(r) * nov(i_r) / Σ_{r ≤ k} disc(r) * w(r)
//! ```
//!
//! | Metric | nov(i_r) | w(r) |
//! |--------|----------|------|
//! | EPC | `1 - |users(i)| / |users|` | 1 |
//! | EFD | `-log₂(freq(i) / |prefs|)` | 1 |
//! | EPD | `Σ_{j ∈ profile} dist(i, j)` | `|profile|` |
//! | EILD | `Σ_{s < r} dist(i, i_s)` | `r - 1` |
//!
//! Popularity and profiles come from the training model. With
//! [`RankDiscount::None`] the normalizer is the cutoff (times the profile size
//! for EPD, `k(k-1)/2` for EILD). Lists shorter than k keep their sum and are
//! still normalized at k.
//!
//! # References
//!
//! - Vargas & Castells (2011). "Rank and relevance in novelty and diversity metrics"

use super::distance::ItemDistance;
use super::{carry_forward, normalize_cutoffs, transpose_cutoffs, Metric, MetricResult, RankingMetric};
use crate::data::{DataModel, Id};
use crate::ranking::ranked_test_relevance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Per-item novelty plugged into [`NoveltyMetric`].
pub trait ItemNovelty<U: Id, I: Id> {
    fn name(&self) -> String;

    /// Novelty of `ranked[rank]` (0-based) in the user's list.
    fn item_novelty(&self, user: &U, ranked: &[I], rank: usize) -> f64;

    /// Normalizer contribution of the 0-based position `rank`.
    fn norm_weight(&self, _user: &U, _rank: usize) -> f64 {
        1.0
    }
}

/// Positional discount applied to both novelty and normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankDiscount {
    #[default]
    None,
    /// `1 / log₂(r + 1)` for 1-based rank r
    Log,
}

impl RankDiscount {
    /// Discount of the 0-based position `rank`.
    pub fn at(self, rank: usize) -> f64 {
        match self {
            RankDiscount::None => 1.0,
            RankDiscount::Log => 1.0 / ((rank + 2) as f64).log2(),
        }
    }
}

/// Cutoff-aware novelty metric over an [`ItemNovelty`] model.
#[derive(Debug, Clone)]
pub struct NoveltyMetric<M> {
    model: M,
    cutoffs: Vec<usize>,
    discount: RankDiscount,
}

impl<M> NoveltyMetric<M> {
    pub fn new(model: M, cutoffs: &[usize]) -> Self {
        Self {
            model,
            cutoffs: normalize_cutoffs(cutoffs),
            discount: RankDiscount::None,
        }
    }

    pub fn with_discount(mut self, discount: RankDiscount) -> Self {
        self.discount = discount;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<U: Id, I: Id, M: ItemNovelty<U, I>> RankingMetric<U, I> for NoveltyMetric<M> {
    fn cutoffs(&self) -> &[usize] {
        &self.cutoffs
    }
}

impl<U: Id, I: Id, M: ItemNovelty<U, I>> Metric<U, I> for NoveltyMetric<M> {
    fn name(&self) -> String {
        self.model.name()
    }

    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U> {
        let lists = ranked_test_relevance(predictions, test);
        let max_cutoff = self.cutoffs.last().copied().unwrap_or(0);

        let mut whole = BTreeMap::new();
        let mut rows = Vec::with_capacity(lists.len());
        for (user, list) in &lists {
            let ranked: Vec<I> = list.items.iter().map(|(item, _)| item.clone()).collect();

            let mut sums = Vec::with_capacity(ranked.len() + 1);
            sums.push(0.0);
            let mut sum = 0.0;
            for rank in 0..ranked.len() {
                sum += self.discount.at(rank) * self.model.item_novelty(user, &ranked, rank);
                sums.push(sum);
            }

            // norms[k] = normalizer at depth k, covering every cutoff
            let depth = ranked.len().max(max_cutoff);
            let mut norms = Vec::with_capacity(depth + 1);
            norms.push(0.0);
            let mut norm = 0.0;
            for rank in 0..depth {
                norm += self.discount.at(rank) * self.model.norm_weight(user, rank);
                norms.push(norm);
            }

            whole.insert(user.clone(), ratio(sum, norms[ranked.len()]));
            let at = carry_forward(&sums, &self.cutoffs, |&s, k| ratio(s, norms[k]));
            rows.push((user.clone(), at));
        }

        let result = MetricResult::from_users(self.model.name(), whole)
            .with_user_cutoffs(transpose_cutoffs(rows, &self.cutoffs));
        debug!(
            "{} over {} users: {}",
            result.name(),
            lists.len(),
            result.value()
        );
        result
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

// ============================================================================
// Popularity-based novelty
// ============================================================================

/// Expected Popularity Complement.
#[derive(Debug, Clone, Copy)]
pub struct Epc<'a, U: Id, I: Id> {
    training: &'a DataModel<U, I>,
}

impl<'a, U: Id, I: Id> Epc<'a, U, I> {
    pub fn new(training: &'a DataModel<U, I>) -> Self {
        Self { training }
    }
}

impl<U: Id, I: Id> ItemNovelty<U, I> for Epc<'_, U, I> {
    fn name(&self) -> String {
        "EPC".to_string()
    }

    fn item_novelty(&self, _user: &U, ranked: &[I], rank: usize) -> f64 {
        let num_users = self.training.num_users();
        if num_users == 0 {
            return 1.0;
        }
        let users = self
            .training
            .item_preferences(&ranked[rank])
            .map(|u| u.len())
            .unwrap_or(0);
        1.0 - users as f64 / num_users as f64
    }
}

/// Expected Free Discovery.
///
/// Items never seen in training get the novelty of the least popular
/// training item.
#[derive(Debug, Clone, Copy)]
pub struct Efd<'a, U: Id, I: Id> {
    training: &'a DataModel<U, I>,
    total: usize,
    min_frequency: usize,
}

impl<'a, U: Id, I: Id> Efd<'a, U, I> {
    pub fn new(training: &'a DataModel<U, I>) -> Self {
        let min_frequency = training
            .item_user_preferences()
            .values()
            .map(|users| users.len())
            .min()
            .unwrap_or(1)
            .max(1);
        Self {
            training,
            total: training.num_preferences(),
            min_frequency,
        }
    }
}

impl<U: Id, I: Id> ItemNovelty<U, I> for Efd<'_, U, I> {
    fn name(&self) -> String {
        "EFD".to_string()
    }

    fn item_novelty(&self, _user: &U, ranked: &[I], rank: usize) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let frequency = self
            .training
            .item_preferences(&ranked[rank])
            .map(|u| u.len())
            .filter(|&f| f > 0)
            .unwrap_or(self.min_frequency);
        -(frequency as f64 / self.total as f64).log2()
    }
}

// ============================================================================
// Distance-based novelty
// ============================================================================

/// Expected Profile Distance: distance of each recommended item to the
/// user's training profile.
#[derive(Debug, Clone)]
pub struct Epd<'a, U: Id, I: Id, D> {
    training: &'a DataModel<U, I>,
    distance: D,
}

impl<'a, U: Id, I: Id, D: ItemDistance<I>> Epd<'a, U, I, D> {
    pub fn new(training: &'a DataModel<U, I>, distance: D) -> Self {
        Self { training, distance }
    }
}

impl<U: Id, I: Id, D: ItemDistance<I>> ItemNovelty<U, I> for Epd<'_, U, I, D> {
    fn name(&self) -> String {
        "EPD".to_string()
    }

    fn item_novelty(&self, user: &U, ranked: &[I], rank: usize) -> f64 {
        let item = &ranked[rank];
        self.training
            .user_preferences(user)
            .map(|profile| {
                profile
                    .keys()
                    .map(|other| self.distance.distance(item, other))
                    .sum()
            })
            .unwrap_or(0.0)
    }

    fn norm_weight(&self, user: &U, _rank: usize) -> f64 {
        self.training
            .user_preferences(user)
            .map(|profile| profile.len() as f64)
            .unwrap_or(0.0)
    }
}

/// Expected Intra-List Distance: distance of each recommended item to the
/// items ranked above it.
#[derive(Debug, Clone)]
pub struct Eild<D> {
    distance: D,
}

impl<D> Eild<D> {
    pub fn new(distance: D) -> Self {
        Self { distance }
    }
}

impl<U: Id, I: Id, D: ItemDistance<I>> ItemNovelty<U, I> for Eild<D> {
    fn name(&self) -> String {
        "EILD".to_string()
    }

    fn item_novelty(&self, _user: &U, ranked: &[I], rank: usize) -> f64 {
        let item = &ranked[rank];
        ranked[..rank]
            .iter()
            .map(|above| self.distance.distance(item, above))
            .sum()
    }

    fn norm_weight(&self, _user: &U, rank: usize) -> f64 {
        rank as f64
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::JaccardDistance;

    /// Four training users; item 1 seen by all, item 2 by two, item 3 by one.
    fn training() -> DataModel<u32, u32> {
        let mut model = DataModel::new();
        for user in 1..=4 {
            model.add_preference(user, 1, 1.0);
        }
        model.add_preference(1, 2, 1.0);
        model.add_preference(2, 2, 1.0);
        model.add_preference(3, 3, 1.0);
        model
    }

    fn predictions() -> (DataModel<u32, u32>, DataModel<u32, u32>) {
        let mut predictions = DataModel::new();
        predictions.add_preference(1, 1, 0.9);
        predictions.add_preference(1, 2, 0.8);
        predictions.add_preference(1, 4, 0.7);
        let mut test = DataModel::new();
        test.add_preference(1, 4, 1.0);
        (predictions, test)
    }

    #[test]
    fn test_epc() {
        let training = training();
        let (predictions, test) = predictions();
        let metric = NoveltyMetric::new(Epc::new(&training), &[1, 2, 5]);
        let result = metric.compute(&predictions, &test);

        // novelties: 0, 0.5, 1
        assert!((result.value() - 1.5 / 3.0).abs() < 1e-9);
        assert!(result.value_at(1).abs() < 1e-9);
        assert!((result.value_at(2) - 0.25).abs() < 1e-9);
        // carry forward: sum 1.5 normalized by 5
        assert!((result.value_at(5) - 0.3).abs() < 1e-9);
        assert_eq!(result.name(), "EPC");
    }

    #[test]
    fn test_efd_unseen_item_uses_least_popular() {
        let training = training();
        let (predictions, test) = predictions();
        let result = NoveltyMetric::new(Efd::new(&training), &[3]).compute(&predictions, &test);

        let total = 7.0f64;
        let expected = (-(4.0 / total).log2() - (2.0 / total).log2() - (1.0 / total).log2()) / 3.0;
        assert!((result.value() - expected).abs() < 1e-9);
        assert!((result.value_at(3) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_epd_normalizes_by_profile_size() {
        let training = training();
        let (predictions, test) = predictions();
        let distance = |a: &u32, b: &u32| if a == b { 0.0 } else { 1.0 };
        let result = NoveltyMetric::new(Epd::new(&training, distance), &[1])
            .compute(&predictions, &test);

        // profile of user 1 = {1, 2}: distances 1, 1, 2
        assert!((result.value() - 4.0 / 6.0).abs() < 1e-9);
        assert!((result.value_at(1) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_eild_pairwise_normalizer() {
        let (predictions, test) = predictions();
        let distance = |a: &u32, b: &u32| if a == b { 0.0 } else { 1.0 };
        let result = NoveltyMetric::new(Eild::new(distance), &[1, 2, 3])
            .compute(&predictions, &test);

        // All pairs distinct: sum 3 over 3 pairs
        assert!((result.value() - 1.0).abs() < 1e-9);
        assert!(result.value_at(1).is_nan());
        assert!((result.value_at(2) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_eild_with_jaccard() {
        let training = training();
        let (predictions, test) = predictions();
        let result = NoveltyMetric::new(Eild::new(JaccardDistance::new(&training)), &[2])
            .compute(&predictions, &test);

        // users(1) = {1,2,3,4}, users(2) = {1,2}: distance 0.5
        assert!((result.value_at(2) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_log_discount_matches_weights() {
        let training = training();
        let (predictions, test) = predictions();
        let result = NoveltyMetric::new(Epc::new(&training), &[2])
            .with_discount(RankDiscount::Log)
            .compute(&predictions, &test);

        let d2 = 1.0 / 3f64.log2();
        assert!((result.value_at(2) - 0.5 * d2 / (1.0 + d2)).abs() < 1e-9);
    }

    #[test]
    fn test_users_without_predictions_absent() {
        let training = training();
        let (predictions, mut test) = predictions();
        test.add_preference(7, 1, 1.0);
        let result = NoveltyMetric::new(Epc::new(&training), &[1]).compute(&predictions, &test);
        assert_eq!(result.value_per_user().unwrap().len(), 1);
    }
}
