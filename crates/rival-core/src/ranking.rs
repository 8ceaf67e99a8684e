//! Deterministic ranking of scored items.
//!
//! Items are ordered by score descending; equal scores are ordered by item id
//! ascending. NaN scores are dropped since they carry no ranking information.

use crate::data::{DataModel, Id};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Ranks scored items by descending score, ties by ascending item id.
pub fn rank_items<I: Id>(scores: &HashMap<I, f64>) -> Vec<(I, f64)> {
    let mut ranked: Vec<(I, f64)> = scores
        .iter()
        .filter(|(_, score)| !score.is_nan())
        .map(|(item, &score)| (item.clone(), score))
        .collect();
    ranked.sort_by(compare_scored);
    ranked
}

/// Ordering used by [`rank_items`].
pub fn compare_scored<I: Ord>(a: &(I, f64), b: &(I, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

/// A ranked list with the test relevance of each position.
#[derive(Debug, Clone)]
pub struct RankedRelevance<I> {
    /// Ranked items with their test relevance (0.0 when absent from test)
    pub items: Vec<(I, f64)>,
}

impl<I> RankedRelevance<I> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Relevance values in rank order.
    pub fn relevances(&self) -> impl Iterator<Item = f64> + '_ {
        self.items.iter().map(|(_, rel)| *rel)
    }
}

/// Ranks every test user's predictions and labels them with test relevance.
///
/// Users present in `test` but without predictions are omitted, so they do
/// not contribute to any aggregate. Predicted items missing from the test
/// profile are kept with relevance 0.0.
pub fn ranked_test_relevance<U: Id, I: Id>(
    predictions: &DataModel<U, I>,
    test: &DataModel<U, I>,
) -> BTreeMap<U, RankedRelevance<I>> {
    let mut lists = BTreeMap::new();
    for user in test.users() {
        let Some(scores) = predictions.user_preferences(user) else {
            continue;
        };
        let test_profile = test.user_preferences(user);
        let items = rank_items(scores)
            .into_iter()
            .map(|(item, _)| {
                let rel = test_profile
                    .and_then(|profile| profile.get(&item))
                    .copied()
                    .unwrap_or(0.0);
                (item, rel)
            })
            .collect();
        lists.insert(user.clone(), RankedRelevance { items });
    }
    lists
}

/// Ranks every predicted user's list (no test labels needed).
pub fn ranked_predictions<U: Id, I: Id>(predictions: &DataModel<U, I>) -> BTreeMap<U, Vec<I>> {
    predictions
        .user_item_preferences()
        .iter()
        .map(|(user, scores)| {
            let items = rank_items(scores).into_iter().map(|(item, _)| item).collect();
            (user.clone(), items)
        })
        .collect()
}
