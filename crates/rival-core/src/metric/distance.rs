//! Item-to-item distances used by EPD and EILD.
//!
//! Any `Fn(&I, &I) -> f64` closure is a distance, so callers can plug in
//! feature-based distances. The two built-in distances derive item profiles
//! from a training model.

use crate::data::{DataModel, Id};
use std::collections::HashMap;

/// Distance between two items, in `[0, 1]` for the built-in implementations.
pub trait ItemDistance<I> {
    fn distance(&self, a: &I, b: &I) -> f64;
}

impl<I, F> ItemDistance<I> for F
where
    F: Fn(&I, &I) -> f64,
{
    fn distance(&self, a: &I, b: &I) -> f64 {
        self(a, b)
    }
}

/// `1 - |users(a) ∩ users(b)| / |users(a) ∪ users(b)|` over training.
///
/// Items unknown to training are at distance 1 from everything but themselves.
#[derive(Debug, Clone, Copy)]
pub struct JaccardDistance<'a, U: Id, I: Id> {
    training: &'a DataModel<U, I>,
}

impl<'a, U: Id, I: Id> JaccardDistance<'a, U, I> {
    pub fn new(training: &'a DataModel<U, I>) -> Self {
        Self { training }
    }
}

impl<U: Id, I: Id> ItemDistance<I> for JaccardDistance<'_, U, I> {
    fn distance(&self, a: &I, b: &I) -> f64 {
        if a == b {
            return 0.0;
        }
        let (Some(users_a), Some(users_b)) = (
            self.training.item_preferences(a),
            self.training.item_preferences(b),
        ) else {
            return 1.0;
        };
        let shared = users_a.keys().filter(|u| users_b.contains_key(*u)).count();
        let union = users_a.len() + users_b.len() - shared;
        if union == 0 {
            1.0
        } else {
            1.0 - shared as f64 / union as f64
        }
    }
}

/// `1 - cos(a, b)` over the items' training preference vectors.
#[derive(Debug, Clone)]
pub struct CosineDistance<'a, U: Id, I: Id> {
    training: &'a DataModel<U, I>,
    norms: HashMap<I, f64>,
}

impl<'a, U: Id, I: Id> CosineDistance<'a, U, I> {
    pub fn new(training: &'a DataModel<U, I>) -> Self {
        let norms = training
            .item_user_preferences()
            .iter()
            .map(|(item, users)| {
                let norm = users.values().map(|p| p * p).sum::<f64>().sqrt();
                (item.clone(), norm)
            })
            .collect();
        Self { training, norms }
    }
}

impl<U: Id, I: Id> ItemDistance<I> for CosineDistance<'_, U, I> {
    fn distance(&self, a: &I, b: &I) -> f64 {
        if a == b {
            return 0.0;
        }
        let (Some(users_a), Some(users_b)) = (
            self.training.item_preferences(a),
            self.training.item_preferences(b),
        ) else {
            return 1.0;
        };
        let norm = self.norms.get(a).copied().unwrap_or(0.0) * self.norms.get(b).copied().unwrap_or(0.0);
        if norm == 0.0 {
            return 1.0;
        }
        // Iterate the smaller profile
        let (small, large) = if users_a.len() <= users_b.len() {
            (users_a, users_b)
        } else {
            (users_b, users_a)
        };
        let dot: f64 = small
            .iter()
            .filter_map(|(user, p)| large.get(user).map(|q| p * q))
            .sum();
        (1.0 - dot / norm).clamp(0.0, 2.0)
    }
}
