//! In-memory user/item preference data.
//!
//! [`DataModel`] is a sparse bipartite weighted graph of user-item
//! interactions, indexed in both directions, plus optional timestamps per
//! (user, item) pair. Training, test and prediction sets all use it.
//!
//! - [`parser`] - Readers for tab/CSV preference files and list files
//! - [`split`] - Random, cross-validation and temporal splitters

pub mod parser;
pub mod split;

use std::collections::{BTreeSet, HashMap};
use std::fmt::{Debug, Display};
use std::hash::Hash;

pub use parser::{ListParser, SimpleParser};
pub use split::{CrossValidationSplitter, RandomSplitter, Split, Splitter, TemporalSplitter};

/// Identifier usable as a user or item key.
///
/// `Ord` gives a deterministic tie-break when ranking, `Display` is used when
/// writing rankings and reports.
pub trait Id: Clone + Eq + Hash + Ord + Debug + Display {}

impl<T> Id for T where T: Clone + Eq + Hash + Ord + Debug + Display {}

/// Sparse user-item preference matrix with a symmetric item index.
///
/// # Invariants
///
/// - Every (user, item) key in the user index has a value-equal entry in the
///   item index.
/// - Adding a preference for a pair that already exists accumulates (sums)
///   the values rather than overwriting.
/// - Entries are never removed individually, only via [`DataModel::clear`].
#[derive(Debug, Clone)]
pub struct DataModel<U: Id, I: Id> {
    user_item_preferences: HashMap<U, HashMap<I, f64>>,
    item_user_preferences: HashMap<I, HashMap<U, f64>>,
    user_item_timestamps: HashMap<U, HashMap<I, BTreeSet<i64>>>,
}

impl<U: Id, I: Id> Default for DataModel<U, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Id, I: Id> DataModel<U, I> {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self {
            user_item_preferences: HashMap::new(),
            item_user_preferences: HashMap::new(),
            user_item_timestamps: HashMap::new(),
        }
    }

    /// Creates a model backed by existing maps.
    ///
    /// The item index is rebuilt from `user_item_preferences`, so the two
    /// directions are consistent regardless of what the caller supplied.
    pub fn with_maps(
        user_item_preferences: HashMap<U, HashMap<I, f64>>,
        user_item_timestamps: HashMap<U, HashMap<I, BTreeSet<i64>>>,
    ) -> Self {
        let mut item_user_preferences: HashMap<I, HashMap<U, f64>> = HashMap::new();
        for (user, items) in &user_item_preferences {
            for (item, &pref) in items {
                item_user_preferences
                    .entry(item.clone())
                    .or_default()
                    .insert(user.clone(), pref);
            }
        }
        Self {
            user_item_preferences,
            item_user_preferences,
            user_item_timestamps,
        }
    }

    /// Adds a preference, summing with any existing value for the pair.
    pub fn add_preference(&mut self, user: U, item: I, preference: f64) {
        let total = {
            let value = self
                .user_item_preferences
                .entry(user.clone())
                .or_default()
                .entry(item.clone())
                .or_insert(0.0);
            *value += preference;
            *value
        };
        self.item_user_preferences
            .entry(item)
            .or_default()
            .insert(user, total);
    }

    /// Records a timestamp for a pair. Duplicate timestamps collapse.
    pub fn add_timestamp(&mut self, user: U, item: I, timestamp: i64) {
        self.user_item_timestamps
            .entry(user)
            .or_default()
            .entry(item)
            .or_default()
            .insert(timestamp);
    }

    /// Returns the accumulated preference for a pair, if any.
    pub fn user_item_preference(&self, user: &U, item: &I) -> Option<f64> {
        self.user_item_preferences
            .get(user)
            .and_then(|items| items.get(item))
            .copied()
    }

    /// Returns the items rated by a user with their preferences.
    pub fn user_preferences(&self, user: &U) -> Option<&HashMap<I, f64>> {
        self.user_item_preferences.get(user)
    }

    /// Returns the users who rated an item with their preferences.
    pub fn item_preferences(&self, item: &I) -> Option<&HashMap<U, f64>> {
        self.item_user_preferences.get(item)
    }

    /// Returns the timestamps recorded for a pair, if any.
    pub fn user_item_timestamps(&self, user: &U, item: &I) -> Option<&BTreeSet<i64>> {
        self.user_item_timestamps
            .get(user)
            .and_then(|items| items.get(item))
    }

    /// Full user → (item → preference) index.
    pub fn user_item_preferences(&self) -> &HashMap<U, HashMap<I, f64>> {
        &self.user_item_preferences
    }

    /// Full item → (user → preference) index.
    pub fn item_user_preferences(&self) -> &HashMap<I, HashMap<U, f64>> {
        &self.item_user_preferences
    }

    /// Full user → (item → timestamps) index.
    pub fn timestamps(&self) -> &HashMap<U, HashMap<I, BTreeSet<i64>>> {
        &self.user_item_timestamps
    }

    /// Users with at least one preference.
    pub fn users(&self) -> impl Iterator<Item = &U> {
        self.user_item_preferences.keys()
    }

    /// Items with at least one preference.
    pub fn items(&self) -> impl Iterator<Item = &I> {
        self.item_user_preferences.keys()
    }

    /// Set of items the user has a preference for; empty for unknown users.
    pub fn user_item_set(&self, user: &U) -> BTreeSet<I> {
        self.user_item_preferences
            .get(user)
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Iterates over every (user, item, preference) triple.
    pub fn preferences(&self) -> impl Iterator<Item = (&U, &I, f64)> {
        self.user_item_preferences
            .iter()
            .flat_map(|(user, items)| items.iter().map(move |(item, &pref)| (user, item, pref)))
    }

    /// Returns true if the user has any preference.
    pub fn contains_user(&self, user: &U) -> bool {
        self.user_item_preferences.contains_key(user)
    }

    /// Returns true if the item has any preference.
    pub fn contains_item(&self, item: &I) -> bool {
        self.item_user_preferences.contains_key(item)
    }

    pub fn num_users(&self) -> usize {
        self.user_item_preferences.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_user_preferences.len()
    }

    /// Number of distinct (user, item) pairs.
    pub fn num_preferences(&self) -> usize {
        self.user_item_preferences.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.user_item_preferences.is_empty()
    }

    /// Removes all preferences and timestamps.
    pub fn clear(&mut self) {
        self.user_item_preferences.clear();
        self.item_user_preferences.clear();
        self.user_item_timestamps.clear();
    }
}
