//! Train/test splitters.
//!
//! Splitters partition the preferences of one [`DataModel`] into training and
//! test models. Timestamps travel with their preference. Entries are sorted
//! by (user, item) before any shuffling so a fixed seed reproduces the same
//! split regardless of hash map iteration order.

use super::{DataModel, Id};
use crate::error::SplitError;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// One training/test partition.
#[derive(Debug, Clone)]
pub struct Split<U: Id, I: Id> {
    pub training: DataModel<U, I>,
    pub test: DataModel<U, I>,
}

impl<U: Id, I: Id> Split<U, I> {
    fn empty() -> Self {
        Self {
            training: DataModel::new(),
            test: DataModel::new(),
        }
    }
}

/// Common interface for splitters.
pub trait Splitter {
    /// Splits `data` into one or more training/test partitions.
    fn split<U: Id, I: Id>(&self, data: &DataModel<U, I>) -> Vec<Split<U, I>>;
}

/// Random holdout split.
#[derive(Debug, Clone)]
pub struct RandomSplitter {
    training_ratio: f64,
    per_user: bool,
    seed: u64,
}

impl RandomSplitter {
    /// # Arguments
    ///
    /// * `training_ratio` - Fraction of preferences kept for training, in [0, 1]
    /// * `per_user` - Apply the ratio to each user's profile instead of globally
    /// * `seed` - Random seed for reproducibility
    pub fn new(training_ratio: f64, per_user: bool, seed: u64) -> Result<Self, SplitError> {
        validate_ratio(training_ratio)?;
        Ok(Self {
            training_ratio,
            per_user,
            seed,
        })
    }
}

impl Splitter for RandomSplitter {
    fn split<U: Id, I: Id>(&self, data: &DataModel<U, I>) -> Vec<Split<U, I>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut split = Split::empty();

        for mut group in entry_groups(data, self.per_user) {
            group.shuffle(&mut rng);
            let cut = training_size(group.len(), self.training_ratio);
            for (idx, (user, item)) in group.into_iter().enumerate() {
                let target = if idx < cut {
                    &mut split.training
                } else {
                    &mut split.test
                };
                copy_entry(data, target, user, item);
            }
        }

        debug!(
            "Random split: {} training / {} test preferences",
            split.training.num_preferences(),
            split.test.num_preferences()
        );
        vec![split]
    }
}

/// K-fold cross-validation split.
#[derive(Debug, Clone)]
pub struct CrossValidationSplitter {
    folds: usize,
    per_user: bool,
    seed: u64,
}

impl CrossValidationSplitter {
    pub fn new(folds: usize, per_user: bool, seed: u64) -> Result<Self, SplitError> {
        if folds < 2 {
            return Err(SplitError::InvalidFolds(folds));
        }
        Ok(Self {
            folds,
            per_user,
            seed,
        })
    }
}

impl Splitter for CrossValidationSplitter {
    fn split<U: Id, I: Id>(&self, data: &DataModel<U, I>) -> Vec<Split<U, I>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut splits: Vec<Split<U, I>> = (0..self.folds).map(|_| Split::empty()).collect();

        for mut group in entry_groups(data, self.per_user) {
            group.shuffle(&mut rng);
            for (idx, (user, item)) in group.into_iter().enumerate() {
                let fold = idx % self.folds;
                for (k, split) in splits.iter_mut().enumerate() {
                    let target = if k == fold {
                        &mut split.test
                    } else {
                        &mut split.training
                    };
                    copy_entry(data, target, user.clone(), item.clone());
                }
            }
        }

        debug!("Cross-validation split into {} folds", self.folds);
        splits
    }
}

/// Temporal split: earliest interactions go to training.
#[derive(Debug, Clone)]
pub struct TemporalSplitter {
    training_ratio: f64,
    per_user: bool,
}

impl TemporalSplitter {
    pub fn new(training_ratio: f64, per_user: bool) -> Result<Self, SplitError> {
        validate_ratio(training_ratio)?;
        Ok(Self {
            training_ratio,
            per_user,
        })
    }
}

impl Splitter for TemporalSplitter {
    fn split<U: Id, I: Id>(&self, data: &DataModel<U, I>) -> Vec<Split<U, I>> {
        let mut split = Split::empty();

        for mut group in entry_groups(data, self.per_user) {
            // Pairs without a timestamp sort first; ties keep (user, item) order.
            group.sort_by_key(|(user, item)| {
                data.user_item_timestamps(user, item)
                    .and_then(|stamps| stamps.iter().next().copied())
                    .unwrap_or(i64::MIN)
            });
            let cut = training_size(group.len(), self.training_ratio);
            for (idx, (user, item)) in group.into_iter().enumerate() {
                let target = if idx < cut {
                    &mut split.training
                } else {
                    &mut split.test
                };
                copy_entry(data, target, user, item);
            }
        }

        vec![split]
    }
}

fn validate_ratio(ratio: f64) -> Result<(), SplitError> {
    if (0.0..=1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(SplitError::InvalidRatio(ratio))
    }
}

fn training_size(len: usize, ratio: f64) -> usize {
    ((len as f64) * ratio).floor() as usize
}

/// Sorted (user, item) pairs, either as one group or one group per user.
fn entry_groups<U: Id, I: Id>(data: &DataModel<U, I>, per_user: bool) -> Vec<Vec<(U, I)>> {
    let mut by_user: BTreeMap<&U, Vec<I>> = BTreeMap::new();
    for (user, items) in data.user_item_preferences() {
        let mut sorted: Vec<I> = items.keys().cloned().collect();
        sorted.sort();
        by_user.insert(user, sorted);
    }

    let pairs_of = |user: &U, items: Vec<I>| -> Vec<(U, I)> {
        items.into_iter().map(|item| (user.clone(), item)).collect()
    };

    if per_user {
        by_user
            .into_iter()
            .map(|(user, items)| pairs_of(user, items))
            .collect()
    } else {
        vec![by_user
            .into_iter()
            .flat_map(|(user, items)| pairs_of(user, items))
            .collect()]
    }
}

fn copy_entry<U: Id, I: Id>(source: &DataModel<U, I>, target: &mut DataModel<U, I>, user: U, item: I) {
    if let Some(stamps) = source.user_item_timestamps(&user, &item) {
        for &ts in stamps {
            target.add_timestamp(user.clone(), item.clone(), ts);
        }
    }
    if let Some(pref) = source.user_item_preference(&user, &item) {
        target.add_preference(user, item, pref);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(users: u32, items: u32) -> DataModel<u32, u32> {
        let mut model = DataModel::new();
        for u in 1..=users {
            for i in 1..=items {
                model.add_preference(u, i, (u * i % 5) as f64 + 1.0);
                model.add_timestamp(u, i, (u * 100 + i) as i64);
            }
        }
        model
    }

    #[test]
    fn test_random_split_partitions_everything() {
        let data = grid(5, 10);
        let splitter = RandomSplitter::new(0.8, false, 42).unwrap();
        let splits = splitter.split(&data);

        assert_eq!(splits.len(), 1);
        let split = &splits[0];
        assert_eq!(split.training.num_preferences(), 40);
        assert_eq!(split.test.num_preferences(), 10);
        for (user, item, _) in split.test.preferences() {
            assert!(split.training.user_item_preference(user, item).is_none());
        }
    }

    #[test]
    fn test_random_split_per_user_ratio() {
        let data = grid(4, 10);
        let splitter = RandomSplitter::new(0.7, true, 7).unwrap();
        let split = splitter.split(&data).remove(0);

        for u in 1..=4 {
            assert_eq!(split.training.user_preferences(&u).map(|p| p.len()), Some(7));
            assert_eq!(split.test.user_preferences(&u).map(|p| p.len()), Some(3));
        }
    }

    #[test]
    fn test_random_split_is_reproducible() {
        let data = grid(6, 6);
        let a = RandomSplitter::new(0.5, false, 3).unwrap().split(&data).remove(0);
        let b = RandomSplitter::new(0.5, false, 3).unwrap().split(&data).remove(0);

        let mut left: Vec<(u32, u32)> = a.test.preferences().map(|(u, i, _)| (*u, *i)).collect();
        let mut right: Vec<(u32, u32)> = b.test.preferences().map(|(u, i, _)| (*u, *i)).collect();
        left.sort();
        right.sort();
        assert_eq!(left, right);
    }

    #[test]
    fn test_cross_validation_folds_cover_data_once() {
        let data = grid(3, 10);
        let splits = CrossValidationSplitter::new(5, true, 1).unwrap().split(&data);

        assert_eq!(splits.len(), 5);
        let total_test: usize = splits.iter().map(|s| s.test.num_preferences()).sum();
        assert_eq!(total_test, 30);
        for split in &splits {
            assert_eq!(
                split.training.num_preferences() + split.test.num_preferences(),
                30
            );
        }
    }

    #[test]
    fn test_temporal_split_keeps_earliest_for_training() {
        let data = grid(2, 10);
        let split = TemporalSplitter::new(0.5, true).unwrap().split(&data).remove(0);

        // Timestamps increase with item id, so items 1..=5 are training.
        for u in 1..=2u32 {
            for i in 1..=5u32 {
                assert!(split.training.user_item_preference(&u, &i).is_some());
                assert!(split.training.user_item_timestamps(&u, &i).is_some());
            }
            for i in 6..=10u32 {
                assert!(split.test.user_item_preference(&u, &i).is_some());
            }
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(RandomSplitter::new(1.5, false, 0).is_err());
        assert!(TemporalSplitter::new(-0.1, false).is_err());
        assert!(CrossValidationSplitter::new(1, false, 0).is_err());
    }
}
