//! RelPlusN: each relevant test item ranked against N sampled items.
//!
//! For every user, the candidate set is the user's relevant test items plus a
//! uniform sample (without replacement) of up to N items from the AllItems
//! pool that are not relevant. The sample comes from a Fisher-Yates shuffle
//! truncated to N.
//!
//! The random source is keyed by a BLAKE3 digest of the seed and the user id,
//! so a user's candidates do not depend on which users were asked for before
//! and stay the same across platforms and toolchains. Callers that want to
//! drive the sampling themselves can use [`RelPlusN::candidate_items_with_rng`].
//!
//! When written out, one pseudo-user `user_item` group is produced per
//! relevant item: the sampled items plus that single relevant item. This is
//! the layout trec_eval style tools expect for the "one relevant vs. N" protocol.

use super::{output, training_items, EvaluationStrategy, OutputFormat};
use crate::data::{DataModel, Id};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::io::{self, Write};

/// Relevant items plus N sampled non-relevant candidates.
#[derive(Debug, Clone)]
pub struct RelPlusN<'a, U: Id, I: Id> {
    training: &'a DataModel<U, I>,
    test: &'a DataModel<U, I>,
    threshold: f64,
    n: usize,
    seed: u64,
}

impl<'a, U: Id, I: Id> RelPlusN<'a, U, I> {
    /// # Arguments
    ///
    /// * `n` - Number of non-relevant items sampled per user
    /// * `seed` - Base seed; each user's generator is derived from it
    pub fn new(
        training: &'a DataModel<U, I>,
        test: &'a DataModel<U, I>,
        threshold: f64,
        n: usize,
        seed: u64,
    ) -> Self {
        Self {
            training,
            test,
            threshold,
            n,
            seed,
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Test items of the user whose preference reaches the threshold.
    pub fn relevant_items(&self, user: &U) -> BTreeSet<I> {
        self.test
            .user_preferences(user)
            .map(|prefs| {
                prefs
                    .iter()
                    .filter(|(_, &pref)| pref >= self.threshold)
                    .map(|(item, _)| item.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Candidate set using the caller's random source.
    pub fn candidate_items_with_rng<R: Rng + ?Sized>(&self, user: &U, rng: &mut R) -> BTreeSet<I> {
        let relevant = self.relevant_items(user);
        let mut items = self.sample_with_rng(user, &relevant, rng);
        items.extend(relevant);
        items
    }

    /// The N sampled non-relevant items for the user.
    pub fn sampled_items(&self, user: &U) -> BTreeSet<I> {
        let relevant = self.relevant_items(user);
        self.sample_with_rng(user, &relevant, &mut self.user_rng(user))
    }

    fn sample_with_rng<R: Rng + ?Sized>(
        &self,
        user: &U,
        relevant: &BTreeSet<I>,
        rng: &mut R,
    ) -> BTreeSet<I> {
        let rated = training_items(self.training, user);
        // BTreeSet keeps the pool order stable before shuffling.
        let pool: BTreeSet<I> = self
            .training
            .items()
            .chain(self.test.items())
            .filter(|item| !rated.contains(*item) && !relevant.contains(*item))
            .cloned()
            .collect();

        let mut pool: Vec<I> = pool.into_iter().collect();
        pool.shuffle(rng);
        pool.truncate(self.n);
        pool.into_iter().collect()
    }

    fn user_rng(&self, user: &U) -> ChaCha8Rng {
        ChaCha8Rng::from_seed(user_seed(self.seed, user))
    }
}

/// 32-byte generator seed: BLAKE3 over the little-endian seed followed by the
/// user id as displayed.
fn user_seed<U: Id>(seed: u64, user: &U) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(user.to_string().as_bytes());
    *hasher.finalize().as_bytes()
}

impl<U: Id, I: Id> EvaluationStrategy<U, I> for RelPlusN<'_, U, I> {
    fn name(&self) -> &'static str {
        "RelPlusN"
    }

    fn candidate_items(&self, user: &U) -> BTreeSet<I> {
        self.candidate_items_with_rng(user, &mut self.user_rng(user))
    }

    fn test(&self) -> &DataModel<U, I> {
        self.test
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    /// One `user_item` group per relevant item: the sampled items plus that
    /// relevant item, each with its predicted score.
    fn write_ranking(
        &self,
        user: &U,
        scored_items: &[(I, f64)],
        out: &mut dyn Write,
        format: OutputFormat,
    ) -> io::Result<()> {
        let sampled = self.sampled_items(user);
        let background: Vec<(I, f64)> = scored_items
            .iter()
            .filter(|(item, _)| sampled.contains(item))
            .cloned()
            .collect();

        for relevant in self.relevant_items(user) {
            let mut group = background.clone();
            if let Some((item, score)) = scored_items.iter().find(|(item, _)| *item == relevant) {
                group.push((item.clone(), *score));
            }
            let pseudo_user = format!("{}_{}", user, relevant);
            output::write_ranking(&pseudo_user, &group, out, format)?;
        }
        Ok(())
    }

    /// One `user_item` group per relevant item holding its true score.
    fn write_groundtruth(
        &self,
        user: &U,
        out: &mut dyn Write,
        format: OutputFormat,
    ) -> io::Result<()> {
        for relevant in self.relevant_items(user) {
            let Some(score) = self.test.user_item_preference(user, &relevant) else {
                continue;
            };
            let pseudo_user = format!("{}_{}", user, relevant);
            output::write_groundtruth(&pseudo_user, &[(relevant, score)], self.threshold, out, format)?;
        }
        Ok(())
    }
}
