//! Evaluation strategies: which items are ranked for each user.
//!
//! A strategy holds the training and test models plus a relevance threshold
//! and answers one question per user: the candidate items to rank. The
//! candidate set is then used to filter predictions before metrics are
//! computed, and to write ranking/groundtruth files for external tools.
//!
//! | Strategy | Candidate items |
//! |----------|-----------------|
//! | [`AllItems`] | Training ∪ test items not rated by the user in training |
//! | [`TestItems`] | Test items not rated by the user in training |
//! | [`TrainItems`] | Training items not rated by the user in training |
//! | [`UserTest`] | Exactly the user's test items |
//! | [`RelPlusN`] | Relevant test items plus N sampled AllItems candidates |

pub mod basic;
pub mod output;
pub mod rel_plus_n;

use crate::data::{DataModel, Id};
use crate::error::StrategyError;
use crate::ranking::compare_scored;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

pub use basic::{AllItems, TestItems, TrainItems, UserTest};
pub use output::OutputFormat;
pub use rel_plus_n::RelPlusN;

/// Per-user candidate selection.
pub trait EvaluationStrategy<U: Id, I: Id> {
    /// Strategy name for reporting.
    fn name(&self) -> &'static str;

    /// Items eligible to be ranked for `user`.
    fn candidate_items(&self, user: &U) -> BTreeSet<I>;

    /// Test model the strategy evaluates against.
    fn test(&self) -> &DataModel<U, I>;

    /// Relevance threshold.
    fn threshold(&self) -> f64;

    /// Writes the user's ranking of `scored_items` (already restricted to
    /// candidates by the caller or not; every item given is written).
    fn write_ranking(
        &self,
        user: &U,
        scored_items: &[(I, f64)],
        out: &mut dyn Write,
        format: OutputFormat,
    ) -> io::Result<()> {
        output::write_ranking(&user.to_string(), scored_items, out, format)
    }

    /// Writes the user's test preferences as groundtruth.
    fn write_groundtruth(
        &self,
        user: &U,
        out: &mut dyn Write,
        format: OutputFormat,
    ) -> io::Result<()> {
        let items: Vec<(I, f64)> = self
            .test()
            .user_preferences(user)
            .map(|prefs| prefs.iter().map(|(i, &p)| (i.clone(), p)).collect())
            .unwrap_or_default();
        output::write_groundtruth(&user.to_string(), &items, self.threshold(), out, format)
    }
}

/// The user's predictions restricted to the candidate set, ranked.
pub fn ranked_candidates<U: Id, I: Id>(
    strategy: &dyn EvaluationStrategy<U, I>,
    user: &U,
    predictions: &DataModel<U, I>,
) -> Vec<(I, f64)> {
    let Some(scores) = predictions.user_preferences(user) else {
        return Vec::new();
    };
    let mut ranked: Vec<(I, f64)> = strategy
        .candidate_items(user)
        .into_iter()
        .filter_map(|item| {
            scores
                .get(&item)
                .copied()
                .filter(|s| !s.is_nan())
                .map(|s| (item, s))
        })
        .collect();
    ranked.sort_by(compare_scored);
    ranked
}

/// Predictions restricted to each test user's candidate set.
///
/// This is the model the metric engine consumes.
pub fn filter_predictions<U: Id, I: Id>(
    strategy: &dyn EvaluationStrategy<U, I>,
    predictions: &DataModel<U, I>,
) -> DataModel<U, I> {
    let mut filtered = DataModel::new();
    let mut users: Vec<&U> = strategy.test().users().collect();
    users.sort();
    for user in users {
        for (item, score) in ranked_candidates(strategy, user, predictions) {
            filtered.add_preference(user.clone(), item, score);
        }
    }
    filtered
}

/// Writes ranking and groundtruth files for every test user, in user order.
pub fn write_all<U: Id, I: Id>(
    strategy: &dyn EvaluationStrategy<U, I>,
    predictions: &DataModel<U, I>,
    ranking_out: &mut dyn Write,
    groundtruth_out: &mut dyn Write,
    format: OutputFormat,
) -> io::Result<()> {
    let mut users: Vec<&U> = strategy.test().users().collect();
    users.sort();
    for user in users {
        let ranked = ranked_candidates(strategy, user, predictions);
        strategy.write_ranking(user, &ranked, ranking_out, format)?;
        strategy.write_groundtruth(user, groundtruth_out, format)?;
    }
    Ok(())
}

/// Items the user rated in training; empty for users unknown to training.
pub(crate) fn training_items<U: Id, I: Id>(training: &DataModel<U, I>, user: &U) -> BTreeSet<I> {
    training.user_item_set(user)
}

/// Closed set of strategies selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    AllItems,
    TestItems,
    TrainItems,
    UserTest,
    RelPlusN,
}

impl StrategyKind {
    /// Returns all strategy kinds for iteration.
    pub fn all() -> &'static [StrategyKind] {
        &[
            StrategyKind::AllItems,
            StrategyKind::TestItems,
            StrategyKind::TrainItems,
            StrategyKind::UserTest,
            StrategyKind::RelPlusN,
        ]
    }

    /// Builds the strategy. `n` and `seed` only apply to RelPlusN.
    pub fn build<'a, U: Id + 'a, I: Id + 'a>(
        self,
        training: &'a DataModel<U, I>,
        test: &'a DataModel<U, I>,
        threshold: f64,
        n: usize,
        seed: u64,
    ) -> Box<dyn EvaluationStrategy<U, I> + 'a> {
        match self {
            StrategyKind::AllItems => Box::new(AllItems::new(training, test, threshold)),
            StrategyKind::TestItems => Box::new(TestItems::new(training, test, threshold)),
            StrategyKind::TrainItems => Box::new(TrainItems::new(training, test, threshold)),
            StrategyKind::UserTest => Box::new(UserTest::new(training, test, threshold)),
            StrategyKind::RelPlusN => Box::new(RelPlusN::new(training, test, threshold, n, seed)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::AllItems => "all_items",
            StrategyKind::TestItems => "test_items",
            StrategyKind::TrainItems => "train_items",
            StrategyKind::UserTest => "user_test",
            StrategyKind::RelPlusN => "rel_plus_n",
        };
        f.write_str(name)
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "allitems" => Ok(StrategyKind::AllItems),
            "testitems" => Ok(StrategyKind::TestItems),
            "trainitems" => Ok(StrategyKind::TrainItems),
            "usertest" => Ok(StrategyKind::UserTest),
            "relplusn" => Ok(StrategyKind::RelPlusN),
            _ => Err(StrategyError::UnknownStrategy(s.to_string())),
        }
    }
}
