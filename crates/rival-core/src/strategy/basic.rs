//! Deterministic candidate strategies.

use super::{training_items, EvaluationStrategy};
use crate::data::{DataModel, Id};
use std::collections::BTreeSet;

macro_rules! strategy_struct {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name<'a, U: Id, I: Id> {
            training: &'a DataModel<U, I>,
            test: &'a DataModel<U, I>,
            threshold: f64,
        }

        impl<'a, U: Id, I: Id> $name<'a, U, I> {
            pub fn new(
                training: &'a DataModel<U, I>,
                test: &'a DataModel<U, I>,
                threshold: f64,
            ) -> Self {
                Self {
                    training,
                    test,
                    threshold,
                }
            }
        }
    };
}

strategy_struct!(
    /// Every training or test item the user has not rated in training.
    AllItems
);
strategy_struct!(
    /// Test items the user has not rated in training.
    TestItems
);
strategy_struct!(
    /// Training items the user has not rated in training.
    TrainItems
);
strategy_struct!(
    /// Exactly the user's test items.
    UserTest
);

/// Items of `model` minus `exclude`.
fn items_except<U: Id, I: Id>(model: &DataModel<U, I>, exclude: &BTreeSet<I>) -> BTreeSet<I> {
    model
        .items()
        .filter(|item| !exclude.contains(*item))
        .cloned()
        .collect()
}

impl<U: Id, I: Id> EvaluationStrategy<U, I> for AllItems<'_, U, I> {
    fn name(&self) -> &'static str {
        "AllItems"
    }

    fn candidate_items(&self, user: &U) -> BTreeSet<I> {
        let rated = training_items(self.training, user);
        let mut items = items_except(self.training, &rated);
        items.extend(items_except(self.test, &rated));
        items
    }

    fn test(&self) -> &DataModel<U, I> {
        self.test
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl<U: Id, I: Id> EvaluationStrategy<U, I> for TestItems<'_, U, I> {
    fn name(&self) -> &'static str {
        "TestItems"
    }

    fn candidate_items(&self, user: &U) -> BTreeSet<I> {
        items_except(self.test, &training_items(self.training, user))
    }

    fn test(&self) -> &DataModel<U, I> {
        self.test
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl<U: Id, I: Id> EvaluationStrategy<U, I> for TrainItems<'_, U, I> {
    fn name(&self) -> &'static str {
        "TrainItems"
    }

    fn candidate_items(&self, user: &U) -> BTreeSet<I> {
        items_except(self.training, &training_items(self.training, user))
    }

    fn test(&self) -> &DataModel<U, I> {
        self.test
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl<U: Id, I: Id> EvaluationStrategy<U, I> for UserTest<'_, U, I> {
    fn name(&self) -> &'static str {
        "UserTest"
    }

    fn candidate_items(&self, user: &U) -> BTreeSet<I> {
        self.test.user_item_set(user)
    }

    fn test(&self) -> &DataModel<U, I> {
        self.test
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> (DataModel<u32, u32>, DataModel<u32, u32>) {
        let mut training = DataModel::new();
        training.add_preference(1, 1, 5.0);
        training.add_preference(1, 2, 4.0);
        training.add_preference(2, 3, 3.0);
        training.add_preference(2, 4, 3.0);
        let mut test = DataModel::new();
        test.add_preference(1, 3, 4.0);
        test.add_preference(1, 5, 2.0);
        test.add_preference(2, 2, 5.0);
        test.add_preference(3, 1, 1.0);
        (training, test)
    }

    fn as_vec(set: BTreeSet<u32>) -> Vec<u32> {
        set.into_iter().collect()
    }

    #[test]
    fn test_all_items() {
        let (training, test) = models();
        let strategy = AllItems::new(&training, &test, 1.0);
        assert_eq!(as_vec(strategy.candidate_items(&1)), vec![3, 4, 5]);
        assert_eq!(as_vec(strategy.candidate_items(&2)), vec![1, 2, 5]);
        // Unknown to training: every item is a candidate
        assert_eq!(as_vec(strategy.candidate_items(&3)), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_test_items() {
        let (training, test) = models();
        let strategy = TestItems::new(&training, &test, 1.0);
        assert_eq!(as_vec(strategy.candidate_items(&1)), vec![3, 5]);
        assert_eq!(as_vec(strategy.candidate_items(&2)), vec![1, 2, 5]);
    }

    #[test]
    fn test_train_items() {
        let (training, test) = models();
        let strategy = TrainItems::new(&training, &test, 1.0);
        assert_eq!(as_vec(strategy.candidate_items(&1)), vec![3, 4]);
        assert_eq!(as_vec(strategy.candidate_items(&3)), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_user_test() {
        let (training, test) = models();
        let strategy = UserTest::new(&training, &test, 1.0);
        assert_eq!(as_vec(strategy.candidate_items(&1)), vec![3, 5]);
        assert!(strategy.candidate_items(&99).is_empty());
    }
}
