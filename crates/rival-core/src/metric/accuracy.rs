//! Error metrics: MAE and RMSE.
//!
//! Both walk the test preferences, look up the predicted value of every
//! (user, item) pair and apply an [`ErrorStrategy`] to pairs without a
//! prediction. Per-user values use the user's own pairs; the global value is
//! pooled over every considered pair, so users with more test preferences
//! weigh more.

use super::{Metric, MetricResult};
use crate::data::{DataModel, Id};
use crate::error::MetricError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Treatment of test pairs without a predicted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    /// Drop pairs without a prediction
    #[default]
    NotConsiderNan,
    /// Predict 0 for missing pairs
    ConsiderNanAsZero,
    /// Predict 1 for missing pairs
    ConsiderNanAsOne,
    /// Predict 3 for missing pairs
    ConsiderNanAsThree,
    /// Keep missing pairs as NaN (the error becomes NaN)
    ConsiderEverything,
}

impl ErrorStrategy {
    /// Prediction to use for a pair, or `None` when the pair is dropped.
    pub fn resolve(self, predicted: Option<f64>) -> Option<f64> {
        match predicted {
            Some(p) if !p.is_nan() => Some(p),
            _ => match self {
                ErrorStrategy::NotConsiderNan => None,
                ErrorStrategy::ConsiderNanAsZero => Some(0.0),
                ErrorStrategy::ConsiderNanAsOne => Some(1.0),
                ErrorStrategy::ConsiderNanAsThree => Some(3.0),
                ErrorStrategy::ConsiderEverything => Some(f64::NAN),
            },
        }
    }
}

impl fmt::Display for ErrorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorStrategy::NotConsiderNan => "not_consider_nan",
            ErrorStrategy::ConsiderNanAsZero => "consider_nan_as_0",
            ErrorStrategy::ConsiderNanAsOne => "consider_nan_as_1",
            ErrorStrategy::ConsiderNanAsThree => "consider_nan_as_3",
            ErrorStrategy::ConsiderEverything => "consider_everything",
        };
        f.write_str(name)
    }
}

impl FromStr for ErrorStrategy {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "not_consider_nan" => Ok(ErrorStrategy::NotConsiderNan),
            "consider_nan_as_0" | "consider_nan_as_zero" => Ok(ErrorStrategy::ConsiderNanAsZero),
            "consider_nan_as_1" | "consider_nan_as_one" => Ok(ErrorStrategy::ConsiderNanAsOne),
            "consider_nan_as_3" | "consider_nan_as_three" => Ok(ErrorStrategy::ConsiderNanAsThree),
            "consider_everything" => Ok(ErrorStrategy::ConsiderEverything),
            _ => Err(MetricError::UnknownMetric(format!("error strategy '{}'", s))),
        }
    }
}

/// Signed errors (predicted - actual) per test user, in user order.
///
/// Users absent from predictions are treated as having no prediction for
/// any of their pairs, so the strategy decides whether they count.
fn collect_errors<U: Id, I: Id>(
    predictions: &DataModel<U, I>,
    test: &DataModel<U, I>,
    strategy: ErrorStrategy,
) -> BTreeMap<U, Vec<f64>> {
    let mut errors: BTreeMap<U, Vec<f64>> = BTreeMap::new();
    for (user, items) in test.user_item_preferences() {
        let user_errors = errors.entry(user.clone()).or_default();
        for (item, &actual) in items {
            let predicted = predictions.user_item_preference(user, item);
            if let Some(p) = strategy.resolve(predicted) {
                user_errors.push(p - actual);
            }
        }
    }
    errors
}

fn pooled<U>(errors: &BTreeMap<U, Vec<f64>>, f: impl Fn(f64) -> f64) -> (f64, usize) {
    errors
        .values()
        .flatten()
        .fold((0.0, 0), |(sum, n), &e| (sum + f(e), n + 1))
}

fn ratio(sum: f64, n: usize) -> f64 {
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Root mean squared error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rmse {
    strategy: ErrorStrategy,
}

impl Rmse {
    pub fn new(strategy: ErrorStrategy) -> Self {
        Self { strategy }
    }
}

impl<U: Id, I: Id> Metric<U, I> for Rmse {
    fn name(&self) -> String {
        "RMSE".to_string()
    }

    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U> {
        let errors = collect_errors(predictions, test, self.strategy);
        let per_user: BTreeMap<U, f64> = errors
            .iter()
            .map(|(user, errs)| {
                let sq: f64 = errs.iter().map(|e| e * e).sum();
                (user.clone(), ratio(sq, errs.len()).sqrt())
            })
            .collect();

        let (sum_sq, n) = pooled(&errors, |e| e * e);
        let value = ratio(sum_sq, n).sqrt();
        debug!("RMSE over {} pairs ({} users): {}", n, per_user.len(), value);

        MetricResult::from_users(<Self as Metric<U, I>>::name(self), per_user).with_value(value)
    }
}

/// Mean absolute error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mae {
    strategy: ErrorStrategy,
}

impl Mae {
    pub fn new(strategy: ErrorStrategy) -> Self {
        Self { strategy }
    }
}

impl<U: Id, I: Id> Metric<U, I> for Mae {
    fn name(&self) -> String {
        "MAE".to_string()
    }

    fn compute(&self, predictions: &DataModel<U, I>, test: &DataModel<U, I>) -> MetricResult<U> {
        let errors = collect_errors(predictions, test, self.strategy);
        let per_user: BTreeMap<U, f64> = errors
            .iter()
            .map(|(user, errs)| {
                let abs: f64 = errs.iter().map(|e| e.abs()).sum();
                (user.clone(), ratio(abs, errs.len()))
            })
            .collect();

        let (sum_abs, n) = pooled(&errors, f64::abs);
        let value = ratio(sum_abs, n);
        debug!("MAE over {} pairs ({} users): {}", n, per_user.len(), value);

        MetricResult::from_users(<Self as Metric<U, I>>::name(self), per_user).with_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> (DataModel<u32, u32>, DataModel<u32, u32>) {
        let mut test = DataModel::new();
        test.add_preference(1, 1, 4.0);
        test.add_preference(1, 2, 2.0);
        test.add_preference(2, 1, 3.0);
        test.add_preference(2, 2, 5.0);
        test.add_preference(2, 3, 1.0);
        let mut predictions = DataModel::new();
        predictions.add_preference(1, 1, 3.0); // err -1
        predictions.add_preference(1, 2, 4.0); // err +2
        predictions.add_preference(2, 1, 3.0); // err 0
        predictions.add_preference(2, 2, 4.0); // err -1
        (predictions, test)
    }

    #[test]
    fn test_rmse_pools_pairs() {
        let (predictions, test) = models();
        let result = Rmse::new(ErrorStrategy::NotConsiderNan).compute(&predictions, &test);

        // pooled: (1 + 4 + 0 + 1) / 4
        assert!((result.value() - (6.0f64 / 4.0).sqrt()).abs() < 1e-9);
        assert!((result.user_value(&1).unwrap() - (5.0f64 / 2.0).sqrt()).abs() < 1e-9);
        assert!((result.user_value(&2).unwrap() - (1.0f64 / 2.0).sqrt()).abs() < 1e-9);
        // differs from the mean of per-user values
        let unweighted = ((2.5f64).sqrt() + (0.5f64).sqrt()) / 2.0;
        assert!((result.value() - unweighted).abs() > 1e-3);
    }

    #[test]
    fn test_mae_with_missing_as_three() {
        let (predictions, test) = models();
        let result = Mae::new(ErrorStrategy::ConsiderNanAsThree).compute(&predictions, &test);

        // user 2 item 3: predicted 3, actual 1 -> 2
        assert!((result.value() - (1.0 + 2.0 + 0.0 + 1.0 + 2.0) / 5.0).abs() < 1e-9);
        assert!((result.user_value(&2).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_consider_everything_propagates_nan() {
        let (predictions, test) = models();
        let result = Rmse::new(ErrorStrategy::ConsiderEverything).compute(&predictions, &test);

        assert!(result.value().is_nan());
        assert!(result.user_value(&2).unwrap().is_nan());
        assert!(!result.user_value(&1).unwrap().is_nan());
    }

    #[test]
    fn test_user_without_predictions() {
        let (predictions, mut test) = models();
        test.add_preference(9, 1, 5.0);

        let dropped = Mae::new(ErrorStrategy::NotConsiderNan).compute(&predictions, &test);
        assert!(dropped.user_value(&9).unwrap().is_nan());

        let zero = Mae::new(ErrorStrategy::ConsiderNanAsZero).compute(&predictions, &test);
        assert!((zero.user_value(&9).unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_compute_twice_is_stable() {
        let (predictions, test) = models();
        let metric = Rmse::default();
        let first = metric.compute(&predictions, &test);
        let second = metric.compute(&predictions, &test);
        assert_eq!(first, second);
    }

    #[test]
    fn test_error_strategy_from_str() {
        assert_eq!(
            "CONSIDER_NAN_AS_3".parse::<ErrorStrategy>().unwrap(),
            ErrorStrategy::ConsiderNanAsThree
        );
        assert!("ignore".parse::<ErrorStrategy>().is_err());
    }
}
