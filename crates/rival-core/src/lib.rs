//! # Rival Core
//!
//! Library for evaluating recommender-system output offline.
//!
//! Given training, test and predicted preferences, this crate selects the
//! candidate items each user is ranked on, computes error, ranking, novelty
//! and diversity metrics, and compares methods statistically.
//!
//! ## Modules
//!
//! - [`data`] - In-memory preference model, file parsers and train/test splitters
//! - [`strategy`] - Candidate item selection and ranking/groundtruth output
//! - [`ranking`] - Deterministic ranking of scored items
//! - [`metric`] - Error, ranking, novelty and diversity metrics
//! - [`stats`] - Significance tests, effect sizes and confidence intervals
//! - [`config`] - Defaults and the TOML evaluation configuration
//! - [`error`] - Error types for every module
//!
//! ## Example
//!
//! ```
//! use rival_core::data::DataModel;
//! use rival_core::metric::{Metric, Precision};
//! use rival_core::strategy::{filter_predictions, UserTest};
//!
//! let training: DataModel<u32, u32> = DataModel::new();
//! let mut test = DataModel::new();
//! test.add_preference(1, 10, 5.0);
//! test.add_preference(1, 11, 0.0);
//! let mut predictions = DataModel::new();
//! predictions.add_preference(1, 10, 0.9);
//! predictions.add_preference(1, 11, 0.4);
//! predictions.add_preference(1, 12, 0.7);
//!
//! let strategy = UserTest::new(&training, &test, 1.0);
//! let filtered = filter_predictions(&strategy, &predictions);
//! let result = Precision::new(1.0, &[1, 2]).compute(&filtered, &test);
//! assert_eq!(result.value_at(1), 1.0);
//! assert_eq!(result.value_at(2), 0.5);
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod metric;
pub mod ranking;
pub mod stats;
pub mod strategy;
