//! Metric selection by name.
//!
//! [`MetricKind`] is the closed set of metrics a configuration can name.
//! [`MetricKind::build`] turns a kind plus shared [`MetricSettings`] into a
//! boxed [`Metric`]. Metrics that need popularity or item profiles
//! (PopularityStratifiedRecall, EPC, EFD, EPD, EILD with a training-based
//! distance, GiniIndex without a catalog size) borrow the training model.

use super::accuracy::{ErrorStrategy, Mae, Rmse};
use super::distance::{CosineDistance, JaccardDistance};
use super::diversity::{AggrDiv, GiniIndex};
use super::novelty::{Efd, Eild, Epc, Epd, NoveltyMetric, RankDiscount};
use super::ranking::{Map, Ndcg, NdcgType, PopularityStratifiedRecall, Precision, Recall};
use super::Metric;
use crate::config::{DEFAULT_CUTOFFS, DEFAULT_GAMMA, DEFAULT_THRESHOLD};
use crate::data::{DataModel, Id};
use crate::error::MetricError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metrics selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Mae,
    Rmse,
    Precision,
    Recall,
    Map,
    Ndcg,
    PopularityStratifiedRecall,
    Epc,
    Efd,
    Epd,
    Eild,
    AggrDiv,
    GiniIndex,
}

/// Item distance used by EPD and EILD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceKind {
    #[default]
    Jaccard,
    Cosine,
}

impl FromStr for DistanceKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jaccard" => Ok(DistanceKind::Jaccard),
            "cosine" => Ok(DistanceKind::Cosine),
            _ => Err(MetricError::UnknownMetric(format!("distance '{}'", s))),
        }
    }
}

/// Parameters shared by every metric built from a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSettings {
    pub threshold: f64,
    pub cutoffs: Vec<usize>,
    pub error_strategy: ErrorStrategy,
    pub ndcg_type: NdcgType,
    /// PopularityStratifiedRecall popularity correction
    pub gamma: f64,
    pub distance: DistanceKind,
    pub discount: RankDiscount,
    /// Catalog size for GiniIndex; the training item count when `None`
    pub num_items: Option<usize>,
    /// Report `1 - G` for GiniIndex
    pub gini_complement: bool,
}

impl Default for MetricSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            cutoffs: DEFAULT_CUTOFFS.to_vec(),
            error_strategy: ErrorStrategy::default(),
            ndcg_type: NdcgType::default(),
            gamma: DEFAULT_GAMMA,
            distance: DistanceKind::default(),
            discount: RankDiscount::default(),
            num_items: None,
            gini_complement: false,
        }
    }
}

impl MetricKind {
    /// Returns all metric kinds for iteration.
    pub fn all() -> &'static [MetricKind] {
        &[
            MetricKind::Mae,
            MetricKind::Rmse,
            MetricKind::Precision,
            MetricKind::Recall,
            MetricKind::Map,
            MetricKind::Ndcg,
            MetricKind::PopularityStratifiedRecall,
            MetricKind::Epc,
            MetricKind::Efd,
            MetricKind::Epd,
            MetricKind::Eild,
            MetricKind::AggrDiv,
            MetricKind::GiniIndex,
        ]
    }

    /// True when [`MetricKind::build`] fails without a training model.
    pub fn needs_training(self) -> bool {
        matches!(
            self,
            MetricKind::PopularityStratifiedRecall
                | MetricKind::Epc
                | MetricKind::Efd
                | MetricKind::Epd
                | MetricKind::Eild
        )
    }

    /// Builds the metric.
    ///
    /// # Errors
    ///
    /// `MetricError::MissingTraining` when the metric needs a training model
    /// and none is given.
    pub fn build<'a, U: Id + 'a, I: Id + 'a>(
        self,
        settings: &MetricSettings,
        training: Option<&'a DataModel<U, I>>,
    ) -> Result<Box<dyn Metric<U, I> + 'a>, MetricError> {
        let cutoffs = &settings.cutoffs;
        let threshold = settings.threshold;
        let require = || training.ok_or_else(|| MetricError::MissingTraining(self.to_string()));

        let metric: Box<dyn Metric<U, I> + 'a> = match self {
            MetricKind::Mae => Box::new(Mae::new(settings.error_strategy)),
            MetricKind::Rmse => Box::new(Rmse::new(settings.error_strategy)),
            MetricKind::Precision => Box::new(Precision::new(threshold, cutoffs)),
            MetricKind::Recall => Box::new(Recall::new(threshold, cutoffs)),
            MetricKind::Map => Box::new(Map::new(threshold, cutoffs)),
            MetricKind::Ndcg => Box::new(Ndcg::new(threshold, cutoffs, settings.ndcg_type)),
            MetricKind::PopularityStratifiedRecall => Box::new(PopularityStratifiedRecall::from_model(
                threshold,
                cutoffs,
                settings.gamma,
                require()?,
            )),
            MetricKind::Epc => Box::new(
                NoveltyMetric::new(Epc::new(require()?), cutoffs).with_discount(settings.discount),
            ),
            MetricKind::Efd => Box::new(
                NoveltyMetric::new(Efd::new(require()?), cutoffs).with_discount(settings.discount),
            ),
            MetricKind::Epd => {
                let training = require()?;
                match settings.distance {
                    DistanceKind::Jaccard => Box::new(
                        NoveltyMetric::new(Epd::new(training, JaccardDistance::new(training)), cutoffs)
                            .with_discount(settings.discount),
                    ),
                    DistanceKind::Cosine => Box::new(
                        NoveltyMetric::new(Epd::new(training, CosineDistance::new(training)), cutoffs)
                            .with_discount(settings.discount),
                    ),
                }
            }
            MetricKind::Eild => {
                let training = require()?;
                match settings.distance {
                    DistanceKind::Jaccard => Box::new(
                        NoveltyMetric::new(Eild::new(JaccardDistance::new(training)), cutoffs)
                            .with_discount(settings.discount),
                    ),
                    DistanceKind::Cosine => Box::new(
                        NoveltyMetric::new(Eild::new(CosineDistance::new(training)), cutoffs)
                            .with_discount(settings.discount),
                    ),
                }
            }
            MetricKind::AggrDiv => Box::new(AggrDiv::new(cutoffs)),
            MetricKind::GiniIndex => {
                let num_items = settings
                    .num_items
                    .or_else(|| training.map(|t| t.num_items()))
                    .unwrap_or(0);
                Box::new(GiniIndex::new(num_items, cutoffs).complement(settings.gini_complement))
            }
        };
        Ok(metric)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Mae => "MAE",
            MetricKind::Rmse => "RMSE",
            MetricKind::Precision => "Precision",
            MetricKind::Recall => "Recall",
            MetricKind::Map => "MAP",
            MetricKind::Ndcg => "NDCG",
            MetricKind::PopularityStratifiedRecall => "PopularityStratifiedRecall",
            MetricKind::Epc => "EPC",
            MetricKind::Efd => "EFD",
            MetricKind::Epd => "EPD",
            MetricKind::Eild => "EILD",
            MetricKind::AggrDiv => "AggrDiv",
            MetricKind::GiniIndex => "GiniIndex",
        };
        f.write_str(name)
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "mae" => Ok(MetricKind::Mae),
            "rmse" => Ok(MetricKind::Rmse),
            "precision" | "p" => Ok(MetricKind::Precision),
            "recall" | "r" => Ok(MetricKind::Recall),
            "map" => Ok(MetricKind::Map),
            "ndcg" => Ok(MetricKind::Ndcg),
            "popularitystratifiedrecall" | "psr" => Ok(MetricKind::PopularityStratifiedRecall),
            "epc" => Ok(MetricKind::Epc),
            "efd" => Ok(MetricKind::Efd),
            "epd" => Ok(MetricKind::Epd),
            "eild" => Ok(MetricKind::Eild),
            "aggrdiv" => Ok(MetricKind::AggrDiv),
            "gini" | "giniindex" => Ok(MetricKind::GiniIndex),
            _ => Err(MetricError::UnknownMetric(s.to_string())),
        }
    }
}
