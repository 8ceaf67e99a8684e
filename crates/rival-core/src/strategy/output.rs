//! Ranking and groundtruth line formats.
//!
//! ```text
//! SIMPLE     ranking:     user<TAB>item<TAB>score
//!            groundtruth: user<TAB>item<TAB>score
//! TRECEVAL   ranking:     user<TAB>Q0<TAB>item<TAB>rank<TAB>score<TAB>r
//!            groundtruth: user<TAB>Q0<TAB>item<TAB>score
//! ```

use crate::data::Id;
use crate::error::StrategyError;
use crate::ranking::compare_scored;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// Run tag written in the last TRECEVAL ranking column.
const TREC_RUN_TAG: &str = "r";

/// Output line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Simple,
    TrecEval,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Simple => f.write_str("simple"),
            OutputFormat::TrecEval => f.write_str("treceval"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "simple" => Ok(OutputFormat::Simple),
            "treceval" | "trec" => Ok(OutputFormat::TrecEval),
            _ => Err(StrategyError::UnknownFormat(s.to_string())),
        }
    }
}

/// Writes a ranking sorted by descending score (ties by item id).
pub fn write_ranking<I: Id>(
    user: &str,
    scored_items: &[(I, f64)],
    out: &mut dyn Write,
    format: OutputFormat,
) -> io::Result<()> {
    let mut sorted = scored_items.to_vec();
    sorted.sort_by(compare_scored);

    for (rank, (item, score)) in sorted.iter().enumerate() {
        match format {
            OutputFormat::Simple => writeln!(out, "{}\t{}\t{}", user, item, score)?,
            OutputFormat::TrecEval => writeln!(
                out,
                "{}\tQ0\t{}\t{}\t{}\t{}",
                user,
                item,
                rank + 1,
                score,
                TREC_RUN_TAG
            )?,
        }
    }
    Ok(())
}

/// Writes the items whose preference reaches `threshold`, highest first.
pub fn write_groundtruth<I: Id>(
    user: &str,
    items: &[(I, f64)],
    threshold: f64,
    out: &mut dyn Write,
    format: OutputFormat,
) -> io::Result<()> {
    let mut relevant: Vec<(I, f64)> = items
        .iter()
        .filter(|(_, pref)| *pref >= threshold)
        .cloned()
        .collect();
    relevant.sort_by(compare_scored);

    for (item, pref) in relevant {
        match format {
            OutputFormat::Simple => writeln!(out, "{}\t{}\t{}", user, item, pref)?,
            OutputFormat::TrecEval => writeln!(out, "{}\tQ0\t{}\t{}", user, item, pref)?,
        }
    }
    Ok(())
}
