//! Output formatting for evaluation and comparison results.
//!
//! Supports both human-readable terminal output and JSON for scripting.
//! Metric reports written to disk keep per-user values so that `compare`
//! can read them back.

use anyhow::{Context, Result};
use rival_core::data::{DataModel, Id};
use rival_core::metric::{MetricResult, ReportEntry};
use rival_core::stats::{interpret_cohens_d, StatisticsReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// `metric name -> {"all": value, "users": {user: value, ...}}`
pub type MetricEntries = BTreeMap<String, ReportEntry>;

/// Metric report as written by `evaluate --output` and read by `compare`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub strategy: String,
    pub threshold: f64,
    pub metrics: MetricEntries,
}

impl EvaluationReport {
    /// Collects the entries of every result.
    pub fn new<U: Id>(strategy: &str, threshold: f64, results: &[MetricResult<U>]) -> Self {
        let mut metrics = BTreeMap::new();
        for result in results {
            metrics.extend(result.report());
        }
        Self {
            strategy: strategy.to_string(),
            threshold,
            metrics,
        }
    }

    /// Aggregate values only.
    pub fn summary(&self) -> BTreeMap<String, Option<f64>> {
        self.metrics
            .iter()
            .map(|(name, entry)| (name.clone(), entry.all))
            .collect()
    }

    /// Per-user values of one entry; undefined values become NaN.
    ///
    /// Returns `None` when the entry is missing or has no per-user values.
    pub fn per_user(&self, metric: &str) -> Option<BTreeMap<String, f64>> {
        let entry = self.metrics.get(metric)?;
        let users: BTreeMap<String, f64> = entry
            .users
            .iter()
            .map(|(user, value)| (user.clone(), value.unwrap_or(f64::NAN)))
            .collect();
        (!users.is_empty()).then_some(users)
    }
}

/// Formats aggregate metric values as JSON.
pub fn format_evaluation_json(report: &EvaluationReport) -> String {
    #[derive(Serialize)]
    struct Summary<'a> {
        strategy: &'a str,
        threshold: f64,
        metrics: BTreeMap<String, Option<f64>>,
    }
    let summary = Summary {
        strategy: &report.strategy,
        threshold: report.threshold,
        metrics: report.summary(),
    };
    serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string())
}

/// Formats aggregate metric values for the terminal.
pub fn format_evaluation_human(report: &EvaluationReport) -> String {
    if report.metrics.is_empty() {
        return "No metrics computed".to_string();
    }

    let summary = report.summary();
    let width = summary.keys().map(|name| name.len()).max().unwrap_or(0);

    let mut output = format!(
        "Strategy: {} (threshold {})\n\n",
        report.strategy, report.threshold
    );
    for (name, value) in &summary {
        output.push_str(&format!("  {:<width$}  {}\n", name, format_value(*value), width = width));
    }
    output.trim_end().to_string()
}

/// Formats a comparison report as JSON.
pub fn format_comparison_json(metric: &str, report: &StatisticsReport) -> String {
    #[derive(Serialize)]
    struct Comparison<'a> {
        metric: &'a str,
        #[serde(flatten)]
        report: &'a StatisticsReport,
    }
    serde_json::to_string_pretty(&Comparison { metric, report }).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a comparison report for the terminal.
pub fn format_comparison_human(metric: &str, report: &StatisticsReport) -> String {
    let mut output = format!(
        "Comparing {} against baseline \"{}\" (alpha = {})\n\n",
        metric, report.baseline, report.alpha
    );

    for comparison in &report.comparisons {
        output.push_str(&format!(
            "{}: {} vs {} over {} paired user{}\n",
            comparison.method,
            format_value(comparison.method_mean),
            format_value(comparison.baseline_mean),
            comparison.paired_users,
            if comparison.paired_users == 1 { "" } else { "s" }
        ));

        for (test, p) in &comparison.p_values {
            let marker = match p {
                Some(p) if *p < report.alpha => " *",
                _ => "",
            };
            output.push_str(&format!("   {} p = {}{}\n", test, format_value(*p), marker));
        }

        output.push_str(&format!(
            "   Cohen's d = {} ({}), least squares = {}\n",
            format_value(comparison.cohens_d),
            comparison.cohens_d.map(interpret_cohens_d).unwrap_or("undefined"),
            format_value(comparison.cohens_d_least_squares)
        ));
        output.push_str(&format!(
            "   Paired effect size = {}, standard error = {}\n",
            format_value(comparison.paired_effect_size),
            format_value(comparison.standard_error)
        ));
        let level = (1.0 - report.alpha) * 100.0;
        if let Some(interval) = &comparison.difference_interval {
            output.push_str(&format!("   Difference {:.0}% CI: {}\n", level, interval.format(4)));
        }
        if let Some(interval) = &comparison.unpaired_interval {
            output.push_str(&format!(
                "   Unpaired difference {:.0}% CI: {}\n",
                level,
                interval.format(4)
            ));
        }
        output.push('\n');
    }

    if !report.anova_intervals.is_empty() {
        output.push_str("ANOVA intervals:\n");
        for (system, interval) in &report.anova_intervals {
            output.push_str(&format!("   {}: {}\n", system, interval.format(4)));
        }
    }

    if !report.bootstrap_intervals.is_empty() {
        output.push_str("Bootstrap intervals:\n");
        for (system, interval) in &report.bootstrap_intervals {
            output.push_str(&format!("   {}: {}\n", system, interval.format(4)));
        }
    }

    output.trim_end().to_string()
}

/// Writes `user<delim>item<delim>score[<delim>timestamp]` lines in
/// (user, item) order.
///
/// Only the earliest timestamp of a pair is written: parsing sums repeated
/// pairs, so one line per pair keeps the preference intact.
pub fn write_preferences<U: Id, I: Id>(
    model: &DataModel<U, I>,
    out: &mut dyn Write,
    delimiter: char,
) -> Result<()> {
    let mut entries: Vec<(&U, &I, f64)> = model.preferences().collect();
    entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    for (user, item, score) in entries {
        let earliest = model
            .user_item_timestamps(user, item)
            .and_then(|stamps| stamps.iter().next());
        let written = match earliest {
            Some(ts) => writeln!(out, "{user}{d}{item}{d}{score}{d}{ts}", d = delimiter),
            None => writeln!(out, "{user}{d}{item}{d}{score}", d = delimiter),
        };
        written.context("Failed to write preferences")?;
    }
    Ok(())
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{:.4}", v),
        _ => "n/a".to_string(),
    }
}
