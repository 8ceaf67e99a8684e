//! Rival CLI - Command-line runner for offline recommender evaluation.
//!
//! # Usage
//!
//! ```bash
//! # Split ratings into training/test files
//! rival split ratings.tsv --out-dir splits --method random --ratio 0.8
//!
//! # Write ranking and groundtruth files for trec_eval
//! rival strategy --training train.tsv --test test.tsv --predictions recs.tsv \
//!     --strategy rel_plus_n --format treceval --ranking run.txt --groundtruth qrels.txt
//!
//! # Compute metrics
//! rival evaluate --training train.tsv --test test.tsv --predictions recs.tsv -m ndcg -m precision
//! rival evaluate ... --json --output report.json
//!
//! # Compare per-user reports against a baseline
//! rival compare --metric NDCG@10 --baseline pop.json --method knn.json --method mf.json
//! ```

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rival_core::metric::{MetricKind, NdcgType};
use rival_core::stats::SignificanceTest;
use rival_core::strategy::{OutputFormat, StrategyKind};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Rival recommender evaluation CLI.
///
/// Splits rating data, applies candidate selection strategies, computes
/// ranking, error, novelty and diversity metrics, and compares methods.
#[derive(Parser)]
#[command(name = "rival", version, about)]
struct Cli {
    /// TOML file supplying defaults for every subcommand
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a ratings file into training and test files
    Split(SplitArgs),
    /// Restrict predictions to a strategy's candidates and write ranking/groundtruth files
    Strategy(StrategyArgs),
    /// Compute metrics for predictions against a test set
    Evaluate(EvaluateArgs),
    /// Compare per-user metric reports of several methods against a baseline
    Compare(CompareArgs),
}

/// How a ratings file is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SplitMethod {
    Random,
    Crossfold,
    Temporal,
}

/// Layout of the predictions file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PredictionLayout {
    /// One `user item score` line per prediction
    #[default]
    Simple,
    /// One `user [item:score,...]` line per user
    List,
}

/// Options shared by every command that reads preference files.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Field delimiter of preference files (default: tab)
    #[arg(long, default_value_t = '\t')]
    pub delimiter: char,

    /// Skip the first line of every preference file
    #[arg(long)]
    pub header: bool,

    /// Skip malformed lines instead of failing
    #[arg(long)]
    pub lenient: bool,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Ratings file (`user item score [timestamp]`)
    pub input: PathBuf,

    /// Directory receiving the training/test files
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = SplitMethod::Random)]
    pub method: SplitMethod,

    /// Share of preferences kept for training (random, temporal)
    #[arg(long, default_value_t = 0.8)]
    pub ratio: f64,

    /// Number of folds (crossfold)
    #[arg(long, default_value_t = 5)]
    pub folds: usize,

    /// Split each user's preferences separately
    #[arg(long)]
    pub per_user: bool,

    /// Shuffle seed (default: from config)
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub input_args: InputArgs,
}

/// Training, test and predictions files plus the candidate strategy.
#[derive(Args, Debug)]
pub struct EvaluationInputs {
    #[arg(long)]
    pub training: PathBuf,

    #[arg(long)]
    pub test: PathBuf,

    #[arg(long)]
    pub predictions: PathBuf,

    #[arg(long, value_enum, default_value_t = PredictionLayout::Simple)]
    pub predictions_layout: PredictionLayout,

    /// Candidate selection strategy (default: from config)
    #[arg(long)]
    pub strategy: Option<StrategyKind>,

    /// Relevance threshold (default: from config)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// RelPlusN sample size (default: from config)
    #[arg(long)]
    pub rel_plus_n: Option<usize>,

    /// RelPlusN seed (default: from config)
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub input_args: InputArgs,
}

#[derive(Args, Debug)]
pub struct StrategyArgs {
    #[command(flatten)]
    pub inputs: EvaluationInputs,

    /// Ranking output file
    #[arg(long)]
    pub ranking: PathBuf,

    /// Groundtruth output file
    #[arg(long)]
    pub groundtruth: PathBuf,

    /// Output line format (default: from config)
    #[arg(long)]
    pub format: Option<OutputFormat>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub inputs: EvaluationInputs,

    /// Metric to compute; repeat for several (default: from config)
    #[arg(short, long = "metric")]
    pub metrics: Vec<MetricKind>,

    /// Ranking cutoff; repeat for several (default: from config)
    #[arg(short = 'k', long = "cutoff")]
    pub cutoffs: Vec<usize>,

    /// NDCG gain function (default: from config)
    #[arg(long)]
    pub ndcg_type: Option<NdcgType>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the full report, including per-user values, to this file
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    /// Metric entry to compare, e.g. `NDCG@10`
    #[arg(long)]
    pub metric: String,

    /// Report written by `evaluate --output` for the baseline
    #[arg(long)]
    pub baseline: PathBuf,

    /// Reports of the compared methods; repeat for several
    #[arg(long = "method", required = true)]
    pub methods: Vec<PathBuf>,

    /// Significance test to run; repeat for several (default: from config)
    #[arg(long = "test")]
    pub tests: Vec<SignificanceTest>,

    /// Significance level (default: from config)
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Bootstrap resamples per system, 0 to skip (default: from config)
    #[arg(long)]
    pub bootstrap_samples: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let base = config::load(cli.config.as_deref())?;

    let output = match cli.command {
        Command::Split(args) => commands::split(&args, &base)?,
        Command::Strategy(args) => commands::strategy(&args, &base)?,
        Command::Evaluate(args) => commands::evaluate(&args, &base)?,
        Command::Compare(args) => commands::compare(&args, &base)?,
    };

    println!("{}", output);
    Ok(())
}
