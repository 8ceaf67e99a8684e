//! Subcommand implementations.
//!
//! Identifiers are read as strings so any user/item naming scheme works.

use crate::output::{self, EvaluationReport};
use crate::{
    config, CompareArgs, EvaluateArgs, EvaluationInputs, InputArgs, PredictionLayout, SplitArgs,
    SplitMethod, StrategyArgs,
};
use anyhow::{anyhow, bail, Context, Result};
use rival_core::config::EvaluationConfig;
use rival_core::data::{
    CrossValidationSplitter, DataModel, ListParser, RandomSplitter, SimpleParser, Split, Splitter,
    TemporalSplitter,
};
use rival_core::metric::MetricResult;
use rival_core::stats::StatisticsReport;
use rival_core::strategy::{filter_predictions, write_all};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

type Model = DataModel<String, String>;

// =============================================================================
// Input
// =============================================================================

/// Reads a `user item score [timestamp]` file.
fn read_preferences(path: &Path, args: &InputArgs) -> Result<Model> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let model = SimpleParser::new()
        .with_delimiter(args.delimiter)
        .skip_header(args.header)
        .lenient(args.lenient)
        .parse(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    info!(
        "Read {} preferences ({} users, {} items) from {}",
        model.num_preferences(),
        model.num_users(),
        model.num_items(),
        path.display()
    );
    Ok(model)
}

fn read_predictions(inputs: &EvaluationInputs) -> Result<Model> {
    match inputs.predictions_layout {
        PredictionLayout::Simple => read_preferences(&inputs.predictions, &inputs.input_args),
        PredictionLayout::List => {
            let path = &inputs.predictions;
            let file =
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            ListParser::new()
                .parse(BufReader::new(file))
                .with_context(|| format!("Failed to parse {}", path.display()))
        }
    }
}

/// Training, test and predictions of one evaluation run.
struct Inputs {
    training: Model,
    test: Model,
    predictions: Model,
}

impl Inputs {
    fn read(inputs: &EvaluationInputs) -> Result<Self> {
        Ok(Self {
            training: read_preferences(&inputs.training, &inputs.input_args)?,
            test: read_preferences(&inputs.test, &inputs.input_args)?,
            predictions: read_predictions(inputs)?,
        })
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

// =============================================================================
// Commands
// =============================================================================

/// Splits a ratings file and writes one training/test pair per split.
///
/// A single split is written as `train.tsv`/`test.tsv`; cross-validation
/// folds as `train_<k>.tsv`/`test_<k>.tsv`.
pub fn split(args: &SplitArgs, base: &EvaluationConfig) -> Result<String> {
    let data = read_preferences(&args.input, &args.input_args)?;
    let seed = args.seed.unwrap_or(base.seed);

    let splits: Vec<Split<String, String>> = match args.method {
        SplitMethod::Random => RandomSplitter::new(args.ratio, args.per_user, seed)?.split(&data),
        SplitMethod::Crossfold => {
            CrossValidationSplitter::new(args.folds, args.per_user, seed)?.split(&data)
        }
        SplitMethod::Temporal => TemporalSplitter::new(args.ratio, args.per_user)?.split(&data),
    };

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let mut summary = Vec::new();
    for (k, split) in splits.iter().enumerate() {
        let (train_path, test_path) = split_paths(&args.out_dir, k, splits.len());
        for (model, path) in [(&split.training, &train_path), (&split.test, &test_path)] {
            let mut out = create(path)?;
            output::write_preferences(model, &mut out, args.input_args.delimiter)?;
            out.flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        summary.push(format!(
            "{}: {} training / {} test preferences",
            train_path.display(),
            split.training.num_preferences(),
            split.test.num_preferences()
        ));
    }

    info!("Wrote {} split(s) to {}", splits.len(), args.out_dir.display());
    Ok(summary.join("\n"))
}

fn split_paths(dir: &Path, k: usize, count: usize) -> (PathBuf, PathBuf) {
    if count == 1 {
        (dir.join("train.tsv"), dir.join("test.tsv"))
    } else {
        (dir.join(format!("train_{k}.tsv")), dir.join(format!("test_{k}.tsv")))
    }
}

/// Writes ranking and groundtruth files for the configured strategy.
pub fn strategy(args: &StrategyArgs, base: &EvaluationConfig) -> Result<String> {
    let mut config = config::with_inputs(base, &args.inputs)?;
    if let Some(format) = args.format {
        config.output_format = format;
    }
    let inputs = Inputs::read(&args.inputs)?;

    let strategy = config.strategy.build(
        &inputs.training,
        &inputs.test,
        config.threshold,
        config.rel_plus_n,
        config.seed,
    );

    let mut ranking = create(&args.ranking)?;
    let mut groundtruth = create(&args.groundtruth)?;
    write_all(
        strategy.as_ref(),
        &inputs.predictions,
        &mut ranking,
        &mut groundtruth,
        config.output_format,
    )
    .context("Failed to write strategy output")?;
    ranking.flush().context("Failed to write ranking")?;
    groundtruth.flush().context("Failed to write groundtruth")?;

    Ok(format!(
        "Wrote {} ranking to {} and groundtruth to {} ({} strategy, {} test users)",
        config.output_format,
        args.ranking.display(),
        args.groundtruth.display(),
        config.strategy,
        inputs.test.num_users()
    ))
}

/// Computes every configured metric on the strategy-filtered predictions.
pub fn evaluate(args: &EvaluateArgs, base: &EvaluationConfig) -> Result<String> {
    let config = config::for_evaluate(base, args)?;
    let inputs = Inputs::read(&args.inputs)?;

    let strategy = config.strategy.build(
        &inputs.training,
        &inputs.test,
        config.threshold,
        config.rel_plus_n,
        config.seed,
    );
    let filtered = filter_predictions(strategy.as_ref(), &inputs.predictions);
    if filtered.is_empty() {
        warn!("No predictions left after applying the {} strategy", config.strategy);
    }

    let settings = config.metric_settings();
    let results = config
        .metrics
        .iter()
        .map(|kind| -> Result<MetricResult<String>> {
            let metric = kind
                .build(&settings, Some(&inputs.training))
                .with_context(|| format!("Failed to build {}", kind))?;
            Ok(metric.compute(&filtered, &inputs.test))
        })
        .collect::<Result<Vec<_>>>()?;

    let report = EvaluationReport::new(&config.strategy.to_string(), config.threshold, &results);

    if let Some(path) = &args.output {
        let mut out = create(path)?;
        serde_json::to_writer_pretty(&mut out, &report)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        out.flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote per-user report to {}", path.display());
    }

    Ok(if args.json {
        output::format_evaluation_json(&report)
    } else {
        output::format_evaluation_human(&report)
    })
}

/// Compares per-user values of one metric entry across saved reports.
pub fn compare(args: &CompareArgs, base: &EvaluationConfig) -> Result<String> {
    let config = config::for_compare(base, args)?;

    let (baseline_name, baseline) = read_entry(&args.baseline, &args.metric)?;
    let mut methods = BTreeMap::new();
    for path in &args.methods {
        let (name, values) = read_entry(path, &args.metric)?;
        if name == baseline_name || methods.contains_key(&name) {
            bail!("Duplicate method name '{}' ({})", name, path.display());
        }
        methods.insert(name, values);
    }

    let report =
        StatisticsReport::compute(&baseline_name, &baseline, &methods, &config.comparison_settings())?;

    Ok(if args.json {
        output::format_comparison_json(&args.metric, &report)
    } else {
        output::format_comparison_human(&args.metric, &report)
    })
}

/// Reads a saved report and returns its file stem with the per-user values
/// of `metric`.
fn read_entry(path: &Path, metric: &str) -> Result<(String, BTreeMap<String, f64>)> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let report: EvaluationReport = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse report {}", path.display()))?;
    let values = report.per_user(metric).ok_or_else(|| {
        anyhow!(
            "{} has no per-user values for '{}'",
            path.display(),
            metric
        )
    })?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((name, values))
}
