//! End-to-end evaluation: parse -> split -> strategy -> metrics -> statistics.

use rival_core::config::EvaluationConfig;
use rival_core::data::{CrossValidationSplitter, DataModel, RandomSplitter, SimpleParser, Splitter};
use rival_core::metric::{Metric, MetricKind, Precision};
use rival_core::stats::{SignificanceTest, StatisticsReport};
use rival_core::strategy::{filter_predictions, write_all, OutputFormat, StrategyKind};
use std::collections::BTreeMap;
use std::io::Cursor;

/// 30 users x 20 items; user u rates item i when (u + i) % 3 != 0, with
/// ratings 1..=5 and increasing timestamps.
fn ratings_file() -> String {
    let mut lines = Vec::new();
    let mut ts = 0;
    for user in 1..=30u32 {
        for item in 1..=20u32 {
            if (user + item) % 3 != 0 {
                ts += 1;
                lines.push(format!("{}\t{}\t{}\t{}", user, item, (user * item) % 5 + 1, ts));
            }
        }
    }
    lines.join("\n")
}

/// Scores every candidate item by its training popularity.
fn popularity(training: &DataModel<u32, u32>, users: &[u32]) -> DataModel<u32, u32> {
    let mut predictions = DataModel::new();
    for &user in users {
        for item in training.items() {
            let count = training.item_preferences(item).map(|u| u.len()).unwrap_or(0);
            predictions.add_preference(user, *item, count as f64);
        }
    }
    predictions
}

/// Cheats by reading the test set: a near-perfect recommender.
fn oracle(test: &DataModel<u32, u32>, noise: &DataModel<u32, u32>) -> DataModel<u32, u32> {
    let mut predictions = noise.clone();
    for (user, item, pref) in test.preferences() {
        predictions.add_preference(*user, *item, 100.0 * pref);
    }
    predictions
}

fn load() -> DataModel<u32, u32> {
    SimpleParser::new()
        .parse(Cursor::new(ratings_file()))
        .expect("ratings parse")
}

#[test]
fn test_split_preserves_every_preference() {
    let data = load();
    let split = RandomSplitter::new(0.8, true, 7).unwrap().split(&data);
    assert_eq!(split.len(), 1);
    let split = &split[0];
    assert_eq!(
        split.training.num_preferences() + split.test.num_preferences(),
        data.num_preferences()
    );
    for (user, item, pref) in split.test.preferences() {
        assert_eq!(data.user_item_preference(user, item), Some(pref));
        assert!(split.training.user_item_preference(user, item).is_none());
        assert!(split.test.user_item_timestamps(user, item).is_some());
    }

    let folds = CrossValidationSplitter::new(5, false, 7).unwrap().split(&data);
    let test_total: usize = folds.iter().map(|f| f.test.num_preferences()).sum();
    assert_eq!(test_total, data.num_preferences());
}

#[test]
fn test_full_evaluation_pipeline() {
    let data = load();
    let split = RandomSplitter::new(0.8, true, 11).unwrap().split(&data).remove(0);
    let (training, test) = (split.training, split.test);
    let users: Vec<u32> = {
        let mut users: Vec<u32> = test.users().copied().collect();
        users.sort();
        users
    };

    let config = EvaluationConfig::from_toml_str(
        r#"
        threshold = 3.0
        cutoffs = [5, 10]
        strategy = "test_items"
        metrics = ["precision", "recall", "map", "ndcg", "popularity_stratified_recall", "epc", "efd", "eild", "aggr_div", "gini_index"]
        "#,
    )
    .unwrap();

    let strategy = config.strategy.build(
        &training,
        &test,
        config.threshold,
        config.rel_plus_n,
        config.seed,
    );
    let baseline = filter_predictions(strategy.as_ref(), &popularity(&training, &users));
    let better = filter_predictions(
        strategy.as_ref(),
        &oracle(&test, &popularity(&training, &users)),
    );

    let settings = config.metric_settings();
    let mut per_user_ndcg = BTreeMap::new();
    for kind in &config.metrics {
        let metric = kind.build(&settings, Some(&training)).unwrap();
        let base = metric.compute(&baseline, &test);
        let best = metric.compute(&better, &test);

        for k in [5, 10] {
            let value = best.value_at(k);
            assert!(value.is_nan() || value >= 0.0, "{}@{} = {}", kind, k, value);
        }
        if *kind == MetricKind::Ndcg {
            assert!(best.value() > base.value());
            assert!((best.value() - 1.0).abs() < 1e-9);
            per_user_ndcg.insert("baseline".to_string(), base.value_per_user().unwrap().clone());
            per_user_ndcg.insert("oracle".to_string(), best.value_per_user().unwrap().clone());
        }
        if *kind == MetricKind::Precision {
            assert!(best.value_at(5) >= base.value_at(5));
        }
    }

    let baseline_ndcg = per_user_ndcg.remove("baseline").unwrap();
    let report =
        StatisticsReport::compute("baseline", &baseline_ndcg, &per_user_ndcg, &config.comparison_settings())
            .unwrap();
    let oracle_stats = report.comparison("oracle").unwrap();
    assert!(oracle_stats.method_mean.unwrap() > oracle_stats.baseline_mean.unwrap());
    assert!(oracle_stats.p_values[&SignificanceTest::PairedTTest].unwrap() < config.alpha);
    assert!(oracle_stats.p_values[&SignificanceTest::Wilcoxon].unwrap() < config.alpha);
    assert!(report.bootstrap_intervals.contains_key("oracle"));
}

#[test]
fn test_strategies_restrict_candidates() {
    let data = load();
    let split = RandomSplitter::new(0.7, true, 3).unwrap().split(&data).remove(0);
    let users: Vec<u32> = (1..=30).collect();
    let predictions = popularity(&split.training, &users);

    for kind in StrategyKind::all() {
        let strategy = kind.build(&split.training, &split.test, 3.0, 5, 99);
        let filtered = filter_predictions(strategy.as_ref(), &predictions);
        for (user, item, _) in filtered.preferences() {
            assert!(
                strategy.candidate_items(user).contains(item),
                "{} ranked a non-candidate",
                kind
            );
            assert!(split.training.user_item_preference(user, item).is_none() || *kind == StrategyKind::UserTest);
        }
    }
}

#[test]
fn test_trec_output_for_every_user() {
    let data = load();
    let split = RandomSplitter::new(0.8, true, 5).unwrap().split(&data).remove(0);
    let users: Vec<u32> = (1..=30).collect();
    let predictions = popularity(&split.training, &users);
    let strategy = StrategyKind::TestItems.build(&split.training, &split.test, 1.0, 0, 0);

    let mut ranking = Vec::new();
    let mut groundtruth = Vec::new();
    write_all(
        strategy.as_ref(),
        &predictions,
        &mut ranking,
        &mut groundtruth,
        OutputFormat::TrecEval,
    )
    .unwrap();

    let ranking = String::from_utf8(ranking).unwrap();
    assert!(ranking.lines().all(|l| l.split('\t').count() == 6));
    assert!(ranking.lines().all(|l| l.ends_with("\tr")));
    let groundtruth = String::from_utf8(groundtruth).unwrap();
    assert_eq!(groundtruth.lines().count(), split.test.num_preferences());
}

#[test]
fn test_precision_is_pure_across_inputs() {
    let data = load();
    let split = RandomSplitter::new(0.8, false, 1).unwrap().split(&data).remove(0);
    let users: Vec<u32> = split.test.users().copied().collect();
    let predictions = popularity(&split.training, &users);
    let metric = Precision::new(3.0, &[5]);

    let first = metric.compute(&predictions, &split.test);
    let other = metric.compute(&predictions, &split.training);
    let again = metric.compute(&predictions, &split.test);
    assert_eq!(first, again);
    assert_ne!(first.value(), other.value());
}
