//! Benchmarks for the evaluation pipeline.
//!
//! Run with: `cargo bench -p rival-core --bench metrics`
//!
//! These benchmarks measure:
//! - Candidate filtering per strategy
//! - Ranking metrics at the default cutoffs
//! - Novelty metrics that need pairwise item distances
//! - Paired significance tests over many users

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rival_core::config::{DEFAULT_CUTOFFS, DEFAULT_SEED};
use rival_core::data::{DataModel, RandomSplitter, Split, Splitter};
use rival_core::metric::{Eild, JaccardDistance, Metric, Ndcg, NdcgType, NoveltyMetric, Precision};
use rival_core::stats::{paired_ttest, wilcoxon};
use rival_core::strategy::{filter_predictions, StrategyKind};
use std::collections::BTreeMap;
use std::time::Duration;

const NUM_USERS: u32 = 500;
const NUM_ITEMS: u32 = 400;

// =============================================================================
// Test Data Generation
// =============================================================================

/// Deterministic pseudo-random value in [0, 1) for a (user, item) pair.
fn seeded_unit(user: u32, item: u32) -> f64 {
    let mut x = (user as u64) << 32 | item as u64;
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    (x % 10_000) as f64 / 10_000.0
}

/// Each user rates roughly a tenth of the catalog on a 1-5 scale.
fn ratings() -> DataModel<u32, u32> {
    let mut model = DataModel::new();
    for user in 0..NUM_USERS {
        for item in 0..NUM_ITEMS {
            let r = seeded_unit(user, item);
            if r < 0.1 {
                model.add_preference(user, item, (r * 50.0).floor() + 1.0);
            }
        }
    }
    model
}

fn split() -> Split<u32, u32> {
    RandomSplitter::new(0.8, true, DEFAULT_SEED)
        .expect("valid ratio")
        .split(&ratings())
        .remove(0)
}

/// Scores every item for every user.
fn predictions() -> DataModel<u32, u32> {
    let mut model = DataModel::new();
    for user in 0..NUM_USERS {
        for item in 0..NUM_ITEMS {
            model.add_preference(user, item, seeded_unit(item, user));
        }
    }
    model
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy/filter");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    let split = split();
    let predictions = predictions();
    group.throughput(Throughput::Elements(split.test.num_users() as u64));

    for kind in [StrategyKind::TestItems, StrategyKind::UserTest, StrategyKind::RelPlusN] {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            let strategy = kind.build(&split.training, &split.test, 3.0, 100, DEFAULT_SEED);
            b.iter(|| filter_predictions(strategy.as_ref(), black_box(&predictions)));
        });
    }

    group.finish();
}

fn bench_ranking_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metric/ranking");
    group.sample_size(20);

    let split = split();
    let strategy = StrategyKind::TestItems.build(&split.training, &split.test, 3.0, 0, 0);
    let filtered = filter_predictions(strategy.as_ref(), &predictions());

    let precision = Precision::new(3.0, &DEFAULT_CUTOFFS);
    group.bench_function("precision", |b| {
        b.iter(|| precision.compute(black_box(&filtered), &split.test));
    });

    let ndcg = Ndcg::new(3.0, &DEFAULT_CUTOFFS, NdcgType::Exp);
    group.bench_function("ndcg", |b| {
        b.iter(|| ndcg.compute(black_box(&filtered), &split.test));
    });

    group.finish();
}

fn bench_novelty(c: &mut Criterion) {
    let mut group = c.benchmark_group("metric/novelty");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    let split = split();
    let strategy = StrategyKind::UserTest.build(&split.training, &split.test, 3.0, 0, 0);
    let filtered = filter_predictions(strategy.as_ref(), &predictions());
    let eild = NoveltyMetric::new(Eild::new(JaccardDistance::new(&split.training)), &[10]);

    group.bench_function("eild@10", |b| {
        b.iter(|| eild.compute(black_box(&filtered), &split.test));
    });

    group.finish();
}

fn bench_significance(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats/paired");

    for &users in &[30usize, 1_000] {
        let baseline: BTreeMap<usize, f64> =
            (0..users).map(|u| (u, seeded_unit(u as u32, 1))).collect();
        let other: BTreeMap<usize, f64> = (0..users)
            .map(|u| (u, seeded_unit(u as u32, 2) + 0.05))
            .collect();

        group.throughput(Throughput::Elements(users as u64));
        group.bench_with_input(BenchmarkId::new("paired_ttest", users), &users, |b, _| {
            b.iter(|| paired_ttest(black_box(&baseline), black_box(&other)));
        });
        group.bench_with_input(BenchmarkId::new("wilcoxon", users), &users, |b, _| {
            b.iter(|| wilcoxon(black_box(&baseline), black_box(&other)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_strategies,
    bench_ranking_metrics,
    bench_novelty,
    bench_significance
);
criterion_main!(benches);
