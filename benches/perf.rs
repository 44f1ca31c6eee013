use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use case_bayes::bayes::{self, PredictionMode};
use case_bayes::config::TrainConfig;
use case_bayes::simplex;
use case_bayes::synthetic::{self, SyntheticConfig};
use case_bayes::trainer;

fn sample_config() -> SyntheticConfig {
    SyntheticConfig {
        rows: 300,
        features: 8,
        ..Default::default()
    }
}

fn bench_train(c: &mut Criterion) {
    let records = synthetic::generate(&sample_config());
    let cfg = TrainConfig {
        grid_step_count: 50,
        optimizer_iterations: 40,
        ..TrainConfig::with_keys(synthetic::feature_keys(8))
    };
    c.bench_function("train_300x8", |b| {
        b.iter(|| {
            let set = trainer::train(black_box(&records), &cfg).unwrap();
            black_box(set.prior());
        })
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let records = synthetic::generate(&sample_config());
    let cfg = TrainConfig::with_keys(synthetic::feature_keys(8));
    let set = trainer::baseline(&records, &cfg).unwrap();
    c.bench_function("evaluate_indicator", |b| {
        b.iter(|| {
            let m = bayes::evaluate(&set, black_box(&records), PredictionMode::Indicator).unwrap();
            black_box(m.accuracy);
        })
    });
    c.bench_function("evaluate_continuous", |b| {
        b.iter(|| {
            let m =
                bayes::evaluate(&set, black_box(&records), PredictionMode::Continuous).unwrap();
            black_box(m.accuracy);
        })
    });
}

fn bench_simplex(c: &mut Criterion) {
    let bounds = vec![(-10.0, 10.0); 6];
    c.bench_function("simplex_rosenbrock_6d", |b| {
        b.iter(|| {
            let r = simplex::minimize(
                |x| {
                    x.windows(2)
                        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
                        .sum::<f64>()
                },
                black_box(&[3.0; 6]),
                &bounds,
                200,
            );
            black_box(r.value);
        })
    });
}

criterion_group!(perf, bench_train, bench_evaluate, bench_simplex);
criterion_main!(perf);
