// ========================================================================================
//
//                    ghicast: model fitting performance benchmark
//
// ========================================================================================
//
// Measures training and grid prediction on synthetic panels of increasing country count.
// The design matrix has countries + degree * (countries + 1) columns, so the normal-equation solve
// dominates for the larger panels.
//
// ========================================================================================

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ghicast::config::DEFAULT_ANCHOR_YEARS;
use ghicast::estimate::train_model;
use ghicast::model::ModelConfig;
use ghicast::normalize::LongRecord;
use ghicast::predict::{ClipBounds, predict_grid};
use ghicast::select::TrainingSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// --- Benchmark Tuning Parameters ---

/// Panel sizes to test.
const COUNTRY_COUNTS: [usize; 3] = [25, 75, 150];
/// Probability that a country reported a value in a given anchor year.
const COVERAGE: f64 = 0.8;

fn synthetic_panel(num_countries: usize, seed: u64) -> TrainingSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::new();
    for c in 0..num_countries {
        let level = rng.gen_range(5.0..55.0);
        let slope = rng.gen_range(-1.2..0.2);
        let mut reported = false;
        for &year in &DEFAULT_ANCHOR_YEARS {
            if rng.gen_range(0.0..1.0) > COVERAGE {
                continue;
            }
            let noise = rng.gen_range(-1.5..1.5);
            records.push(LongRecord {
                country: format!("Country{c:03}"),
                year,
                value: (level + slope * (year - 2000) as f64 + noise).clamp(0.0, 100.0),
            });
            reported = true;
        }
        // Every country keeps at least one row.
        if !reported {
            records.push(LongRecord {
                country: format!("Country{c:03}"),
                year: 2024,
                value: (level + slope * 24.0).clamp(0.0, 100.0),
            });
        }
    }
    TrainingSet::from_records(records).expect("non-empty synthetic panel")
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("train_model");
    let config = ModelConfig::default();
    for &countries in &COUNTRY_COUNTS {
        let panel = synthetic_panel(countries, 42);
        assert!(panel.len() <= countries * DEFAULT_ANCHOR_YEARS.len());
        group.throughput(Throughput::Elements(panel.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(countries), &panel, |b, panel| {
            b.iter(|| train_model(black_box(panel), &config).expect("fit"))
        });
    }
    group.finish();
}

fn bench_predict_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict_grid");
    let target_years: Vec<i32> = (2025..=2035).collect();
    for &countries in &COUNTRY_COUNTS {
        let model = train_model(&synthetic_panel(countries, 7), &ModelConfig::default())
            .expect("fit");
        let names = model.vocabulary.countries().to_vec();
        group.throughput(Throughput::Elements((names.len() * target_years.len()) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(countries), &names, |b, names| {
            b.iter(|| {
                predict_grid(&model, black_box(names), &target_years, ClipBounds::default())
                    .expect("predict")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fit, bench_predict_grid);
criterion_main!(benches);
