//! Criterion benchmarks for the posterior hot path in `hlb-core`.
//!
//! Runs against the bundled fixture survey so results are deterministic.

use std::fs::File;
use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hlb_config::{ModelSpec, PriorConfig};
use hlb_core::data::{clean, read_csv, CleaningOptions, SurveyTable};
use hlb_core::model::{
    fit_model, resolve_priors, DesignMatrix, Formula, HmcSampler, LogitProblem, SamplerConfig,
};

fn fixture_table() -> SurveyTable {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/hair_loss_small.csv");
    let file = File::open(&path).expect("fixture exists");
    let raw = read_csv(file, "bench").expect("fixture parses");
    clean(&raw, &CleaningOptions::default())
        .expect("fixture cleans")
        .table
}

fn bench_log_density(c: &mut Criterion) {
    let table = fixture_table();
    let priors = PriorConfig::default();

    let mut group = c.benchmark_group("log_density");
    for (name, predictors) in [
        ("genetics", vec!["Genetics"]),
        (
            "lifestyle",
            vec!["Genetics", "Weight.Loss", "Smoking", "Stress", "Age"],
        ),
    ] {
        let spec = ModelSpec::new(name, &predictors);
        let formula = Formula::from_spec(&spec).expect("formula");
        let design = DesignMatrix::build(&table, &formula).expect("design");
        let resolved = resolve_priors(&priors, &design).expect("priors");
        let problem = LogitProblem::new(&design, &resolved).expect("problem");
        let theta = vec![0.1; problem.dim()];
        let mut grad = vec![0.0; problem.dim()];

        group.bench_with_input(BenchmarkId::new("with_grad", name), &problem, |b, p| {
            b.iter(|| {
                let lp = p.log_density_and_grad(black_box(&theta), &mut grad);
                black_box(lp);
            })
        });
    }
    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let table = fixture_table();
    let priors = PriorConfig::default();
    let sampler = HmcSampler::default();
    let config = SamplerConfig {
        chains: 1,
        warmup: 100,
        draws: 100,
        seed: 3,
        target_accept: 0.8,
        max_leapfrog_steps: 64,
    };
    let spec = ModelSpec::new("genetics", &["Genetics", "Weight.Loss"]);

    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    group.bench_function("hmc_single_chain", |b| {
        b.iter(|| {
            let fit = fit_model(black_box(&table), &spec, &priors, &sampler, &config)
                .expect("fit succeeds");
            black_box(fit.n_coefficients());
        })
    });
    group.finish();
}

criterion_group!(benches, bench_log_density, bench_fit);
criterion_main!(benches);
