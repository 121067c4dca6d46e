use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tempora_dating::{
    generate_constrained_random_tree, log_prior_density, AgePrior, Calibration, DatingConfig,
    TipSample,
};

fn tips(n: usize) -> Vec<TipSample> {
    (0..n).map(|i| TipSample::contemporary(format!("T{i}"))).collect()
}

fn calibrations(n: usize) -> Vec<Calibration> {
    let half: Vec<String> = (0..n / 2).map(|i| format!("T{i}")).collect();
    let quarter: Vec<String> = (0..n / 4).map(|i| format!("T{i}")).collect();
    vec![
        Calibration::new(half, -20.0, -12.0).expect("valid calibration"),
        Calibration::new(quarter, -8.0, -4.0).expect("valid calibration"),
    ]
}

fn bench_generator(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_tree");
    let config = DatingConfig::default();

    for n in [16, 128] {
        let tips = tips(n);
        let cals = calibrations(n);
        group.bench_function(format!("{n}_tips"), |b| {
            let mut rng = SmallRng::seed_from_u64(42);
            b.iter(|| generate_constrained_random_tree(black_box(&tips), &cals, &config, &mut rng))
        });
    }

    group.finish();
}

fn bench_densities(c: &mut Criterion) {
    let mut group = c.benchmark_group("prior_density");
    let config = DatingConfig::default();
    let n = 256;
    let mut rng = SmallRng::seed_from_u64(7);
    let sample = generate_constrained_random_tree(&tips(n), &calibrations(n), &config, &mut rng)
        .expect("feasible calibrations");
    let tree = sample.tree;
    let mut state = sample.state;

    for prior in [
        AgePrior::Uniform,
        AgePrior::YuleOrder,
        AgePrior::YuleJoint,
        AgePrior::BirthDeath,
    ] {
        group.bench_function(format!("{prior:?}_{n}_tips"), |b| {
            b.iter(|| log_prior_density(black_box(&tree), &mut state, prior, &config))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_generator, bench_densities);
criterion_main!(benches);
