//! Benchmarks for the feasibility validator, geometry builder and genome repair.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use ring_search::{
    compute::{FeasibilityMode, GenomeOps, SearchRng, Validator, Verdict, build},
    schema::{Candidate, Envelope, GeneticConfig, Inventory, ObjectClass, RadiusDomain},
};

fn reference_layout() -> Candidate {
    use ObjectClass::{Long, Short};

    Candidate::homogeneous(
        vec![50.0, 100.0, 150.0, 200.0],
        vec![Short, Long, Short, Long],
        vec![7, 20, 21, 20],
    )
}

fn bench_validator(c: &mut Criterion) {
    let mut group = c.benchmark_group("validator");
    let validator = Validator::new(Inventory::default(), Envelope::default());
    let candidate = reference_layout();

    for mode in [FeasibilityMode::Exact, FeasibilityMode::Loose] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", mode)),
            &mode,
            |b, &mode| {
                b.iter(|| validator.check(black_box(&candidate), mode));
            },
        );
    }

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let inventory = Inventory::default();
    let validator = Validator::new(inventory.clone(), Envelope::default());
    let Ok(Verdict::Feasible(configuration)) =
        validator.check(&reference_layout(), FeasibilityMode::Exact)
    else {
        panic!("reference layout must be feasible");
    };

    c.bench_function("geometry_build", |b| {
        b.iter(|| build(black_box(&configuration), &inventory));
    });
}

fn bench_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("repair");

    for rings in [2, 4, 6] {
        let ops = GenomeOps::new(
            Inventory::default(),
            Envelope::default(),
            RadiusDomain::default(),
            GeneticConfig::default(),
        );
        let mut rng = SearchRng::new(7);
        let broken: Vec<Candidate> = (0..64)
            .map(|_| {
                let radii = (0..rings).map(|_| rng.uniform(0.0, 600.0)).collect();
                let labels = (0..rings).map(|_| rng.class()).collect();
                let counts = (0..rings).map(|_| rng.int(0, 40)).collect();
                Candidate::homogeneous(radii, labels, counts)
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_rings", rings)),
            &rings,
            |b, _| {
                b.iter(|| {
                    for genome in &broken {
                        let mut genome = genome.clone();
                        ops.repair(black_box(&mut genome));
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_validator, bench_build, bench_repair);
criterion_main!(benches);
