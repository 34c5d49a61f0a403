use criterion::{criterion_group, criterion_main, Criterion};
use fastrand::Rng;
use gridforge::backend::{BackendKind, PlacementBackend, SequentialBackend};
use gridforge::code::{CodeSet, SparseCode};
use gridforge::config::{PlacementConfig, RadiusPolicy};
use gridforge::energy::{EpochParams, NeighborScope, Objective};
use gridforge::optimizer::initialization::build_initial_grid;
use gridforge::optimizer::{EngineBuildParams, NoProgress};
use gridforge::similarity::Gate;
use std::hint::black_box;
use std::sync::Arc;

fn random_codes(n: usize, bits: usize, seed: u64) -> Vec<(String, SparseCode)> {
    let mut rng = Rng::with_seed(seed);
    (0..n)
        .map(|i| {
            let active: Vec<usize> = (0..bits / 8).map(|_| rng.usize(0..bits)).collect();
            (
                format!("c{}", i),
                SparseCode::from_active(bits, &active).expect("bits in range"),
            )
        })
        .collect()
}

fn scan_params() -> EpochParams {
    EpochParams {
        epoch: 0,
        gate: Gate::new(0.1, None),
        min_sim: 0.0,
        search_radius: 4,
        radius_policy: RadiusPolicy::Fixed,
        seed: 7,
        scope: NeighborScope::LongRange,
        objective: Objective::Minimize,
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let entries = random_codes(400, 256, 1);
    let codes: Vec<SparseCode> = entries.iter().map(|(_, c)| c.clone()).collect();
    let set = Arc::new(CodeSet::from_codes(&codes).expect("valid codes"));
    let grid = build_initial_grid(set.len(), 0.0, true, &mut Rng::with_seed(3))
        .expect("grid fits");

    let mut scan = |name: &str, cache: bool, params: EpochParams| {
        let mut backend = SequentialBackend::new(set.clone(), cache, true);
        backend.upload_state(&grid).expect("upload");
        c.bench_function(name, |b| {
            b.iter(|| backend.find_best_candidates(black_box(&params)).expect("scan"))
        });
    };
    scan("candidate scan (400 codes, long range)", false, scan_params());
    scan("candidate scan (400 codes, cached)", true, scan_params());
    scan(
        "candidate scan (400 codes, local r=3)",
        true,
        EpochParams {
            scope: NeighborScope::Local(3),
            ..scan_params()
        },
    );

    let small = random_codes(100, 128, 2);
    for backend in [BackendKind::Sequential, BackendKind::Parallel] {
        let config = PlacementConfig {
            epochs: 20,
            similarity_cache: true,
            ..PlacementConfig::default()
        };
        c.bench_function(&format!("full run (100 codes, 20 epochs, {})", backend), |b| {
            b.iter(|| {
                EngineBuildParams::builder()
                    .entries(small.clone())
                    .config(config.clone())
                    .backend(backend)
                    .build()
                    .build_engine()
                    .and_then(|engine| engine.run(NoProgress))
                    .expect("run")
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
