//! Benchmark for tick/drain convergence latency.
//!
//! Measures how long the simulation driver takes to reach a fixed point
//! on grids of increasing size — the dominant cost in any real run,
//! since everything downstream (forwarding tables, oracle, stretch) only
//! runs once per converged network.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use treesim::node_state::NodeStore;
use treesim::path_record::{NodeId, TreeId};
use treesim::simulation::{run_to_convergence, seed_clocks};

/// `side x side` 4-neighbor grid with sequential ids (no shuffling — the
/// benchmark cares about wall-clock convergence cost, not id assignment).
fn grid(side: usize) -> NodeStore {
    let mut store = NodeStore::new();
    let n = side * side;
    for i in 0..n as u64 {
        store.insert(NodeId::new(i), TreeId::new(i));
    }
    for row in 0..side {
        for col in 0..side {
            let id = (row * side + col) as u64;
            if col + 1 < side {
                store.link(NodeId::new(id), NodeId::new(id + 1)).unwrap();
            }
            if row + 1 < side {
                store
                    .link(NodeId::new(id), NodeId::new(id + side as u64))
                    .unwrap();
            }
        }
    }
    store
}

fn bench_convergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("convergence");

    for side in [4usize, 8, 16] {
        group.bench_with_input(BenchmarkId::new("grid", side * side), &side, |b, &side| {
            b.iter(|| {
                let mut store = grid(side);
                let mut rng = StdRng::seed_from_u64(12345);
                seed_clocks(&mut store, &mut rng);
                let report = run_to_convergence(&mut store).unwrap();
                black_box(report.steps);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_convergence);
criterion_main!(benches);
