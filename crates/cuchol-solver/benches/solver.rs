//! Benchmarks for ordering and the host solve pipeline.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use cuchol_core::{CsrMatrix, compute_ordering};
use cuchol_solver::{HostCholeskyBackend, SolverSession};

/// 5-point Laplacian on a `k` by `k` grid, labelled column-major.
fn grid_laplacian(k: usize) -> CsrMatrix {
    let idx = |x: usize, y: usize| x * k + y;
    let mut t = Vec::with_capacity(5 * k * k);
    for x in 0..k {
        for y in 0..k {
            let i = idx(x, y);
            t.push((i, i, 4.0 + 1e-3));
            if x + 1 < k {
                t.push((i, idx(x + 1, y), -1.0));
                t.push((idx(x + 1, y), i, -1.0));
            }
            if y + 1 < k {
                t.push((i, idx(x, y + 1), -1.0));
                t.push((idx(x, y + 1), i, -1.0));
            }
        }
    }
    CsrMatrix::from_triplets(k * k, k * k, &t).unwrap()
}

fn bench_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("rcm_ordering");

    for k in [16, 32, 64] {
        let a = grid_laplacian(k);
        group.bench_with_input(BenchmarkId::from_parameter(k * k), &a, |bencher, a| {
            bencher.iter(|| compute_ordering(black_box(a.pattern())).unwrap());
        });
    }

    group.finish();
}

fn bench_host_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_solve");

    for k in [16, 32] {
        let a = grid_laplacian(k);
        let b = vec![1.0; k * k];
        for reorder in [false, true] {
            let id = format!("{}/{}", if reorder { "rcm" } else { "natural" }, k * k);
            group.bench_with_input(BenchmarkId::from_parameter(id), &a, |bencher, a| {
                let mut session = SolverSession::new(HostCholeskyBackend::new());
                bencher.iter(|| session.solve(black_box(a), black_box(&b), reorder).unwrap());
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_ordering, bench_host_solve);
criterion_main!(benches);
