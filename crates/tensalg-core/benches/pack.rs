//! Packer benchmarks: coordinate streams into CSR and CSF storage.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tensalg_core::{pack_entries, Format, Shape};

fn synthetic_entries(n: usize, dims: &[usize]) -> Vec<(Shape, f64)> {
    // deterministic pseudo-random coordinates
    let mut state = 0x9e3779b97f4a7c15u64;
    (0..n)
        .map(|i| {
            let coord: Shape = dims
                .iter()
                .map(|&d| {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    (state >> 33) as usize % d
                })
                .collect();
            (coord, i as f64)
        })
        .collect()
}

fn bench_pack(c: &mut Criterion) {
    let dims = [1024, 1024];
    let entries = synthetic_entries(10_000, &dims);
    c.bench_function("pack_csr_10k", |b| {
        b.iter(|| {
            let packed =
                pack_entries(&dims, &Format::csr(), black_box(entries.clone())).unwrap();
            black_box(packed.values.len())
        })
    });

    let dims3 = [64, 64, 64];
    let entries3 = synthetic_entries(10_000, &dims3);
    c.bench_function("pack_csf_10k", |b| {
        b.iter(|| {
            let packed =
                pack_entries(&dims3, &Format::csf(3), black_box(entries3.clone())).unwrap();
            black_box(packed.values.len())
        })
    });
}

criterion_group!(benches, bench_pack);
criterion_main!(benches);
