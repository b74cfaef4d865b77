//! Benchmarks for Caustic lattice topology
//!
//! Measures performance of:
//! - Adjacency view construction
//! - Neighbor lookups
//! - Slab ownership queries

use caustic_lattice::{Connectivity, Lattice, LatticeCoord, Partition};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark adjacency construction at different grid sizes
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("lattice_build");

    for &n in &[16usize, 32, 48] {
        group.throughput(Throughput::Elements((n * n * n) as u64));
        group.bench_with_input(BenchmarkId::new("faces", n), &n, |b, &n| {
            b.iter(|| Lattice::new(black_box(n), Connectivity::Faces))
        });
        group.bench_with_input(BenchmarkId::new("full", n), &n, |b, &n| {
            b.iter(|| Lattice::new(black_box(n), Connectivity::Full))
        });
    }
    group.finish();
}

/// Benchmark a full sweep over every point's neighbor list
fn bench_neighbor_sweep(c: &mut Criterion) {
    let lattice = Lattice::new(32, Connectivity::Full).unwrap();
    let mut group = c.benchmark_group("neighbor_sweep");
    group.throughput(Throughput::Elements(lattice.len() as u64));
    group.bench_function("sum_indices", |b| {
        b.iter(|| {
            let mut acc = 0usize;
            for i in 0..lattice.len() {
                for &n in lattice.neighbors(black_box(i)) {
                    acc = acc.wrapping_add(n);
                }
            }
            acc
        })
    });
    group.finish();
}

/// Benchmark ownership and boundary classification
fn bench_partition(c: &mut Criterion) {
    let lattice = Lattice::new(32, Connectivity::Faces).unwrap();
    let mut group = c.benchmark_group("partition");

    for &workers in &[2usize, 8] {
        let partition = Partition::new(32, workers).unwrap();
        group.bench_with_input(BenchmarkId::new("is_boundary", workers), &partition, |b, p| {
            b.iter(|| {
                (0..lattice.len())
                    .filter(|&i| p.is_boundary(&lattice, black_box(i)))
                    .count()
            })
        });
    }

    group.bench_function("coord_round_trip", |b| {
        b.iter(|| {
            let coord = LatticeCoord::new(black_box(17), black_box(-3), black_box(40));
            LatticeCoord::from_index(coord.to_index(32), 32)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_neighbor_sweep, bench_partition);
criterion_main!(benches);
