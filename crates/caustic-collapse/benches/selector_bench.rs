//! Selector and collapse-polynomial benchmarks

use caustic_collapse::{
    Candidate, CollapsePolynomial, CollapseTime, CollapseTimeSelector, LptOrder, PointCollapse,
    RadiusSweep,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_select(c: &mut Criterion) {
    let selector = CollapseTimeSelector::new(1e-4).unwrap();
    let candidates: Vec<Candidate> = (0..12)
        .map(|i| Candidate {
            radius_index: i,
            radius: 12.0 - i as f64,
            time: CollapseTime::from_scale_factor(0.2 + 0.013 * ((i * 7) % 12) as f64),
        })
        .collect();
    c.bench_function("select_12_radii", |b| b.iter(|| selector.select(black_box(&candidates))));
}

fn bench_select_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_all");
    for points in [4_096usize, 32_768] {
        let sweeps: Vec<RadiusSweep> = (0..6)
            .map(|r| RadiusSweep {
                radius: 6.0 - r as f64,
                points: (0..points)
                    .map(|i| PointCollapse {
                        time: CollapseTime::from_scale_factor(0.1 + ((i * 31 + r * 17) % 89) as f64 / 100.0),
                        inverse_growth: 1.0,
                        eigenvalues: [1.0, 0.5, 0.1],
                    })
                    .collect(),
            })
            .collect();
        let selector = CollapseTimeSelector::default();
        group.bench_with_input(BenchmarkId::from_parameter(points), &sweeps, |b, sweeps| {
            b.iter(|| selector.select_all(black_box(sweeps)).unwrap())
        });
    }
    group.finish();
}

fn bench_roots(c: &mut Criterion) {
    let l = [0.9, 0.4, -0.2];
    for order in [LptOrder::First, LptOrder::Second, LptOrder::Third] {
        let poly = CollapsePolynomial::new(order, l);
        c.bench_function(&format!("first_root_{}", order.value()), |b| {
            b.iter(|| black_box(poly).first_root())
        });
    }
}

criterion_group!(benches, bench_select, bench_select_all, bench_roots);
criterion_main!(benches);
