// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use cellstack_index::{Aabb2D, FlatIndex, RTree, SpatialIndex};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

/// `n * n` cell bounds on a grid, each slightly larger than its pitch so
/// neighbours overlap like cell outlines do.
fn gen_cell_bounds(n: usize, pitch: f64) -> Vec<(Aabb2D<f64>, u32)> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * pitch;
            let y0 = y as f64 * pitch;
            out.push((
                Aabb2D::<f64>::from_xywh(x0, y0, pitch * 1.2, pitch * 1.2),
                (y * n + x) as u32,
            ));
        }
    }
    out
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn gen_queries(count: usize, extent: f64, size: f64) -> Vec<Aabb2D<f64>> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|_| {
            let x0 = rng.next_f64() * (extent - size).max(1.0);
            let y0 = rng.next_f64() * (extent - size).max(1.0);
            Aabb2D::<f64>::from_xywh(x0, y0, size, size)
        })
        .collect()
}

fn bench_bulk_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_load");
    for &n in &[100usize, 316] {
        let entries = gen_cell_bounds(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("rtree_n{}", n * n), |b| {
            b.iter_batched(
                || entries.clone(),
                |entries| black_box(SpatialIndex::<f64, u32>::bulk_load(entries)),
                BatchSize::LargeInput,
            );
        });
        group.bench_function(format!("rtree_fan16_n{}", n * n), |b| {
            b.iter_batched(
                || entries.clone(),
                |entries| {
                    black_box(SpatialIndex::<f64, u32>::bulk_load_with(entries, |pairs| {
                        RTree::bulk_build_with(pairs, 16)
                    }))
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_query_rect(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_rect");
    for &n in &[100usize, 316] {
        let entries = gen_cell_bounds(n, 10.0);
        let extent = n as f64 * 10.0;
        let rtree = SpatialIndex::<f64, u32>::bulk_load(entries.clone());
        let flat = FlatIndex::<f64, u32>::bulk_load(entries);
        for &size in &[25.0, 250.0] {
            let queries = gen_queries(64, extent, size);
            group.throughput(Throughput::Elements(queries.len() as u64));
            group.bench_function(format!("rtree_n{}_q{}", n * n, size), |b| {
                b.iter(|| {
                    let hits: usize = queries.iter().map(|q| rtree.query_rect(*q).count()).sum();
                    black_box(hits)
                });
            });
            group.bench_function(format!("flat_n{}_q{}", n * n, size), |b| {
                b.iter(|| {
                    let hits: usize = queries.iter().map(|q| flat.query_rect(*q).count()).sum();
                    black_box(hits)
                });
            });
        }
    }
    group.finish();
}

fn bench_query_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_point");
    let n = 316;
    let rtree = SpatialIndex::<f64, u32>::bulk_load(gen_cell_bounds(n, 10.0));
    let points: Vec<_> = gen_queries(256, n as f64 * 10.0, 0.0)
        .into_iter()
        .map(|q| (q.min_x, q.min_y))
        .collect();
    group.throughput(Throughput::Elements(points.len() as u64));
    group.bench_function(format!("rtree_n{}", n * n), |b| {
        b.iter(|| {
            let hits: usize = points
                .iter()
                .map(|&(x, y)| rtree.query_point(x, y).count())
                .sum();
            black_box(hits)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_bulk_load, bench_query_rect, bench_query_point);
criterion_main!(benches);
