// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use cellstack_select::{SelectionRect, clip_ring};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::Point;

/// A closed star with `spikes` points: concave, so most windows split it.
fn star(spikes: usize, outer: f64, inner: f64) -> Vec<Point> {
    let mut ring: Vec<Point> = (0..spikes * 2)
        .map(|k| {
            let r = if k % 2 == 0 { outer } else { inner };
            let a = std::f64::consts::TAU * k as f64 / (spikes * 2) as f64;
            Point::new(r * a.cos(), r * a.sin())
        })
        .collect();
    ring.push(ring[0]);
    ring
}

fn bench_clip(c: &mut Criterion) {
    let mut group = c.benchmark_group("clip_ring");
    for &spikes in &[8usize, 64, 512] {
        let ring = star(spikes, 100.0, 40.0);
        group.throughput(Throughput::Elements(ring.len() as u64));
        let inside = SelectionRect::new(-200.0, -200.0, 200.0, 200.0).unwrap();
        let split = SelectionRect::new(-100.0, 50.0, 100.0, 90.0).unwrap();
        let outside = SelectionRect::new(300.0, 300.0, 400.0, 400.0).unwrap();
        group.bench_function(format!("contained_s{spikes}"), |b| {
            b.iter(|| black_box(clip_ring(&ring, &inside)));
        });
        group.bench_function(format!("split_s{spikes}"), |b| {
            b.iter(|| black_box(clip_ring(&ring, &split)));
        });
        group.bench_function(format!("disjoint_s{spikes}"), |b| {
            b.iter(|| black_box(clip_ring(&ring, &outside)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_clip);
criterion_main!(benches);
