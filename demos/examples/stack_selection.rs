// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stack selection.
//!
//! Build a synthetic stack of planes, index it, and select a rectangle.
//! Cells drift a little from plane to plane and fade in and out, so most span a
//! few planes only.
//!
//! Run:
//! - `RUST_LOG=info cargo run -p cellstack_demos --example stack_selection`

use std::sync::Arc;

use cellstack_select::{
    CellId, ClippedBoundary, EngineConfig, MemoryLoader, PlaneId, Polygon, PolygonSet, SelectionRect,
    Session, ring_area,
};
use kurbo::Point;
use log::info;

const PLANES: u32 = 12;
const GRID: i64 = 30;

/// A hexagon-ish outline of `cell` on `plane`.
fn outline(cell: CellId, plane: PlaneId) -> Polygon {
    let (gx, gy) = ((cell % GRID) as f64, (cell / GRID) as f64);
    let drift = f64::from(plane) * 0.15;
    let (cx, cy) = (gx * 20.0 + drift, gy * 20.0 - drift);
    let r = 8.0 + 2.0 * (f64::from(plane) * 0.5 + gx).sin();
    Polygon::new(
        cell,
        plane,
        (0..6).map(|k| {
            let a = std::f64::consts::TAU * f64::from(k) / 6.0;
            Point::new(cx + r * a.cos(), cy + r * a.sin())
        }),
    )
}

fn stack() -> MemoryLoader {
    MemoryLoader::from_sets((0..PLANES).map(|plane| {
        let polygons = (0..GRID * GRID)
            // Each cell lives on a window of planes that depends on its id.
            .filter(|cell| {
                let start = (cell % 7) as u32;
                plane >= start && plane < start + 5
            })
            .map(|cell| outline(cell, plane))
            .collect();
        PolygonSet::new(plane, polygons)
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let session = Session::new(EngineConfig::default(), Arc::new(stack()));
    let index = session.build_index(PLANES).await?;
    let stats = index.stats();
    info!("{} cells over {} planes", index.cell_count(), stats.planes_loaded);

    let rect = SelectionRect::new(95.0, 95.0, 131.0, 121.0)?;
    let selection = session.query_selection(rect).await?;
    println!(
        "selection {} ({:?}): {} results, {} intersecting",
        selection.generation,
        selection.mode,
        selection.results.len(),
        selection.intersecting().count()
    );
    for result in selection.intersecting() {
        let Some(clipped) = &result.clipped else {
            println!("  cell {:>4} plane {:>2}: touches only", result.cell_id, result.plane);
            continue;
        };
        let area: f64 = clipped.rings().iter().map(|r| ring_area(r).abs()).sum();
        let shape = match clipped {
            ClippedBoundary::Single(_) => "single",
            ClippedBoundary::Multi(_) => "multi",
        };
        println!(
            "  cell {:>4} plane {:>2}: {shape} ({} pieces), area {area:.1}",
            result.cell_id,
            result.plane,
            clipped.piece_count()
        );
    }
    Ok(())
}
