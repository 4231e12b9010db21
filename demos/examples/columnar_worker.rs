// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Columnar planes decoded on a worker thread.
//!
//! Planes arrive as flat coordinate columns. A [`DecodeWorker`] decodes them and
//! summarizes them during the build, off the orchestrating task.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p cellstack_demos --example columnar_worker`

use std::collections::HashMap;
use std::sync::Arc;

use cellstack_select::{
    ColumnarLoader, DecodeWorker, EngineConfig, PlaneColumns, PlaneId, SelectionRect, Session,
};

/// Squares of side 4 on a 10-unit pitch; `plane` shifts them right.
fn columns(plane: PlaneId, cells: i64) -> PlaneColumns {
    let mut out = PlaneColumns {
        plane,
        offsets: vec![0],
        ..PlaneColumns::default()
    };
    for cell in 0..cells {
        let x = cell as f64 * 10.0 + f64::from(plane);
        for (dx, dy) in [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)] {
            out.xs.push(x + dx);
            out.ys.push(dy);
        }
        out.offsets.push(out.xs.len());
        out.labels.push(cell);
    }
    out
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let source: HashMap<PlaneId, PlaneColumns> = (0..4).map(|p| (p, columns(p, 50))).collect();
    let worker = Arc::new(DecodeWorker::spawn()?);
    let loader = ColumnarLoader::new(source).with_worker(Arc::clone(&worker));
    let session = Session::with_worker(
        EngineConfig::default().with_concurrency(2),
        Arc::new(loader),
        Some(worker),
    );

    // Plane 4 has no columns; it is skipped.
    let index = session.build_index(5).await?;
    println!("{:?}", index.stats());

    let selection = session
        .query_selection(SelectionRect::new(21.0, 1.0, 43.0, 3.0)?)
        .await?;
    for result in selection.intersecting() {
        println!("cell {} on plane {}", result.cell_id, result.plane);
    }
    Ok(())
}
