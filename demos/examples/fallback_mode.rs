// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Queries before the index exists.
//!
//! With a displayed plane configured, queries issued while the index is still
//! building scan that plane only and say so in their mode. Results from older
//! queries can be told apart from the latest one by their generation.
//!
//! Run:
//! - `cargo run -p cellstack_demos --example fallback_mode`

use std::sync::Arc;
use std::time::Duration;

use cellstack_select::{EngineConfig, MemoryLoader, Polygon, PolygonSet, SelectionRect, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let loader = MemoryLoader::from_sets((0..3).map(|plane| {
        PolygonSet::new(
            plane,
            vec![Polygon::from_coords(
                7,
                plane,
                &[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
            )],
        )
    }))
    .with_latency(Duration::from_millis(50));
    let config = EngineConfig::default().with_displayed_plane(Some(1));
    let session = Session::new(config, Arc::new(loader));
    let rect = SelectionRect::new(2.0, 2.0, 4.0, 4.0)?;

    let early = session.query_selection(rect).await?;
    println!("before build: {:?}, {} hits", early.mode, early.intersecting().count());

    session.build_index(3).await?;
    let late = session.query_selection(rect).await?;
    println!("after build: {:?}, {} hits", late.mode, late.intersecting().count());
    println!(
        "early current: {}, late current: {}",
        session.is_current(&early),
        session.is_current(&late)
    );
    Ok(())
}
