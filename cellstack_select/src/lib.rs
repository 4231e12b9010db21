// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=cellstack_select --heading-base-level=0

//! Cellstack Select: cross-plane cell selection over a stack of polygon planes.
//!
//! A stack is a sequence of 2D planes. Each plane holds closed polygon boundaries,
//! each labelled with the id of the cell it belongs to; one cell usually spans
//! several planes. Given a rectangle, this crate answers: which cells overlap it,
//! on which planes, and what exactly lies inside it.
//!
//! - [`IndexBuilder`] walks every plane once through a [`PlaneLoader`] and records,
//!   per cell, the sorted planes it lives on and its bounds over all of them.
//! - The bounds go into a packed R-tree from [`cellstack_index`] (the broad phase).
//! - [`SelectionEngine`] loads only the candidate planes and clips every candidate
//!   boundary exactly against the rectangle (the narrow phase). A concave boundary
//!   split by the rectangle keeps every piece.
//!
//! [`Session`] is the entry point. It owns the loader, the [`BoundaryCache`] and the
//! published [`IndexSnapshot`], shares one build between concurrent callers and
//! falls back to scanning the displayed plane while no index is published.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cellstack_select::{EngineConfig, MemoryLoader, Polygon, PolygonSet, SelectionRect, Session};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let square = |plane, dx| {
//!     Polygon::from_coords(1, plane, &[[dx, dx], [dx + 10.0, dx], [dx + 10.0, dx + 10.0], [dx, dx + 10.0]])
//! };
//! let loader = MemoryLoader::from_sets([
//!     PolygonSet::new(0, vec![square(0, 0.0)]),
//!     PolygonSet::new(1, vec![square(1, 5.0)]),
//! ]);
//! let session = Session::new(EngineConfig::default(), Arc::new(loader));
//!
//! let index = session.build_index(3).await.unwrap();
//! assert_eq!(index.planes_of(1), Some(&[0, 1][..]));
//!
//! let rect = SelectionRect::new(4.0, 4.0, 6.0, 6.0).unwrap();
//! let selection = session.query_selection(rect).await.unwrap();
//! assert_eq!(selection.intersecting().count(), 2);
//! # });
//! ```
//!
//! ## Concurrency
//!
//! All orchestration runs cooperatively on the caller's task: the build pulls planes
//! from a shared counter with a bounded number of logical workers and yields
//! between units of work (see [`YieldPolicy`]). Decoding and summarizing can be moved
//! to a [`DecodeWorker`] thread, reached only through messages.

pub mod builder;
pub mod cache;
pub mod clip;
pub mod columnar;
pub mod config;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod scheduler;
pub mod selection;
pub mod session;
pub mod snapshot;
pub mod worker;

pub use builder::{IndexBuilder, PlaneSummary, summarize_plane};
pub use cache::BoundaryCache;
pub use clip::{ClipOutcome, ClippedBoundary, clip_ring, ring_area};
pub use columnar::{ColumnSource, ColumnarLoader, PlaneColumns};
pub use config::EngineConfig;
pub use error::{EngineError, LoadError, Result};
pub use geometry::{CellId, PlaneId, Polygon, PolygonSet, Ring, RingCheck, SelectionRect};
pub use loader::{MemoryLoader, PlaneLoader};
pub use scheduler::YieldPolicy;
pub use selection::{ClippedResult, ResultIssue, Selection, SelectionEngine, SelectionMode};
pub use session::Session;
pub use snapshot::{BuildStats, CellEntry, IndexSnapshot};
pub use worker::DecodeWorker;
