// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=cellstack_index --heading-base-level=0

//! Cellstack Index: an immutable, bulk-loaded 2D AABB index.
//!
//! Cellstack Index is the broad phase of cell selection.
//!
//! - Bulk-load axis-aligned bounding boxes (AABBs) with arbitrary payloads.
//! - Query by point or overlapping rectangle (closed intervals, touching counts).
//! - No incremental insert or remove: a changed data set is a new index.
//!
//! It is generic over the scalar type `T` and does not depend on any geometry crate.
//! Higher layers compute per-cell bounds and feed them here once.
//!
//! Backends are pluggable via a simple trait. The default backend is a packed
//! R-tree built with a Sort-Tile-Recursive pass; a flat linear-scan backend is kept
//! as a reference for cross-checking.
//!
//! # Example
//!
//! ```rust
//! use cellstack_index::{Aabb2D, SpatialIndex};
//!
//! let idx: SpatialIndex<f64, u32> = SpatialIndex::bulk_load([
//!     (Aabb2D::new(0.0, 0.0, 10.0, 10.0), 1),
//!     (Aabb2D::new(5.0, 5.0, 15.0, 15.0), 2),
//! ]);
//!
//! let hits: Vec<_> = idx.query_rect(Aabb2D::new(12.0, 12.0, 20.0, 20.0)).collect();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(*hits[0].1, 2);
//! ```
//!
//! ## Choosing a backend
//!
//! - `RTree` (default, [`SpatialIndex`]): packed nodes of 8 children; query cost is
//!   logarithmic in the number of entries plus the output size.
//! - `FlatVec` ([`FlatIndex`]): linear scans. Good for tiny sets and as a reference.
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for floating-point coordinates. Debug builds may assert.

#![no_std]

extern crate alloc;

pub mod backend;
pub mod backends;
pub mod index;
pub mod types;

pub use backend::Backend;
pub use backends::flatvec::FlatVec;
pub use backends::rtree::{RTree, RTreeF32, RTreeF64, RTreeI64};
pub use index::{FlatIndex, SpatialIndex, SpatialIndexGeneric};
pub use types::{Aabb2D, Scalar};
