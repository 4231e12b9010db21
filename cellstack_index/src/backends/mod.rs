// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for different spatial strategies.
//!
//! - `rtree`: packed R-tree (`T: Scalar`) built with Sort-Tile-Recursive (aliases: `RTreeI64`, `RTreeF32`, `RTreeF64`).
//! - `flatvec`: flat vector with linear scans (small, simple, used as a reference).
//!
//! STR note
//! --------
//! Items are sorted by centroid x and cut into `ceil(sqrt(leaves))` vertical slices;
//! each slice is sorted by centroid y and packed into full leaves of `max_children`.
//! The same pass is repeated on node boxes until one root remains, so every level
//! except the last node of each slice is full and the tree height is
//! `ceil(log_m(n))`.

pub mod flatvec;
pub mod rtree;
