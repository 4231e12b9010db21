// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait for spatial indexing implementations.

use alloc::boxed::Box;

use crate::types::{Aabb2D, Scalar};
use core::fmt::Debug;

/// Bulk-loaded spatial backend used by [`SpatialIndexGeneric`](crate::SpatialIndexGeneric).
///
/// Backends only ever see `(slot, aabb)` pairs; payloads live in the index.
/// A backend is built once and never mutated afterwards.
pub trait Backend<T: Scalar>: Debug {
    /// Build the structure from `(slot, aabb)` pairs. Slots are dense `0..pairs.len()`.
    fn bulk_build(pairs: &[(usize, Aabb2D<T>)]) -> Self
    where
        Self: Sized;

    /// Query slots whose AABB contains the point.
    fn query_point<'a>(&'a self, x: T, y: T) -> Box<dyn Iterator<Item = usize> + 'a>;

    /// Query slots whose AABB overlaps the rectangle (edges included).
    fn query_rect<'a>(&'a self, rect: Aabb2D<T>) -> Box<dyn Iterator<Item = usize> + 'a>;

    /// Union of all stored boxes, or `None` when empty.
    fn extent(&self) -> Option<Aabb2D<T>>;
}
