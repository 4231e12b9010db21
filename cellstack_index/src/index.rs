// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `SpatialIndex` API and generic implementation over a pluggable backend.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::backends::flatvec::FlatVec;
use crate::backends::rtree::RTree;
use crate::types::{Aabb2D, Scalar};

/// An immutable AABB index parameterized by a spatial backend.
///
/// Built once with [`SpatialIndexGeneric::bulk_load`]; a changed data set means a new index.
pub struct SpatialIndexGeneric<T: Scalar, P, B: Backend<T>> {
    entries: Vec<(Aabb2D<T>, P)>,
    backend: B,
}

impl<T, P, B> SpatialIndexGeneric<T, P, B>
where
    T: Scalar,
    B: Backend<T>,
{
    /// Bulk-load an index from `(bounds, payload)` entries.
    ///
    /// Entries with an inverted box are dropped (debug builds assert).
    pub fn bulk_load(entries: impl IntoIterator<Item = (Aabb2D<T>, P)>) -> Self {
        Self::bulk_load_with(entries, B::bulk_build)
    }

    /// Bulk-load with a custom backend constructor, e.g. to pick a node fan-out.
    ///
    /// `build` receives dense `(slot, aabb)` pairs.
    pub fn bulk_load_with(
        entries: impl IntoIterator<Item = (Aabb2D<T>, P)>,
        build: impl FnOnce(&[(usize, Aabb2D<T>)]) -> B,
    ) -> Self {
        let entries: Vec<(Aabb2D<T>, P)> = entries
            .into_iter()
            .filter(|(aabb, _)| {
                debug_assert!(!aabb.is_empty(), "inverted AABB passed to bulk_load");
                !aabb.is_empty()
            })
            .collect();
        let pairs: Vec<(usize, Aabb2D<T>)> = entries
            .iter()
            .enumerate()
            .map(|(i, (aabb, _))| (i, *aabb))
            .collect();
        let backend = build(&pairs);
        Self { entries, backend }
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of all indexed boxes.
    pub fn extent(&self) -> Option<Aabb2D<T>> {
        self.backend.extent()
    }

    /// Entries whose box contains the point.
    pub fn query_point(&self, x: T, y: T) -> impl Iterator<Item = (&Aabb2D<T>, &P)> + '_ {
        self.backend
            .query_point(x, y)
            .filter_map(|slot| self.entries.get(slot).map(|(a, p)| (a, p)))
    }

    /// Entries whose box overlaps `rect`. Broad phase only: overlap of boxes, not of shapes.
    pub fn query_rect(&self, rect: Aabb2D<T>) -> impl Iterator<Item = (&Aabb2D<T>, &P)> + '_ {
        self.backend
            .query_rect(rect)
            .filter_map(|slot| self.entries.get(slot).map(|(a, p)| (a, p)))
    }

    /// All entries in load order.
    pub fn iter(&self) -> impl Iterator<Item = (&Aabb2D<T>, &P)> + '_ {
        self.entries.iter().map(|(a, p)| (a, p))
    }
}

impl<T: Scalar, P, B: Backend<T>> Debug for SpatialIndexGeneric<T, P, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpatialIndexGeneric")
            .field("len", &self.entries.len())
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// Default index: packed R-tree backend.
pub type SpatialIndex<T, P> = SpatialIndexGeneric<T, P, RTree<T>>;

/// Linear-scan index, useful as a brute-force reference.
pub type FlatIndex<T, P> = SpatialIndexGeneric<T, P, FlatVec<T>>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sorted<'a>(it: impl Iterator<Item = (&'a Aabb2D<f64>, &'a u32)>) -> Vec<u32> {
        let mut v: Vec<u32> = it.map(|(_, p)| *p).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn bulk_load_and_query() {
        let idx: SpatialIndex<f64, u32> = SpatialIndex::bulk_load(vec![
            (Aabb2D::new(0.0, 0.0, 10.0, 10.0), 1),
            (Aabb2D::new(5.0, 5.0, 15.0, 15.0), 2),
            (Aabb2D::new(40.0, 40.0, 50.0, 50.0), 3),
        ]);
        assert_eq!(idx.len(), 3);
        assert_eq!(sorted(idx.query_point(6.0, 6.0)), vec![1, 2]);
        assert_eq!(sorted(idx.query_rect(Aabb2D::new(12.0, 12.0, 45.0, 45.0))), vec![2, 3]);
        assert_eq!(idx.extent(), Some(Aabb2D::new(0.0, 0.0, 50.0, 50.0)));
    }

    #[test]
    fn empty_index_answers_nothing() {
        let idx: SpatialIndex<f64, u32> = SpatialIndex::bulk_load(Vec::new());
        assert!(idx.is_empty());
        assert!(idx.extent().is_none());
        assert_eq!(idx.query_rect(Aabb2D::new(0.0, 0.0, 1.0, 1.0)).count(), 0);
    }

    #[test]
    fn custom_fan_out_answers_the_same() {
        let entries: Vec<_> = (0..100_i64)
            .map(|i| (Aabb2D::new(i * 3, 0, i * 3 + 2, 2), i))
            .collect();
        let wide: SpatialIndex<i64, i64> = SpatialIndex::bulk_load(entries.clone());
        let narrow: SpatialIndex<i64, i64> =
            SpatialIndex::bulk_load_with(entries, |pairs| RTree::bulk_build_with(pairs, 3));
        let q = Aabb2D::new(30, 1, 60, 1);
        let mut a: Vec<i64> = wide.query_rect(q).map(|(_, p)| *p).collect();
        let mut b: Vec<i64> = narrow.query_rect(q).map(|(_, p)| *p).collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
        assert_eq!(a, (10..=20).collect::<Vec<_>>());
    }

    #[test]
    fn payload_need_not_be_copy() {
        let idx: SpatialIndex<i64, Vec<u32>> =
            SpatialIndex::bulk_load(vec![(Aabb2D::new(0, 0, 4, 4), vec![0, 2])]);
        let hits: Vec<_> = idx.query_rect(Aabb2D::new(4, 4, 8, 8)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, &vec![0, 2]);
    }

    #[test]
    fn rtree_agrees_with_flat_scan() {
        // Deterministic pseudo-random boxes (LCG).
        let mut state = 0x2545_f491_u64;
        let mut next = || {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (state >> 33) % 1000
        };
        let mut entries = Vec::new();
        for i in 0..2000_u32 {
            let x = next() as i64;
            let y = next() as i64;
            let w = (next() % 30) as i64;
            let h = (next() % 30) as i64;
            entries.push((Aabb2D::new(x, y, x + w, y + h), i));
        }
        let rtree: SpatialIndex<i64, u32> = SpatialIndex::bulk_load(entries.clone());
        let flat: FlatIndex<i64, u32> = FlatIndex::bulk_load(entries);
        for _ in 0..50 {
            let x = next() as i64;
            let y = next() as i64;
            let q = Aabb2D::new(x, y, x + 60, y + 60);
            let mut a: Vec<u32> = rtree.query_rect(q).map(|(_, p)| *p).collect();
            let mut b: Vec<u32> = flat.query_rect(q).map(|(_, p)| *p).collect();
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b);
        }
    }
}
