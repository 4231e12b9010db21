// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat vector backend with linear scans. Small and simple; also the reference
//! answer when cross-checking the R-tree.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::{Aabb2D, Scalar};

/// Flat vector backend with linear scans.
pub struct FlatVec<T: Scalar> {
    entries: Vec<Aabb2D<T>>,
}

impl<T: Scalar> Default for FlatVec<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Scalar> Debug for FlatVec<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlatVec")
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<T: Scalar> Backend<T> for FlatVec<T> {
    fn bulk_build(pairs: &[(usize, Aabb2D<T>)]) -> Self {
        let mut entries: Vec<Option<Aabb2D<T>>> = Vec::with_capacity(pairs.len());
        for &(slot, aabb) in pairs {
            if entries.len() <= slot {
                entries.resize_with(slot + 1, || None);
            }
            entries[slot] = Some(aabb);
        }
        debug_assert!(entries.iter().all(Option::is_some), "slots must be dense");
        Self {
            entries: entries.into_iter().flatten().collect(),
        }
    }

    fn query_point<'a>(&'a self, x: T, y: T) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(
            self.entries
                .iter()
                .enumerate()
                .filter(move |(_, a)| a.contains_point(x, y))
                .map(|(i, _)| i),
        )
    }

    fn query_rect<'a>(&'a self, rect: Aabb2D<T>) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(
            self.entries
                .iter()
                .enumerate()
                .filter(move |(_, a)| a.overlaps(&rect))
                .map(|(i, _)| i),
        )
    }

    fn extent(&self) -> Option<Aabb2D<T>> {
        let mut it = self.entries.iter();
        let first = *it.next()?;
        Some(it.fold(first, |acc, b| acc.union(b)))
    }
}
