// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packed R-tree backend generic over scalar `T: Scalar`, built with an STR pass.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::{Aabb2D, Scalar};

/// Default fan-out of packed nodes.
pub const DEFAULT_MAX_CHILDREN: usize = 8;

/// Immutable R-tree packed with Sort-Tile-Recursive bulk loading.
pub struct RTree<T: Scalar> {
    max_children: usize,
    root: Option<NodeIdx>,
    arena: Vec<RNode<T>>,
    len: usize,
}

#[derive(Clone)]
struct RNode<T: Scalar> {
    bbox: Aabb2D<T>,
    leaf: bool,
    children: Vec<RChild<T>>,
}

#[derive(Clone, Copy)]
enum RChild<T: Scalar> {
    Node(NodeIdx),
    Item { slot: usize, bbox: Aabb2D<T> },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(usize);

impl NodeIdx {
    const fn new(i: usize) -> Self {
        Self(i)
    }

    const fn get(self) -> usize {
        self.0
    }
}

impl<T: Scalar> Default for RTree<T> {
    fn default() -> Self {
        Self {
            max_children: DEFAULT_MAX_CHILDREN,
            root: None,
            arena: Vec::new(),
            len: 0,
        }
    }
}

impl<T: Scalar> RTree<T> {
    #[inline]
    fn ceil_div(a: usize, b: usize) -> usize {
        a.div_ceil(b)
    }

    /// Smallest `g` with `g * g >= n`: number of vertical slices in an STR pass.
    fn slice_count(n: usize) -> usize {
        let mut g = 1_usize;
        while g * g < n {
            g += 1;
        }
        g
    }

    fn cmp_centroid_x(a: &Aabb2D<T>, b: &Aabb2D<T>) -> Ordering {
        a.center().0.partial_cmp(&b.center().0).unwrap_or(Ordering::Equal)
    }

    fn cmp_centroid_y(a: &Aabb2D<T>, b: &Aabb2D<T>) -> Ordering {
        a.center().1.partial_cmp(&b.center().1).unwrap_or(Ordering::Equal)
    }

    /// Build with a custom node fan-out. `max_children` is clamped to at least 2.
    pub fn bulk_build_with(pairs: &[(usize, Aabb2D<T>)], max_children: usize) -> Self {
        let max_children = max_children.max(2);
        let mut items = pairs.to_vec();
        let mut arena: Vec<RNode<T>> = Vec::new();
        let root = Self::bulk_build_nodes(&mut arena, &mut items, max_children);
        Self {
            max_children,
            root,
            arena,
            len: pairs.len(),
        }
    }

    /// STR bulk builder: packs leaves from the items, then promotes levels until one root remains.
    fn bulk_build_nodes(
        arena: &mut Vec<RNode<T>>,
        items: &mut [(usize, Aabb2D<T>)],
        max_children: usize,
    ) -> Option<NodeIdx> {
        if items.is_empty() {
            return None;
        }

        // Leaf level
        let n = items.len();
        let gx = Self::slice_count(Self::ceil_div(n, max_children));
        items.sort_by(|a, b| Self::cmp_centroid_x(&a.1, &b.1));
        let slice_size = Self::ceil_div(n, gx);
        let mut level: Vec<usize> = Vec::new();
        for slice in items.chunks_mut(slice_size) {
            slice.sort_by(|a, b| Self::cmp_centroid_y(&a.1, &b.1));
            for chunk in slice.chunks(max_children) {
                let children: Vec<RChild<T>> = chunk
                    .iter()
                    .map(|&(slot, bbox)| RChild::Item { slot, bbox })
                    .collect();
                level.extend(Self::push_node(arena, children, true));
            }
        }

        // Promote until a single root remains
        while level.len() > 1 {
            let n_nodes = level.len();
            let gx = Self::slice_count(Self::ceil_div(n_nodes, max_children));
            level.sort_by(|&a, &b| Self::cmp_centroid_x(&arena[a].bbox, &arena[b].bbox));
            let slice_size = Self::ceil_div(n_nodes, gx);
            let mut next: Vec<usize> = Vec::with_capacity(Self::ceil_div(n_nodes, max_children));
            for slice in level.chunks_mut(slice_size) {
                slice.sort_by(|&a, &b| Self::cmp_centroid_y(&arena[a].bbox, &arena[b].bbox));
                for chunk in slice.chunks(max_children) {
                    let children: Vec<RChild<T>> = chunk
                        .iter()
                        .map(|&i| RChild::Node(NodeIdx::new(i)))
                        .collect();
                    next.extend(Self::push_node(arena, children, false));
                }
            }
            level = next;
        }

        level.first().map(|&i| NodeIdx::new(i))
    }

    /// Append a node over `children`; `None` if there are none.
    fn push_node(arena: &mut Vec<RNode<T>>, children: Vec<RChild<T>>, leaf: bool) -> Option<usize> {
        let bbox = Self::node_bbox(arena, &children)?;
        let idx = arena.len();
        arena.push(RNode {
            bbox,
            leaf,
            children,
        });
        Some(idx)
    }

    fn node_bbox(arena: &[RNode<T>], children: &[RChild<T>]) -> Option<Aabb2D<T>> {
        let bbox_of = |c: &RChild<T>| match c {
            RChild::Node(i) => arena[i.get()].bbox,
            RChild::Item { bbox, .. } => *bbox,
        };
        children
            .iter()
            .map(bbox_of)
            .reduce(|acc, b| acc.union(&b))
    }

    /// Height of the tree (a single leaf root has depth 1). Zero when empty.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cur = self.root;
        while let Some(i) = cur {
            depth += 1;
            let node = &self.arena[i.get()];
            cur = if node.leaf {
                None
            } else {
                node.children.iter().find_map(|c| match c {
                    RChild::Node(n) => Some(*n),
                    RChild::Item { .. } => None,
                })
            };
        }
        depth
    }

    fn collect_overlapping(&self, probe: Aabb2D<T>) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(root_idx) = self.root else {
            return out;
        };
        let mut stack = vec![root_idx];
        while let Some(i) = stack.pop() {
            let n = &self.arena[i.get()];
            if !n.bbox.overlaps(&probe) {
                continue;
            }
            for c in &n.children {
                match c {
                    RChild::Item { slot, bbox } => {
                        if bbox.overlaps(&probe) {
                            out.push(*slot);
                        }
                    }
                    RChild::Node(ci) => stack.push(*ci),
                }
            }
        }
        out
    }
}

impl<T: Scalar> Backend<T> for RTree<T> {
    fn bulk_build(pairs: &[(usize, Aabb2D<T>)]) -> Self {
        Self::bulk_build_with(pairs, DEFAULT_MAX_CHILDREN)
    }

    fn query_point<'a>(&'a self, x: T, y: T) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(self.collect_overlapping(Aabb2D::from_point(x, y)).into_iter())
    }

    fn query_rect<'a>(&'a self, rect: Aabb2D<T>) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(self.collect_overlapping(rect).into_iter())
    }

    fn extent(&self) -> Option<Aabb2D<T>> {
        self.root.map(|i| self.arena[i.get()].bbox)
    }
}

impl<T: Scalar> Debug for RTree<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTree")
            .field("max_children", &self.max_children)
            .field("arena_nodes", &self.arena.len())
            .field("len", &self.len)
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

/// R-tree with i64 coordinates.
pub type RTreeI64 = RTree<i64>;

/// R-tree with f32 coordinates.
pub type RTreeF32 = RTree<f32>;

/// R-tree with f64 coordinates.
pub type RTreeF64 = RTree<f64>;
