// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The published, immutable result of an index build.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cellstack_index::{Aabb2D, SpatialIndex};

use crate::geometry::{CellId, PlaneId, SelectionRect};

/// Spatial index payload: a cell and the planes it lives on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellEntry {
    /// Indexed cell.
    pub cell_id: CellId,
    /// Ascending, duplicate-free planes with a boundary of this cell.
    pub planes: Arc<[PlaneId]>,
}

/// Counters gathered while building.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Planes requested.
    pub planes_total: usize,
    /// Planes loaded with at least one polygon.
    pub planes_loaded: usize,
    /// Planes that were empty, missing, timed out or undecodable.
    pub planes_skipped: usize,
    /// Planes whose load failed in transport.
    pub planes_failed: usize,
    /// Polygons contributing to bounds.
    pub polygons_indexed: usize,
    /// Polygons with fewer than four points.
    pub polygons_degenerate: usize,
    /// Polygons with non-finite coordinates, skipped.
    pub polygons_malformed: usize,
    /// Cells in the spatial index.
    pub cells_indexed: usize,
    /// Cells whose boundaries are all degenerate: in the cell index, not in the spatial index.
    pub cells_degenerate_only: usize,
}

/// Immutable `{cell index, cell bounds, spatial index}` triple.
///
/// Never mutated once published; a reload builds and publishes a new one.
#[derive(Debug)]
pub struct IndexSnapshot {
    cell_index: BTreeMap<CellId, Arc<[PlaneId]>>,
    cell_bounds: HashMap<CellId, Aabb2D<f64>>,
    spatial: SpatialIndex<f64, CellEntry>,
    stats: BuildStats,
}

impl IndexSnapshot {
    pub(crate) fn new(
        cell_index: BTreeMap<CellId, Arc<[PlaneId]>>,
        cell_bounds: HashMap<CellId, Aabb2D<f64>>,
        spatial: SpatialIndex<f64, CellEntry>,
        stats: BuildStats,
    ) -> Self {
        Self {
            cell_index,
            cell_bounds,
            spatial,
            stats,
        }
    }

    /// Planes of `cell`, ascending.
    pub fn planes_of(&self, cell: CellId) -> Option<&[PlaneId]> {
        self.cell_index.get(&cell).map(|p| &p[..])
    }

    /// Aggregate bounds of `cell` over all of its planes.
    pub fn bounds_of(&self, cell: CellId) -> Option<Aabb2D<f64>> {
        self.cell_bounds.get(&cell).copied()
    }

    /// All cells with their planes, by ascending cell id.
    pub fn cells(&self) -> impl Iterator<Item = (CellId, &[PlaneId])> + '_ {
        self.cell_index.iter().map(|(c, p)| (*c, &p[..]))
    }

    /// Number of cells in the cell index.
    pub fn cell_count(&self) -> usize {
        self.cell_index.len()
    }

    /// The broad-phase index.
    pub fn spatial(&self) -> &SpatialIndex<f64, CellEntry> {
        &self.spatial
    }

    /// Cells whose aggregate bounds overlap `rect`.
    pub fn candidates(&self, rect: SelectionRect) -> impl Iterator<Item = &CellEntry> + '_ {
        self.spatial.query_rect(rect.to_aabb()).map(|(_, e)| e)
    }

    /// Build counters.
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }
}
