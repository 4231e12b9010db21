// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two-phase rectangle selection.
//!
//! The broad phase asks the spatial index for cells whose aggregate bounds overlap
//! the rectangle. The narrow phase loads each candidate plane once, then clips every
//! boundary of every candidate cell on it exactly. Planes are processed as
//! independent futures, at most `concurrency` at a time, and awaited together, so a
//! slow or failing plane only affects its own results.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use kurbo::Point;
use log::{debug, warn};

use crate::cache::BoundaryCache;
use crate::clip::{ClipOutcome, ClippedBoundary, clip_ring};
use crate::config::EngineConfig;
use crate::error::{EngineError, LoadError, Result};
use crate::geometry::{CellId, PlaneId, Polygon, PolygonSet, RingCheck, SelectionRect};
use crate::loader::PlaneLoader;
use crate::scheduler::Checkpoint;
use crate::snapshot::IndexSnapshot;

/// Why a result carries no clipped geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultIssue {
    /// The index lists the cell on this plane but the plane data has no boundary for it.
    NotFoundInPlane,
    /// The shapes touch but clipping produced no ring.
    EmptyClip,
    /// The plane could not be loaded.
    PlaneUnavailable(String),
}

impl fmt::Display for ResultIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFoundInPlane => f.write_str("not found in plane data"),
            Self::EmptyClip => f.write_str("clip produced no geometry"),
            Self::PlaneUnavailable(reason) => write!(f, "plane unavailable: {reason}"),
        }
    }
}

/// Outcome for one boundary of one cell on one plane.
#[derive(Clone, Debug, PartialEq)]
pub struct ClippedResult {
    /// Cell the boundary belongs to.
    pub cell_id: CellId,
    /// Plane of the boundary.
    pub plane: PlaneId,
    /// Whether the boundary overlaps the rectangle.
    pub intersects: bool,
    /// The part of the boundary inside the rectangle.
    pub clipped: Option<ClippedBoundary>,
    /// The unclipped ring, shared with the cache.
    pub original: Option<Arc<[Point]>>,
    /// Set when no geometry could be produced.
    pub issue: Option<ResultIssue>,
}

impl ClippedResult {
    fn flagged(cell_id: CellId, plane: PlaneId, issue: ResultIssue) -> Self {
        Self {
            cell_id,
            plane,
            intersects: false,
            clipped: None,
            original: None,
            issue: Some(issue),
        }
    }

    fn from_clip(polygon: &Polygon, rect: &SelectionRect) -> Self {
        let outcome = clip_ring(polygon.ring(), rect);
        let intersects = outcome.intersects();
        let (clipped, issue) = match outcome {
            ClipOutcome::Clipped(boundary) => (Some(boundary), None),
            ClipOutcome::Empty => (None, Some(ResultIssue::EmptyClip)),
            ClipOutcome::Disjoint => (None, None),
        };
        Self {
            cell_id: polygon.cell_id,
            plane: polygon.plane,
            intersects,
            clipped,
            original: Some(polygon.shared_ring()),
            issue,
        }
    }
}

/// Which path answered a query.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SelectionMode {
    /// Broad phase over the published spatial index.
    FullIndex,
    /// No index was published; only the displayed plane was scanned.
    SinglePlane {
        /// The scanned plane.
        plane: PlaneId,
    },
}

/// Answer to one rectangle query.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    /// Path that produced the results.
    pub mode: SelectionMode,
    /// Query generation, for discarding superseded answers.
    pub generation: u64,
    /// The queried rectangle.
    pub rect: SelectionRect,
    /// Results ordered by plane, then cell id.
    pub results: Vec<ClippedResult>,
}

impl Selection {
    /// Results that overlap the rectangle.
    pub fn intersecting(&self) -> impl Iterator<Item = &ClippedResult> + '_ {
        self.results.iter().filter(|r| r.intersects)
    }

    /// Results carrying an issue.
    pub fn issues(&self) -> impl Iterator<Item = &ClippedResult> + '_ {
        self.results.iter().filter(|r| r.issue.is_some())
    }

    /// True for a degraded single-plane answer.
    pub fn is_fallback(&self) -> bool {
        matches!(self.mode, SelectionMode::SinglePlane { .. })
    }
}

#[derive(Debug, Default)]
struct PlaneOutcome {
    results: Vec<ClippedResult>,
    transport_failure: Option<LoadError>,
}

/// Runs selection queries against a snapshot and a boundary cache.
pub struct SelectionEngine<'a> {
    config: &'a EngineConfig,
    cache: &'a BoundaryCache,
    loader: &'a dyn PlaneLoader,
}

impl fmt::Debug for SelectionEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionEngine")
            .field("config", self.config)
            .field("cache", self.cache)
            .finish_non_exhaustive()
    }
}

impl<'a> SelectionEngine<'a> {
    /// Engine loading missing planes through `cache` and `loader`.
    pub fn new(config: &'a EngineConfig, cache: &'a BoundaryCache, loader: &'a dyn PlaneLoader) -> Self {
        Self {
            config,
            cache,
            loader,
        }
    }

    /// Answer `rect`, through `snapshot` when one is published.
    pub async fn query(
        &self,
        snapshot: Option<&IndexSnapshot>,
        rect: SelectionRect,
        generation: u64,
    ) -> Result<Selection> {
        rect.validate()?;
        let (mode, results) = match (snapshot, self.config.displayed_plane) {
            (Some(snapshot), _) => (SelectionMode::FullIndex, self.query_indexed(snapshot, rect).await?),
            (None, Some(plane)) => (
                SelectionMode::SinglePlane { plane },
                self.query_single_plane(plane, rect).await?,
            ),
            (None, None) => return Err(EngineError::IndexUnavailable),
        };
        debug!(
            "query {generation} ({mode:?}) returned {} results",
            results.len()
        );
        Ok(Selection {
            mode,
            generation,
            rect,
            results,
        })
    }

    async fn query_indexed(&self, snapshot: &IndexSnapshot, rect: SelectionRect) -> Result<Vec<ClippedResult>> {
        let mut by_plane: BTreeMap<PlaneId, Vec<CellId>> = BTreeMap::new();
        for entry in snapshot.candidates(rect) {
            for &plane in entry.planes.iter() {
                by_plane.entry(plane).or_default().push(entry.cell_id);
            }
        }
        if by_plane.is_empty() {
            return Ok(Vec::new());
        }

        let planes = by_plane.len();
        // `buffered` keeps plane order while capping concurrent loads.
        let outcomes: Vec<PlaneOutcome> = stream::iter(by_plane)
            .map(|(plane, cells)| self.clip_plane(plane, cells, rect))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut failed = 0;
        let mut last = None;
        let mut results = Vec::new();
        for outcome in outcomes {
            if let Some(err) = outcome.transport_failure {
                failed += 1;
                last = Some(err);
            }
            results.extend(outcome.results);
        }
        if failed == planes
            && let Some(last) = last
        {
            return Err(EngineError::LoaderUnavailable { failed, last });
        }
        Ok(results)
    }

    async fn clip_plane(&self, plane: PlaneId, mut cells: Vec<CellId>, rect: SelectionRect) -> PlaneOutcome {
        cells.sort_unstable();
        let set = match self.cache.get_or_load(plane, self.loader).await {
            Ok(set) => set,
            Err(err) => {
                warn!("plane {plane} unavailable for selection: {err}");
                let reason = err.to_string();
                return PlaneOutcome {
                    results: cells
                        .into_iter()
                        .map(|cell| {
                            ClippedResult::flagged(cell, plane, ResultIssue::PlaneUnavailable(reason.clone()))
                        })
                        .collect(),
                    transport_failure: err.is_transport().then_some(err),
                };
            }
        };

        let mut checkpoint = Checkpoint::new(self.config.yield_policy, self.config.polygon_batch);
        let mut results = Vec::with_capacity(cells.len());
        for cell in cells {
            if !set.contains_cell(cell) {
                results.push(ClippedResult::flagged(cell, plane, ResultIssue::NotFoundInPlane));
                continue;
            }
            for polygon in set.polygons_of(cell) {
                if polygon.check() == RingCheck::Valid {
                    results.push(ClippedResult::from_clip(polygon, &rect));
                }
                checkpoint.tick().await;
            }
        }
        PlaneOutcome {
            results,
            transport_failure: None,
        }
    }

    async fn query_single_plane(&self, plane: PlaneId, rect: SelectionRect) -> Result<Vec<ClippedResult>> {
        let set = match self.cache.get_or_load(plane, self.loader).await {
            Ok(set) => set,
            Err(err) if err.is_transport() => {
                return Err(EngineError::LoaderUnavailable { failed: 1, last: err });
            }
            Err(err) => {
                warn!("displayed plane {plane} unavailable: {err}");
                return Ok(Vec::new());
            }
        };
        Ok(self.scan_plane(&set, rect).await)
    }

    async fn scan_plane(&self, set: &PolygonSet, rect: SelectionRect) -> Vec<ClippedResult> {
        let window = rect.to_aabb();
        let mut checkpoint = Checkpoint::new(self.config.yield_policy, self.config.polygon_batch);
        let mut results = Vec::new();
        for polygon in set.polygons() {
            checkpoint.tick().await;
            if polygon.check() != RingCheck::Valid {
                continue;
            }
            if polygon.bounds().is_some_and(|b| b.overlaps(&window)) {
                results.push(ClippedResult::from_clip(polygon, &rect));
            }
        }
        results.sort_by_key(|r| r.cell_id);
        results
    }
}
