// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Index builder: walks every plane once and produces an [`IndexSnapshot`].
//!
//! The plane pass runs on a bounded pool of logical workers pulling plane ids from a
//! shared counter, so planes complete in any order. Each plane is reduced to a
//! [`PlaneSummary`] (distinct cells plus their bounds on that plane) and merged into
//! a shared accumulator. The finalize pass sorts plane lists, then bulk-loads the
//! spatial index, yielding every `bounds_chunk` cells.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use cellstack_index::{Aabb2D, RTree, SpatialIndex};
use log::{debug, info, warn};

use crate::cache::BoundaryCache;
use crate::config::EngineConfig;
use crate::error::{EngineError, LoadError, Result};
use crate::geometry::{CellId, PlaneId, Polygon, PolygonSet, RingCheck};
use crate::loader::PlaneLoader;
use crate::scheduler::{Checkpoint, run_pool};
use crate::snapshot::{BuildStats, CellEntry, IndexSnapshot};
use crate::worker::DecodeWorker;

/// Distinct cells of one plane with their bounds on that plane.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaneSummary {
    /// Summarized plane.
    pub plane: PlaneId,
    /// One entry per distinct cell, ascending by cell id. Bounds are `None` when
    /// every polygon of the cell on this plane is degenerate.
    pub cells: Vec<(CellId, Option<Aabb2D<f64>>)>,
    /// Polygons that contributed to bounds.
    pub polygons_indexed: usize,
    /// Polygons with too few points.
    pub polygons_degenerate: usize,
    /// Polygons with non-finite coordinates.
    pub polygons_malformed: usize,
}

/// Incremental [`PlaneSummary`] construction.
#[derive(Debug)]
pub(crate) struct PlaneSummarizer {
    plane: PlaneId,
    cells: HashMap<CellId, Option<Aabb2D<f64>>>,
    indexed: usize,
    degenerate: usize,
    malformed: usize,
}

impl PlaneSummarizer {
    pub(crate) fn new(plane: PlaneId) -> Self {
        Self {
            plane,
            cells: HashMap::new(),
            indexed: 0,
            degenerate: 0,
            malformed: 0,
        }
    }

    pub(crate) fn push(&mut self, polygon: &Polygon) {
        match polygon.check() {
            RingCheck::Malformed => {
                warn!(
                    "skipping malformed boundary of cell {} on plane {}",
                    polygon.cell_id, self.plane
                );
                self.malformed += 1;
            }
            RingCheck::Degenerate => {
                debug!(
                    "cell {} on plane {} has a degenerate ring ({} points)",
                    polygon.cell_id,
                    self.plane,
                    polygon.ring().len()
                );
                self.degenerate += 1;
                self.cells.entry(polygon.cell_id).or_insert(None);
            }
            RingCheck::Valid => {
                self.indexed += 1;
                let slot = self.cells.entry(polygon.cell_id).or_insert(None);
                if let Some(bounds) = polygon.bounds() {
                    *slot = Some(match slot.take() {
                        Some(acc) => acc.union(&bounds),
                        None => bounds,
                    });
                }
            }
        }
    }

    pub(crate) fn finish(self) -> PlaneSummary {
        let mut cells: Vec<_> = self.cells.into_iter().collect();
        cells.sort_unstable_by_key(|(cell, _)| *cell);
        PlaneSummary {
            plane: self.plane,
            cells,
            polygons_indexed: self.indexed,
            polygons_degenerate: self.degenerate,
            polygons_malformed: self.malformed,
        }
    }
}

/// Summarize a plane in one go. This is what the decode worker runs.
pub fn summarize_plane(set: &PolygonSet) -> PlaneSummary {
    let mut summarizer = PlaneSummarizer::new(set.plane());
    for polygon in set.polygons() {
        summarizer.push(polygon);
    }
    summarizer.finish()
}

/// Summarize a plane on the orchestration thread, yielding between polygon batches.
async fn summarize_plane_cooperative(set: &PolygonSet, config: &EngineConfig) -> PlaneSummary {
    let mut summarizer = PlaneSummarizer::new(set.plane());
    let mut checkpoint = Checkpoint::new(config.yield_policy, config.polygon_batch);
    for polygon in set.polygons() {
        summarizer.push(polygon);
        checkpoint.tick().await;
    }
    summarizer.finish()
}

#[derive(Debug, Default)]
struct Accumulator {
    membership: HashMap<CellId, Vec<PlaneId>>,
    bounds: HashMap<CellId, Aabb2D<f64>>,
    stats: BuildStats,
    last_transport: Option<LoadError>,
}

impl Accumulator {
    fn merge(&mut self, summary: PlaneSummary) {
        self.stats.planes_loaded += 1;
        self.stats.polygons_indexed += summary.polygons_indexed;
        self.stats.polygons_degenerate += summary.polygons_degenerate;
        self.stats.polygons_malformed += summary.polygons_malformed;
        for (cell, bounds) in summary.cells {
            self.membership.entry(cell).or_default().push(summary.plane);
            if let Some(b) = bounds {
                self.bounds
                    .entry(cell)
                    .and_modify(|acc| *acc = acc.union(&b))
                    .or_insert(b);
            }
        }
    }
}

/// Builds an [`IndexSnapshot`] from every plane reachable through a loader.
pub struct IndexBuilder<'a> {
    config: &'a EngineConfig,
    cache: &'a BoundaryCache,
    loader: &'a dyn PlaneLoader,
    worker: Option<&'a DecodeWorker>,
}

impl core::fmt::Debug for IndexBuilder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IndexBuilder")
            .field("config", self.config)
            .field("cache", self.cache)
            .field("worker", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> IndexBuilder<'a> {
    /// Builder loading planes through `cache` and `loader`.
    pub fn new(config: &'a EngineConfig, cache: &'a BoundaryCache, loader: &'a dyn PlaneLoader) -> Self {
        Self {
            config,
            cache,
            loader,
            worker: None,
        }
    }

    /// Offload per-plane summaries to `worker`.
    pub fn with_worker(mut self, worker: Option<&'a DecodeWorker>) -> Self {
        self.worker = worker;
        self
    }

    /// Run the plane pass over `0..total_planes`, then finalize.
    ///
    /// Missing, empty, timed-out and undecodable planes are skipped. The build is
    /// rejected only when every plane failed in transport.
    pub async fn build(&self, total_planes: u32) -> Result<IndexSnapshot> {
        if total_planes == 0 {
            return Err(EngineError::InvalidPlaneCount);
        }
        info!(
            "building cell index over {total_planes} planes with {} workers",
            self.config.concurrency
        );
        let acc = Mutex::new(Accumulator::default());
        let acc_ref = &acc;
        run_pool(
            total_planes as usize,
            self.config.concurrency,
            self.config.yield_policy,
            |i| async move {
                if let Ok(plane) = PlaneId::try_from(i) {
                    self.process_plane(plane, acc_ref).await;
                }
            },
        )
        .await;

        let mut acc = acc.into_inner().unwrap_or_else(PoisonError::into_inner);
        acc.stats.planes_total = total_planes as usize;
        if acc.stats.planes_failed == acc.stats.planes_total
            && let Some(last) = acc.last_transport.take()
        {
            warn!("every plane load failed, giving up: {last}");
            return Err(EngineError::LoaderUnavailable {
                failed: acc.stats.planes_failed,
                last,
            });
        }
        Ok(self.finalize(acc).await)
    }

    async fn process_plane(&self, plane: PlaneId, acc: &Mutex<Accumulator>) {
        match self.cache.get_or_load(plane, self.loader).await {
            Ok(set) if set.is_empty() => {
                debug!("plane {plane} is empty, skipping");
                lock(acc).stats.planes_skipped += 1;
            }
            Ok(set) => {
                let summary = self.summarize(set).await;
                debug!(
                    "plane {plane}: {} cells, {} polygons",
                    summary.cells.len(),
                    summary.polygons_indexed
                );
                lock(acc).merge(summary);
            }
            Err(err) if err.is_transport() => {
                warn!("plane {plane} failed to load: {err}");
                let mut acc = lock(acc);
                acc.stats.planes_failed += 1;
                acc.last_transport = Some(err);
            }
            Err(err) => {
                warn!("skipping plane {plane}: {err}");
                lock(acc).stats.planes_skipped += 1;
            }
        }
    }

    async fn summarize(&self, set: Arc<PolygonSet>) -> PlaneSummary {
        if let Some(worker) = self.worker {
            match worker.summarize(Arc::clone(&set)).await {
                Ok(summary) => return summary,
                Err(err) => warn!(
                    "worker could not summarize plane {}, summarizing inline: {err}",
                    set.plane()
                ),
            }
        }
        summarize_plane_cooperative(&set, self.config).await
    }

    async fn finalize(&self, acc: Accumulator) -> IndexSnapshot {
        let Accumulator {
            membership,
            bounds,
            mut stats,
            ..
        } = acc;
        let mut cells: Vec<(CellId, Vec<PlaneId>)> = membership.into_iter().collect();
        cells.sort_unstable_by_key(|(cell, _)| *cell);

        let mut checkpoint = Checkpoint::new(self.config.yield_policy, self.config.bounds_chunk);
        let mut cell_index: BTreeMap<CellId, Arc<[PlaneId]>> = BTreeMap::new();
        let mut entries: Vec<(Aabb2D<f64>, CellEntry)> = Vec::with_capacity(bounds.len());
        for (cell, mut planes) in cells {
            planes.sort_unstable();
            planes.dedup();
            let planes: Arc<[PlaneId]> = planes.into();
            match bounds.get(&cell) {
                Some(b) => entries.push((
                    *b,
                    CellEntry {
                        cell_id: cell,
                        planes: Arc::clone(&planes),
                    },
                )),
                None => stats.cells_degenerate_only += 1,
            }
            cell_index.insert(cell, planes);
            checkpoint.tick().await;
        }
        stats.cells_indexed = entries.len();

        let fan_out = self.config.rtree_fan_out;
        let spatial =
            SpatialIndex::bulk_load_with(entries, |pairs| RTree::bulk_build_with(pairs, fan_out));
        info!(
            "cell index ready: {} cells ({} spatial, {} degenerate only) from {}/{} planes, {} skipped, {} failed",
            cell_index.len(),
            stats.cells_indexed,
            stats.cells_degenerate_only,
            stats.planes_loaded,
            stats.planes_total,
            stats.planes_skipped,
            stats.planes_failed,
        );
        IndexSnapshot::new(cell_index, bounds, spatial, stats)
    }
}

fn lock(acc: &Mutex<Accumulator>) -> std::sync::MutexGuard<'_, Accumulator> {
    acc.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use kurbo::Point;
    use proptest::prelude::*;
    use std::time::Duration;

    fn square(cell: CellId, plane: PlaneId, x: f64, y: f64, size: f64) -> Polygon {
        Polygon::from_coords(
            cell,
            plane,
            &[[x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]],
        )
    }

    async fn build_with(loader: &MemoryLoader, planes: u32) -> Result<IndexSnapshot> {
        let config = EngineConfig::default();
        let cache = BoundaryCache::new(Duration::from_secs(1));
        IndexBuilder::new(&config, &cache, loader).build(planes).await
    }

    #[tokio::test]
    async fn three_plane_scenario() {
        let loader = MemoryLoader::from_sets([
            PolygonSet::new(0, vec![square(1, 0, 0.0, 0.0, 10.0)]),
            PolygonSet::new(1, vec![square(1, 1, 5.0, 5.0, 10.0)]),
            PolygonSet::new(2, vec![square(2, 2, 50.0, 50.0, 1.0)]),
        ]);
        let snap = build_with(&loader, 3).await.unwrap();
        assert_eq!(snap.planes_of(1), Some(&[0, 1][..]));
        assert_eq!(snap.planes_of(2), Some(&[2][..]));
        assert_eq!(snap.bounds_of(1), Some(Aabb2D::new(0.0, 0.0, 15.0, 15.0)));
        assert_eq!(snap.stats().planes_loaded, 3);
        assert_eq!(snap.spatial().len(), 2);
    }

    #[tokio::test]
    async fn degenerate_only_cells_stay_out_of_the_spatial_index() {
        let loader = MemoryLoader::from_sets([PolygonSet::new(
            0,
            vec![
                square(1, 0, 0.0, 0.0, 1.0),
                Polygon::from_coords(9, 0, &[[3.0, 3.0], [4.0, 4.0]]),
                // Three pairs, not closed: degenerate, not silently completed.
                Polygon::from_coords(5, 0, &[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0]]),
                Polygon::from_coords(
                    7,
                    0,
                    &[[0.0, 0.0], [f64::INFINITY, 0.0], [1.0, 1.0], [0.0, 0.0]],
                ),
            ],
        )]);
        let snap = build_with(&loader, 1).await.unwrap();
        assert_eq!(snap.planes_of(9), Some(&[0][..]));
        assert!(snap.bounds_of(9).is_none());
        assert_eq!(snap.planes_of(5), Some(&[0][..]));
        assert!(snap.bounds_of(5).is_none());
        assert!(snap.planes_of(7).is_none());
        assert_eq!(snap.spatial().len(), 1);
        let stats = snap.stats();
        assert_eq!(stats.cells_degenerate_only, 2);
        assert_eq!(stats.polygons_malformed, 1);
        assert_eq!(stats.polygons_degenerate, 2);
        assert_eq!(stats.cells_indexed, 1);
    }

    #[tokio::test]
    async fn missing_and_failing_planes_are_skipped() {
        let mut loader = MemoryLoader::from_sets([PolygonSet::new(0, vec![square(1, 0, 0.0, 0.0, 1.0)])]);
        loader.fail_plane(2, "reset by peer");
        let snap = build_with(&loader, 4).await.unwrap();
        let stats = snap.stats();
        assert_eq!(stats.planes_loaded, 1);
        assert_eq!(stats.planes_skipped, 2);
        assert_eq!(stats.planes_failed, 1);
        assert_eq!(snap.cell_count(), 1);
    }

    #[tokio::test]
    async fn total_transport_failure_rejects_the_build() {
        let mut loader = MemoryLoader::new();
        loader.fail_plane(0, "down");
        loader.fail_plane(1, "down");
        let err = build_with(&loader, 2).await.unwrap_err();
        assert!(matches!(err, EngineError::LoaderUnavailable { failed: 2, .. }));
        assert_eq!(build_with(&MemoryLoader::new(), 0).await.unwrap_err(), EngineError::InvalidPlaneCount);
    }

    #[tokio::test]
    async fn stopped_worker_falls_back_to_inline_summaries() {
        let loader = MemoryLoader::from_sets([
            PolygonSet::new(0, vec![square(1, 0, 0.0, 0.0, 10.0)]),
            PolygonSet::new(1, vec![square(1, 1, 5.0, 5.0, 10.0), square(2, 1, 30.0, 30.0, 2.0)]),
        ]);
        let inline = build_with(&loader, 2).await.unwrap();

        let config = EngineConfig::default();
        let cache = BoundaryCache::new(Duration::from_secs(1));
        let worker = DecodeWorker::stopped();
        let fallback = IndexBuilder::new(&config, &cache, &loader)
            .with_worker(Some(&worker))
            .build(2)
            .await
            .unwrap();
        for cell in [1, 2] {
            assert_eq!(fallback.planes_of(cell), inline.planes_of(cell));
            assert_eq!(fallback.bounds_of(cell), inline.bounds_of(cell));
        }
        assert_eq!(fallback.bounds_of(1), Some(Aabb2D::new(0.0, 0.0, 15.0, 15.0)));
        assert_eq!(fallback.stats().planes_loaded, 2);
    }

    #[test]
    fn summary_merges_multiple_rings_of_one_cell() {
        let set = PolygonSet::new(
            4,
            vec![square(3, 4, 0.0, 0.0, 2.0), square(3, 4, 5.0, -1.0, 1.0), square(1, 4, 9.0, 9.0, 1.0)],
        );
        let summary = summarize_plane(&set);
        assert_eq!(summary.plane, 4);
        assert_eq!(
            summary.cells,
            vec![
                (1, Some(Aabb2D::new(9.0, 9.0, 10.0, 10.0))),
                (3, Some(Aabb2D::new(0.0, -1.0, 6.0, 2.0))),
            ]
        );
        assert_eq!(summary.polygons_indexed, 3);
    }

    /// A cell shape on one plane: a jittered polygon around a center.
    fn blob(cell: CellId, plane: PlaneId, cx: f64, cy: f64, r: f64, n: usize) -> Polygon {
        let pts = (0..n).map(|k| {
            let a = core::f64::consts::TAU * (k as f64) / (n as f64);
            let rr = r * (1.0 + 0.3 * ((k * 7 % 5) as f64) / 5.0);
            Point::new(cx + rr * a.cos(), cy + rr * a.sin())
        });
        Polygon::new(cell, plane, pts)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn plane_lists_and_bounds_are_exact(
            shapes in prop::collection::vec(
                (0_i64..12, 0_u32..6, -100.0_f64..100.0, -100.0_f64..100.0, 0.5_f64..20.0, 4_usize..12),
                1..60,
            )
        ) {
            let mut by_plane: HashMap<PlaneId, Vec<Polygon>> = HashMap::new();
            let mut expected_planes: BTreeMap<CellId, Vec<PlaneId>> = BTreeMap::new();
            let mut expected_bounds: HashMap<CellId, Aabb2D<f64>> = HashMap::new();
            for &(cell, plane, cx, cy, r, n) in &shapes {
                let poly = blob(cell, plane, cx, cy, r, n);
                let b = poly.bounds().unwrap();
                expected_bounds.entry(cell).and_modify(|acc| *acc = acc.union(&b)).or_insert(b);
                expected_planes.entry(cell).or_default().push(plane);
                by_plane.entry(plane).or_default().push(poly);
            }
            let loader = MemoryLoader::from_sets(
                by_plane.into_iter().map(|(plane, polys)| PolygonSet::new(plane, polys)),
            );
            let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
            let snap = rt.block_on(build_with(&loader, 6)).unwrap();

            for (cell, mut planes) in expected_planes {
                planes.sort_unstable();
                planes.dedup();
                let got = snap.planes_of(cell).unwrap();
                prop_assert!(got.windows(2).all(|w| w[0] < w[1]));
                prop_assert_eq!(got, &planes[..]);
                prop_assert_eq!(snap.bounds_of(cell), expected_bounds.get(&cell).copied());
            }
        }
    }
}
