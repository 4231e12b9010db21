// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine tuning knobs.

use std::time::Duration;

use crate::geometry::PlaneId;
use crate::scheduler::YieldPolicy;

/// Default number of logical workers pulling planes during a build.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default number of polygons scanned between two yield points.
pub const DEFAULT_POLYGON_BATCH: usize = 1000;

/// Default number of cells finalized between two yield points.
pub const DEFAULT_BOUNDS_CHUNK: usize = 2048;

/// Default timeout for a single plane load.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration shared by the builder, the cache and the selection engine.
///
/// ```
/// use std::time::Duration;
/// use cellstack_select::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_concurrency(4)
///     .with_load_timeout(Duration::from_secs(5))
///     .with_displayed_plane(Some(2));
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Logical workers used for the plane pass of a build, and the cap on
    /// concurrently loading planes during a query. Clamped to at least 1.
    pub concurrency: usize,
    /// Polygons scanned per unit of cooperative work.
    pub polygon_batch: usize,
    /// Cells finalized per unit of cooperative work.
    pub bounds_chunk: usize,
    /// Timeout applied to every loader call.
    pub load_timeout: Duration,
    /// How yield points hand control back.
    pub yield_policy: YieldPolicy,
    /// Plane the host currently displays; the fallback scope when no index is published.
    pub displayed_plane: Option<PlaneId>,
    /// Node fan-out of the spatial index.
    pub rtree_fan_out: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            polygon_batch: DEFAULT_POLYGON_BATCH,
            bounds_chunk: DEFAULT_BOUNDS_CHUNK,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            yield_policy: YieldPolicy::Cooperative,
            displayed_plane: None,
            rtree_fan_out: cellstack_index::backends::rtree::DEFAULT_MAX_CHILDREN,
        }
    }
}

impl EngineConfig {
    /// Set the worker pool size.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the polygon batch size.
    pub fn with_polygon_batch(mut self, batch: usize) -> Self {
        self.polygon_batch = batch.max(1);
        self
    }

    /// Set the finalize chunk size.
    pub fn with_bounds_chunk(mut self, chunk: usize) -> Self {
        self.bounds_chunk = chunk.max(1);
        self
    }

    /// Set the loader timeout.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Set the yield policy.
    pub fn with_yield_policy(mut self, policy: YieldPolicy) -> Self {
        self.yield_policy = policy;
        self
    }

    /// Set the displayed plane.
    pub fn with_displayed_plane(mut self, plane: Option<PlaneId>) -> Self {
        self.displayed_plane = plane;
        self
    }

    /// Set the spatial index fan-out.
    pub fn with_rtree_fan_out(mut self, fan_out: usize) -> Self {
        self.rtree_fan_out = fan_out.max(2);
        self
    }
}
