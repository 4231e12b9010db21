// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The plane loader seam and an in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::LoadError;
use crate::geometry::{PlaneId, PolygonSet};

/// Source of decoded per-plane polygon sets.
///
/// Implementations return an empty set (or [`LoadError::NotFound`]) for a plane
/// that legitimately has no data, and [`LoadError::Transport`] when the backing
/// store cannot be reached. Callers wrap every call in a timeout.
pub trait PlaneLoader: Send + Sync {
    /// Load and decode one plane.
    fn load_plane(&self, plane: PlaneId) -> BoxFuture<'_, Result<PolygonSet, LoadError>>;
}

/// In-memory loader backed by a map of planes.
///
/// Missing planes load as empty sets. Counts calls per plane, and can inject latency
/// or transport failures, which makes it the loader of choice for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    planes: HashMap<PlaneId, PolygonSet>,
    failing: HashMap<PlaneId, String>,
    latency: Option<Duration>,
    calls: Mutex<HashMap<PlaneId, usize>>,
    total_calls: AtomicUsize,
}

impl MemoryLoader {
    /// Empty loader: every plane loads as an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader serving the given sets, keyed by their plane.
    pub fn from_sets(sets: impl IntoIterator<Item = PolygonSet>) -> Self {
        let mut loader = Self::new();
        for set in sets {
            loader.insert_plane(set);
        }
        loader
    }

    /// Add or replace a plane.
    pub fn insert_plane(&mut self, set: PolygonSet) {
        self.planes.insert(set.plane(), set);
    }

    /// Make every load of `plane` fail with a transport error.
    pub fn fail_plane(&mut self, plane: PlaneId, reason: impl Into<String>) {
        self.failing.insert(plane, reason.into());
    }

    /// Delay every load by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of loads requested for `plane`.
    pub fn calls(&self, plane: PlaneId) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(&plane).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of loads requested over all planes.
    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    fn record_call(&self, plane: PlaneId) {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(plane).or_default() += 1;
        }
    }
}

impl PlaneLoader for MemoryLoader {
    fn load_plane(&self, plane: PlaneId) -> BoxFuture<'_, Result<PolygonSet, LoadError>> {
        self.record_call(plane);
        async move {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if let Some(reason) = self.failing.get(&plane) {
                return Err(LoadError::Transport {
                    plane,
                    reason: reason.clone(),
                });
            }
            Ok(self
                .planes
                .get(&plane)
                .cloned()
                .unwrap_or_else(|| PolygonSet::empty(plane)))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;

    #[tokio::test]
    async fn missing_plane_is_empty_not_an_error() {
        let loader = MemoryLoader::new();
        let set = loader.load_plane(4).await.unwrap();
        assert_eq!(set.plane(), 4);
        assert!(set.is_empty());
        assert_eq!(loader.calls(4), 1);
    }

    #[tokio::test]
    async fn failing_plane_reports_transport() {
        let mut loader = MemoryLoader::from_sets([PolygonSet::new(
            0,
            vec![Polygon::from_coords(1, 0, &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]])],
        )]);
        loader.fail_plane(1, "connection reset");
        assert_eq!(loader.load_plane(0).await.unwrap().len(), 1);
        let err = loader.load_plane(1).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(loader.total_calls(), 2);
    }
}
