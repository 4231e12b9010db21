// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Boundary cache: plane id to decoded polygon set, populated lazily.
//!
//! Each plane owns a `OnceCell` slot. Concurrent callers for the same plane share
//! one loader call; a reader sees either nothing or the complete set. A failed or
//! cancelled load leaves the slot empty for a later retry. Entries are never evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::sync::OnceCell;

use crate::error::LoadError;
use crate::geometry::{PlaneId, PolygonSet};
use crate::loader::PlaneLoader;

type Slot = Arc<OnceCell<Arc<PolygonSet>>>;

/// Shared, read-mostly map of loaded planes.
#[derive(Debug)]
pub struct BoundaryCache {
    slots: Mutex<HashMap<PlaneId, Slot>>,
    load_timeout: Duration,
}

impl BoundaryCache {
    /// Empty cache whose loads time out after `load_timeout`.
    pub fn new(load_timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            load_timeout,
        }
    }

    fn slot(&self, plane: PlaneId) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(plane).or_default())
    }

    /// Cached set for `plane`, without loading.
    pub fn get(&self, plane: PlaneId) -> Option<Arc<PolygonSet>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(&plane).and_then(|s| s.get().cloned())
    }

    /// Cached set for `plane`, loading it through `loader` on a miss.
    pub async fn get_or_load(
        &self,
        plane: PlaneId,
        loader: &dyn PlaneLoader,
    ) -> Result<Arc<PolygonSet>, LoadError> {
        let slot = self.slot(plane);
        let set = slot
            .get_or_try_init(|| async {
                debug!("loading plane {plane}");
                let set = tokio::time::timeout(self.load_timeout, loader.load_plane(plane))
                    .await
                    .map_err(|_| LoadError::TimedOut {
                        plane,
                        after: self.load_timeout,
                    })??;
                if set.plane() != plane {
                    return Err(LoadError::Decode {
                        plane,
                        reason: format!("loader returned plane {}", set.plane()),
                    });
                }
                debug!("plane {plane} loaded with {} polygons", set.len());
                Ok::<_, LoadError>(Arc::new(set))
            })
            .await?;
        Ok(Arc::clone(set))
    }

    /// Number of planes currently loaded.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|s| s.initialized()).count()
    }

    /// True if no plane is loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::loader::MemoryLoader;

    fn loader() -> MemoryLoader {
        MemoryLoader::from_sets([PolygonSet::new(
            0,
            vec![Polygon::from_coords(
                1,
                0,
                &[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
            )],
        )])
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_call() {
        let loader = loader().with_latency(Duration::from_millis(5));
        let cache = BoundaryCache::new(Duration::from_secs(1));
        let (a, b, c) = tokio::join!(
            cache.get_or_load(0, &loader),
            cache.get_or_load(0, &loader),
            cache.get_or_load(0, &loader),
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(c.unwrap().len(), 1);
        assert_eq!(loader.calls(0), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(0).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_loads_time_out_and_stay_empty() {
        let loader = loader().with_latency(Duration::from_secs(10));
        let cache = BoundaryCache::new(Duration::from_millis(100));
        let err = cache.get_or_load(0, &loader).await.unwrap_err();
        assert!(matches!(err, LoadError::TimedOut { plane: 0, .. }));
        assert!(cache.get(0).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn failed_loads_are_retried() {
        let mut failing = loader();
        failing.fail_plane(0, "offline");
        let cache = BoundaryCache::new(Duration::from_secs(1));
        assert!(cache.get_or_load(0, &failing).await.is_err());
        let healthy = loader();
        assert_eq!(cache.get_or_load(0, &healthy).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_load_leaves_no_partial_entry() {
        let loader = loader().with_latency(Duration::from_millis(50));
        let cache = BoundaryCache::new(Duration::from_secs(1));
        {
            let fut = cache.get_or_load(0, &loader);
            // Poll once then drop: simulates a superseded query.
            let _ = tokio::time::timeout(Duration::from_millis(1), fut).await;
        }
        assert!(cache.get(0).is_none());
        assert_eq!(cache.get_or_load(0, &loader).await.unwrap().len(), 1);
        assert_eq!(loader.calls(0), 2);
    }
}
