// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The explicit context object tying loader, cache, builds and queries together.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, info};

use crate::builder::IndexBuilder;
use crate::cache::BoundaryCache;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::geometry::SelectionRect;
use crate::loader::PlaneLoader;
use crate::selection::{Selection, SelectionEngine};
use crate::snapshot::IndexSnapshot;
use crate::worker::DecodeWorker;

type SharedBuild = Shared<BoxFuture<'static, Result<Arc<IndexSnapshot>>>>;

struct InFlight {
    id: u64,
    total_planes: u32,
    build: SharedBuild,
}

struct Published {
    build_id: u64,
    snapshot: Arc<IndexSnapshot>,
    cache: Arc<BoundaryCache>,
}

struct Inner {
    config: EngineConfig,
    loader: Arc<dyn PlaneLoader>,
    worker: Option<Arc<DecodeWorker>>,
    cache: RwLock<Arc<BoundaryCache>>,
    published: RwLock<Option<Published>>,
    in_flight: Mutex<Option<InFlight>>,
    next_build: AtomicU64,
    generation: AtomicU64,
}

/// A selection session over one plane stack.
///
/// Cheap to clone; clones share the cache, the published index and any build in
/// progress. Concurrent [`Session::build_index`] calls join one shared build, and
/// queries keep working (in single-plane fallback mode, if configured) until an
/// index is published.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("published", &self.snapshot().is_some())
            .field("generation", &self.inner.generation.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session loading planes through `loader`.
    pub fn new(config: EngineConfig, loader: Arc<dyn PlaneLoader>) -> Self {
        Self::with_worker(config, loader, None)
    }

    /// Session that hands per-plane summaries to `worker` during builds.
    pub fn with_worker(
        config: EngineConfig,
        loader: Arc<dyn PlaneLoader>,
        worker: Option<Arc<DecodeWorker>>,
    ) -> Self {
        let cache = Arc::new(BoundaryCache::new(config.load_timeout));
        Self {
            inner: Arc::new(Inner {
                config,
                loader,
                worker,
                cache: RwLock::new(cache),
                published: RwLock::new(None),
                in_flight: Mutex::new(None),
                next_build: AtomicU64::new(0),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The cache queries and builds currently use.
    pub fn cache(&self) -> Arc<BoundaryCache> {
        Arc::clone(&self.inner.cache.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The published index, if any.
    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.inner
            .published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|p| Arc::clone(&p.snapshot))
    }

    /// The published index together with the cache it was built from, read as one
    /// pair so a concurrent reload cannot mix an old index with a new cache.
    fn view(&self) -> (Option<Arc<IndexSnapshot>>, Arc<BoundaryCache>) {
        let published = self
            .inner
            .published
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match published.as_ref() {
            Some(p) => (Some(Arc::clone(&p.snapshot)), Arc::clone(&p.cache)),
            None => (None, self.cache()),
        }
    }

    /// Build and publish the index over planes `0..total_planes`.
    ///
    /// Returns the published index right away if it already covers `total_planes`.
    /// Otherwise joins the build in progress for the same plane count, or starts one.
    /// Dropping the returned future does not abandon the build: the next caller
    /// resumes it.
    pub async fn build_index(&self, total_planes: u32) -> Result<Arc<IndexSnapshot>> {
        if total_planes == 0 {
            return Err(EngineError::InvalidPlaneCount);
        }
        if let Some(snapshot) = self.snapshot()
            && snapshot.stats().planes_total == total_planes as usize
        {
            return Ok(snapshot);
        }
        self.shared_build(total_planes, false).await
    }

    /// Rebuild from a fresh cache and swap the result in when it completes.
    ///
    /// Queries keep using the previous index and cache until then.
    pub async fn reload(&self, total_planes: u32) -> Result<Arc<IndexSnapshot>> {
        if total_planes == 0 {
            return Err(EngineError::InvalidPlaneCount);
        }
        info!("reloading cell index over {total_planes} planes");
        self.shared_build(total_planes, true).await
    }

    fn shared_build(&self, total_planes: u32, fresh: bool) -> SharedBuild {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !fresh
            && let Some(current) = in_flight.as_ref()
            && current.total_planes == total_planes
        {
            debug!("joining build {} in progress", current.id);
            return current.build.clone();
        }

        let id = self.inner.next_build.fetch_add(1, Ordering::AcqRel) + 1;
        let cache = if fresh {
            Arc::new(BoundaryCache::new(self.inner.config.load_timeout))
        } else {
            self.cache()
        };
        let inner = Arc::clone(&self.inner);
        let build = async move { inner.run_build(id, total_planes, cache).await }
            .boxed()
            .shared();
        *in_flight = Some(InFlight {
            id,
            total_planes,
            build: build.clone(),
        });
        build
    }

    /// Answer a rectangle query against the published index.
    ///
    /// Without an index the displayed plane is scanned instead; without either the
    /// query fails with [`EngineError::IndexUnavailable`].
    pub async fn query_selection(&self, rect: SelectionRect) -> Result<Selection> {
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let (snapshot, cache) = self.view();
        SelectionEngine::new(&self.inner.config, &cache, &*self.inner.loader)
            .query(snapshot.as_deref(), rect, generation)
            .await
    }

    /// Whether `selection` answers the most recent query.
    pub fn is_current(&self, selection: &Selection) -> bool {
        selection.generation == self.inner.generation.load(Ordering::Acquire)
    }
}

impl Inner {
    async fn run_build(
        self: Arc<Self>,
        id: u64,
        total_planes: u32,
        cache: Arc<BoundaryCache>,
    ) -> Result<Arc<IndexSnapshot>> {
        let result = IndexBuilder::new(&self.config, &cache, &*self.loader)
            .with_worker(self.worker.as_deref())
            .build(total_planes)
            .await
            .map(Arc::new);
        if let Ok(snapshot) = &result {
            self.publish(id, Arc::clone(snapshot), cache);
        }
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.as_ref().is_some_and(|f| f.id == id) {
            *in_flight = None;
        }
        result
    }

    /// Swap in a finished build unless a newer one was already published.
    fn publish(&self, id: u64, snapshot: Arc<IndexSnapshot>, cache: Arc<BoundaryCache>) {
        let mut published = self.published.write().unwrap_or_else(PoisonError::into_inner);
        if published.as_ref().is_some_and(|p| p.build_id > id) {
            debug!("discarding build {id}, a newer index is published");
            return;
        }
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&cache);
        *published = Some(Published {
            build_id: id,
            snapshot,
            cache,
        });
        debug!("published build {id}");
    }
}
