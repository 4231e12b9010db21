// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Off-thread decoding and summarizing.
//!
//! Requests and replies are messages tagged with a correlation id. One thread serves
//! requests in order and a second thread routes each reply to the caller waiting on
//! that id, so concurrent callers never receive each other's results.
//!
//! Decode requests move their columns to the worker. Summarize requests share the
//! cached polygon set through an `Arc`; the set is immutable, and the worker drops
//! its handle before replying.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use futures::channel::oneshot;
use log::debug;

use crate::builder::{PlaneSummary, summarize_plane};
use crate::columnar::PlaneColumns;
use crate::error::{EngineError, LoadError};
use crate::geometry::PolygonSet;

/// A message with its correlation id.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope<T> {
    /// Correlation id, unique per worker.
    pub id: u64,
    /// Payload.
    pub body: T,
}

/// Work the worker accepts.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Decode a columnar plane into polygons.
    Decode(PlaneColumns),
    /// Reduce a decoded plane to its cell summary.
    Summarize(Arc<PolygonSet>),
}

/// What the worker answers.
#[derive(Debug)]
pub enum WorkerResponse {
    /// Result of [`WorkerRequest::Decode`].
    Decoded(PolygonSet),
    /// Result of [`WorkerRequest::Summarize`].
    Summary(PlaneSummary),
    /// The request could not be served.
    Failed(LoadError),
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<WorkerResponse>>>>;

/// Handle to a background decode worker.
///
/// Dropping the handle closes the request channel; the worker threads then exit and
/// any caller still waiting gets [`EngineError::WorkerUnavailable`].
#[derive(Debug)]
pub struct DecodeWorker {
    requests: Sender<Envelope<WorkerRequest>>,
    pending: Pending,
    next_id: AtomicU64,
}

impl DecodeWorker {
    /// Start the serving and routing threads.
    pub fn spawn() -> Result<Self, EngineError> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<Envelope<WorkerRequest>>();
        let (reply_tx, reply_rx) = crossbeam_channel::unbounded::<Envelope<WorkerResponse>>();
        let pending: Pending = Arc::default();

        thread::Builder::new()
            .name("cellstack-decode".to_string())
            .spawn(move || serve(&request_rx, &reply_tx))
            .map_err(|err| EngineError::WorkerUnavailable(err.to_string()))?;
        let router_pending = Arc::clone(&pending);
        thread::Builder::new()
            .name("cellstack-route".to_string())
            .spawn(move || route(&reply_rx, &router_pending))
            .map_err(|err| EngineError::WorkerUnavailable(err.to_string()))?;

        Ok(Self {
            requests: request_tx,
            pending,
            next_id: AtomicU64::new(0),
        })
    }

    /// Send `request` and wait for the reply carrying its id.
    pub async fn call(&self, request: WorkerRequest) -> Result<WorkerResponse, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        if self.requests.send(Envelope { id, body: request }).is_err() {
            self.forget(id);
            return Err(EngineError::WorkerUnavailable(
                "request channel closed".to_string(),
            ));
        }
        let _guard = ForgetOnDrop { worker: self, id };
        rx.await
            .map_err(|_| EngineError::WorkerUnavailable("worker stopped".to_string()))
    }

    /// Decode a columnar plane on the worker.
    pub async fn decode(&self, columns: PlaneColumns) -> Result<PolygonSet, LoadError> {
        let plane = columns.plane;
        match self.call(WorkerRequest::Decode(columns)).await {
            Ok(WorkerResponse::Decoded(set)) => Ok(set),
            Ok(WorkerResponse::Failed(err)) => Err(err),
            Ok(other) => Err(LoadError::Decode {
                plane,
                reason: format!("unexpected worker reply {other:?}"),
            }),
            Err(err) => Err(LoadError::Transport {
                plane,
                reason: err.to_string(),
            }),
        }
    }

    /// Summarize a decoded plane on the worker. `set` is only read, and released
    /// before the reply is sent.
    pub async fn summarize(&self, set: Arc<PolygonSet>) -> Result<PlaneSummary, EngineError> {
        match self.call(WorkerRequest::Summarize(set)).await? {
            WorkerResponse::Summary(summary) => Ok(summary),
            WorkerResponse::Failed(err) => Err(EngineError::WorkerUnavailable(err.to_string())),
            other => Err(EngineError::WorkerUnavailable(format!(
                "unexpected worker reply {other:?}"
            ))),
        }
    }

    /// Number of calls still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// A handle whose threads are already gone; every call fails.
    #[cfg(test)]
    pub(crate) fn stopped() -> Self {
        let (requests, _) = crossbeam_channel::unbounded();
        Self {
            requests,
            pending: Arc::default(),
            next_id: AtomicU64::new(0),
        }
    }

    fn forget(&self, id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Drops the pending entry of a call whose future was dropped before its reply.
struct ForgetOnDrop<'a> {
    worker: &'a DecodeWorker,
    id: u64,
}

impl Drop for ForgetOnDrop<'_> {
    fn drop(&mut self) {
        self.worker.forget(self.id);
    }
}

fn handle(request: WorkerRequest) -> WorkerResponse {
    match request {
        WorkerRequest::Decode(columns) => match columns.decode() {
            Ok(set) => WorkerResponse::Decoded(set),
            Err(err) => WorkerResponse::Failed(err),
        },
        WorkerRequest::Summarize(set) => WorkerResponse::Summary(summarize_plane(&set)),
    }
}

fn serve(requests: &Receiver<Envelope<WorkerRequest>>, replies: &Sender<Envelope<WorkerResponse>>) {
    for Envelope { id, body } in requests {
        let body = handle(body);
        if replies.send(Envelope { id, body }).is_err() {
            break;
        }
    }
    debug!("decode worker stopped");
}

fn route(replies: &Receiver<Envelope<WorkerResponse>>, pending: &Pending) {
    for Envelope { id, body } in replies {
        let waiter = pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match waiter {
            // The caller may have gone away since; its reply is dropped.
            Some(tx) => {
                let _ = tx.send(body);
            }
            None => debug!("dropping reply {id} with no waiting caller"),
        }
    }
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}
