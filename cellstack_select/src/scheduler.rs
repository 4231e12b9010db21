// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative scheduling: a bounded pool of logical workers and explicit yield points.
//!
//! Everything here runs inside one task. Lanes are plain futures joined together, so
//! they interleave only at `.await` points and never need `Send + 'static` bounds of
//! their own. Long synchronous loops call [`Checkpoint::tick`] so the executor can
//! serve other work (queries, timers) while a build is running.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;

/// How a yield point hands control back to the executor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum YieldPolicy {
    /// Reschedule immediately behind other ready tasks.
    Cooperative,
    /// Defer for at most the given duration before continuing. Progress is
    /// guaranteed once the bound elapses, however busy the executor is.
    Deferred(Duration),
}

/// Single yield point.
pub async fn yield_now(policy: YieldPolicy) {
    match policy {
        YieldPolicy::Cooperative => tokio::task::yield_now().await,
        YieldPolicy::Deferred(bound) => tokio::time::sleep(bound).await,
    }
}

/// Counts units of synchronous work and yields every `every` units.
#[derive(Debug)]
pub struct Checkpoint {
    policy: YieldPolicy,
    every: usize,
    pending: usize,
    yields: usize,
}

impl Checkpoint {
    /// Yield after every `every` units (at least one).
    pub fn new(policy: YieldPolicy, every: usize) -> Self {
        Self {
            policy,
            every: every.max(1),
            pending: 0,
            yields: 0,
        }
    }

    /// Record one unit of work, yielding when a batch is complete.
    pub async fn tick(&mut self) {
        self.pending += 1;
        if self.pending >= self.every {
            self.pending = 0;
            self.yields += 1;
            yield_now(self.policy).await;
        }
    }

    /// Number of yields performed so far.
    pub fn yields(&self) -> usize {
        self.yields
    }
}

/// Process indices `0..total` with `workers` logical lanes pulling from a shared counter.
///
/// Each index is handed to exactly one lane. A lane yields after every unit. Returns
/// the number of units processed by each lane.
pub async fn run_pool<F, Fut>(
    total: usize,
    workers: usize,
    policy: YieldPolicy,
    unit: F,
) -> Vec<usize>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = ()>,
{
    let next = AtomicUsize::new(0);
    let lanes = workers.clamp(1, total.max(1));
    let next = &next;
    let unit = &unit;
    join_all((0..lanes).map(|_| async move {
        let mut done = 0_usize;
        loop {
            let i = next.fetch_add(1, Ordering::Relaxed);
            if i >= total {
                break;
            }
            unit(i).await;
            done += 1;
            yield_now(policy).await;
        }
        done
    }))
    .await
}
