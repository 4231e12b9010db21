// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for plane loading and top-level engine operations.
//!
//! Per-plane and per-polygon failures are [`LoadError`]s and never escape a build or
//! a query on their own; they are logged and turned into skips or flagged results.
//! [`EngineError`] is what rejects a whole `build_index` or `query_selection` call.

use std::time::Duration;

use thiserror::Error;

use crate::geometry::PlaneId;

/// Failure to produce the polygon set of one plane.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LoadError {
    /// The plane does not exist in the data set.
    #[error("plane {0} not found")]
    NotFound(PlaneId),
    /// The loader could not reach its backing store.
    #[error("transport failure loading plane {plane}: {reason}")]
    Transport {
        /// Plane being loaded.
        plane: PlaneId,
        /// Loader-provided description.
        reason: String,
    },
    /// The loader did not answer within the configured timeout.
    #[error("loading plane {plane} timed out after {after:?}")]
    TimedOut {
        /// Plane being loaded.
        plane: PlaneId,
        /// Configured timeout.
        after: Duration,
    },
    /// Raw plane data could not be turned into polygons.
    #[error("plane {plane} could not be decoded: {reason}")]
    Decode {
        /// Plane being decoded.
        plane: PlaneId,
        /// What was inconsistent.
        reason: String,
    },
}

impl LoadError {
    /// True for failures of the loading subsystem itself, as opposed to missing
    /// or bad data.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Failure of a whole engine operation.
///
/// `Clone` so a shared in-flight build can hand the same error to every waiter.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    /// `build_index` was asked for zero planes.
    #[error("plane count must be positive")]
    InvalidPlaneCount,
    /// The selection rectangle is inverted, empty or not finite.
    #[error("invalid selection rectangle: left={left} top={top} right={right} bottom={bottom}")]
    InvalidRect {
        /// Left edge.
        left: f64,
        /// Top edge.
        top: f64,
        /// Right edge.
        right: f64,
        /// Bottom edge.
        bottom: f64,
    },
    /// No index is published and there is no displayed plane to fall back to.
    #[error("spatial index is not available and no displayed plane is set")]
    IndexUnavailable,
    /// Every plane load attempted by the operation failed in transport.
    #[error("loader unavailable: {failed} plane load(s) failed, last error: {last}")]
    LoaderUnavailable {
        /// Number of failed plane loads.
        failed: usize,
        /// The last observed transport error.
        last: LoadError,
    },
    /// The decode worker thread is gone.
    #[error("decode worker unavailable: {0}")]
    WorkerUnavailable(String),
}

/// Result alias for engine operations.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
