// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat columnar plane buffers and a loader that decodes them.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use kurbo::Point;

use crate::error::LoadError;
use crate::geometry::{CellId, PlaneId, Polygon, PolygonSet};
use crate::loader::PlaneLoader;
use crate::worker::DecodeWorker;

/// One plane as parallel columns.
///
/// Polygon `i` is labelled `labels[i]` and owns the coordinates
/// `xs[offsets[i]..offsets[i + 1]]` / `ys[..]` over the same range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlaneColumns {
    /// Plane the columns belong to.
    pub plane: PlaneId,
    /// X coordinates of every polygon, concatenated.
    pub xs: Vec<f64>,
    /// Y coordinates, parallel to `xs`.
    pub ys: Vec<f64>,
    /// Polygon start offsets into `xs`; `labels.len() + 1` entries.
    pub offsets: Vec<usize>,
    /// Cell id of each polygon.
    pub labels: Vec<CellId>,
}

impl PlaneColumns {
    /// Flatten a decoded set.
    pub fn from_set(set: &PolygonSet) -> Self {
        let mut columns = Self {
            plane: set.plane(),
            offsets: vec![0],
            ..Self::default()
        };
        for polygon in set.polygons() {
            columns.xs.extend(polygon.ring().iter().map(|p| p.x));
            columns.ys.extend(polygon.ring().iter().map(|p| p.y));
            columns.offsets.push(columns.xs.len());
            columns.labels.push(polygon.cell_id);
        }
        columns
    }

    fn invalid(&self, reason: impl Into<String>) -> LoadError {
        LoadError::Decode {
            plane: self.plane,
            reason: reason.into(),
        }
    }

    /// Rebuild the polygon set, checking that the columns are consistent.
    pub fn decode(&self) -> Result<PolygonSet, LoadError> {
        if self.xs.len() != self.ys.len() {
            return Err(self.invalid(format!(
                "{} x values but {} y values",
                self.xs.len(),
                self.ys.len()
            )));
        }
        if self.offsets.len() != self.labels.len() + 1 {
            return Err(self.invalid(format!(
                "{} offsets for {} labels",
                self.offsets.len(),
                self.labels.len()
            )));
        }
        if self.offsets.first() != Some(&0) || self.offsets.last() != Some(&self.xs.len()) {
            return Err(self.invalid("offsets do not span the coordinates"));
        }
        if self.offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(self.invalid("offsets are not ascending"));
        }
        let polygons = self
            .labels
            .iter()
            .zip(self.offsets.windows(2))
            .map(|(&cell, w)| {
                let range = w[0]..w[1];
                let points = self.xs[range.clone()]
                    .iter()
                    .zip(&self.ys[range])
                    .map(|(&x, &y)| Point::new(x, y));
                Polygon::new(cell, self.plane, points)
            })
            .collect();
        Ok(PolygonSet::new(self.plane, polygons))
    }
}

/// Where columnar planes come from (a file, a bucket, a map in memory).
pub trait ColumnSource: Send + Sync {
    /// Fetch the raw columns of `plane`; [`LoadError::NotFound`] if it has none.
    fn fetch(&self, plane: PlaneId) -> BoxFuture<'_, Result<PlaneColumns, LoadError>>;
}

impl ColumnSource for HashMap<PlaneId, PlaneColumns> {
    fn fetch(&self, plane: PlaneId) -> BoxFuture<'_, Result<PlaneColumns, LoadError>> {
        let found = self.get(&plane).cloned().ok_or(LoadError::NotFound(plane));
        futures::future::ready(found).boxed()
    }
}

/// [`PlaneLoader`] over a [`ColumnSource`], decoding off-thread when a worker is attached.
#[derive(Debug)]
pub struct ColumnarLoader<S> {
    source: S,
    worker: Option<Arc<DecodeWorker>>,
}

impl<S: ColumnSource> ColumnarLoader<S> {
    /// Loader decoding inline.
    pub fn new(source: S) -> Self {
        Self {
            source,
            worker: None,
        }
    }

    /// Decode on `worker` instead of inline.
    pub fn with_worker(mut self, worker: Arc<DecodeWorker>) -> Self {
        self.worker = Some(worker);
        self
    }
}

impl<S: ColumnSource> PlaneLoader for ColumnarLoader<S> {
    fn load_plane(&self, plane: PlaneId) -> BoxFuture<'_, Result<PolygonSet, LoadError>> {
        async move {
            let columns = self.source.fetch(plane).await?;
            if columns.plane != plane {
                return Err(columns.invalid(format!("requested plane {plane}")));
            }
            match &self.worker {
                Some(worker) => worker.decode(columns).await,
                None => columns.decode(),
            }
        }
        .boxed()
    }
}
