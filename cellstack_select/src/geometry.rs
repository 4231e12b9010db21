// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Planar geometry records: polygons, per-plane polygon sets and selection rectangles.
//!
//! All coordinates live in one normalized space; the engine never converts units.

use std::collections::HashMap;
use std::sync::Arc;

use cellstack_index::Aabb2D;
use kurbo::{Point, Rect};

use crate::error::EngineError;

/// Identifier of one Z-slice of the stack.
pub type PlaneId = u32;

/// Label of a cell; shared by all of its boundaries across planes.
pub type CellId = i64;

/// Owned ring of points, closed (first point equals last) unless degenerate.
pub type Ring = Vec<Point>;

/// Minimum number of coordinate pairs a source ring needs to be non-degenerate.
pub const MIN_RING_POINTS: usize = 4;

/// Classification of a polygon ring before it is indexed or clipped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RingCheck {
    /// At least [`MIN_RING_POINTS`] finite points.
    Valid,
    /// Fewer than [`MIN_RING_POINTS`] source points. Still counts as plane membership.
    Degenerate,
    /// Contains NaN or infinite coordinates.
    Malformed,
}

/// A cell boundary on one plane.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    /// Owning cell.
    pub cell_id: CellId,
    /// Plane this boundary lies on.
    pub plane: PlaneId,
    ring: Arc<[Point]>,
}

impl Polygon {
    /// Create a polygon.
    ///
    /// A ring of at least [`MIN_RING_POINTS`] points is closed if its first and last
    /// points differ. Shorter rings are kept as given, so they stay degenerate.
    pub fn new(cell_id: CellId, plane: PlaneId, points: impl IntoIterator<Item = Point>) -> Self {
        let mut ring: Vec<Point> = points.into_iter().collect();
        if ring.len() >= MIN_RING_POINTS
            && let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied())
            && first != last
        {
            ring.push(first);
        }
        Self {
            cell_id,
            plane,
            ring: ring.into(),
        }
    }

    /// Create a polygon from `[x, y]` pairs.
    pub fn from_coords(cell_id: CellId, plane: PlaneId, coords: &[[f64; 2]]) -> Self {
        Self::new(
            cell_id,
            plane,
            coords.iter().map(|&[x, y]| Point::new(x, y)),
        )
    }

    /// The ring; closed unless degenerate.
    pub fn ring(&self) -> &[Point] {
        &self.ring
    }

    /// Shared handle to the ring, cheap to hand out in results.
    pub fn shared_ring(&self) -> Arc<[Point]> {
        Arc::clone(&self.ring)
    }

    /// Classify the ring.
    pub fn check(&self) -> RingCheck {
        if self.ring.iter().any(|p| !p.is_finite()) {
            RingCheck::Malformed
        } else if self.ring.len() < MIN_RING_POINTS {
            RingCheck::Degenerate
        } else {
            RingCheck::Valid
        }
    }

    /// Exact bounding box of the ring points. `None` for an empty ring.
    pub fn bounds(&self) -> Option<Aabb2D<f64>> {
        ring_bounds(&self.ring)
    }
}

/// Exact min/max of a sequence of points.
pub fn ring_bounds(ring: &[Point]) -> Option<Aabb2D<f64>> {
    Aabb2D::from_points(ring.iter().map(|p| (p.x, p.y)))
}

/// All polygons of one plane, with a cell lookup.
#[derive(Clone, Debug, Default)]
pub struct PolygonSet {
    plane: PlaneId,
    polygons: Vec<Polygon>,
    by_cell: HashMap<CellId, Vec<usize>>,
}

impl PolygonSet {
    /// Build a set from polygons already tagged with `plane`.
    pub fn new(plane: PlaneId, polygons: Vec<Polygon>) -> Self {
        debug_assert!(
            polygons.iter().all(|p| p.plane == plane),
            "polygon tagged with a different plane"
        );
        let mut by_cell: HashMap<CellId, Vec<usize>> = HashMap::new();
        for (i, p) in polygons.iter().enumerate() {
            by_cell.entry(p.cell_id).or_default().push(i);
        }
        Self {
            plane,
            polygons,
            by_cell,
        }
    }

    /// Build a set from `(cell, ring)` pairs.
    pub fn from_rings(plane: PlaneId, rings: impl IntoIterator<Item = (CellId, Ring)>) -> Self {
        let polygons = rings
            .into_iter()
            .map(|(cell, ring)| Polygon::new(cell, plane, ring))
            .collect();
        Self::new(plane, polygons)
    }

    /// A plane with no boundaries.
    pub fn empty(plane: PlaneId) -> Self {
        Self::new(plane, Vec::new())
    }

    /// Plane id of this set.
    pub fn plane(&self) -> PlaneId {
        self.plane
    }

    /// Number of polygons.
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    /// True if the plane holds no polygons.
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// All polygons in load order.
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Polygons of `cell` on this plane (usually one).
    pub fn polygons_of(&self, cell: CellId) -> impl Iterator<Item = &Polygon> + '_ {
        self.by_cell
            .get(&cell)
            .into_iter()
            .flatten()
            .map(|&i| &self.polygons[i])
    }

    /// Whether `cell` has any boundary on this plane.
    pub fn contains_cell(&self, cell: CellId) -> bool {
        self.by_cell.contains_key(&cell)
    }
}

/// Axis-aligned selection rectangle: `left < right`, `top < bottom`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SelectionRect {
    /// Minimum x.
    pub left: f64,
    /// Minimum y.
    pub top: f64,
    /// Maximum x.
    pub right: f64,
    /// Maximum y.
    pub bottom: f64,
}

impl SelectionRect {
    /// Validate and build a rectangle.
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Result<Self, EngineError> {
        let rect = Self {
            left,
            top,
            right,
            bottom,
        };
        rect.validate()?;
        Ok(rect)
    }

    /// Build from a kurbo rectangle, normalizing its corners.
    pub fn from_rect(rect: Rect) -> Result<Self, EngineError> {
        let r = rect.abs();
        Self::new(r.x0, r.y0, r.x1, r.y1)
    }

    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        let finite = [self.left, self.top, self.right, self.bottom]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.left >= self.right || self.top >= self.bottom {
            return Err(EngineError::InvalidRect {
                left: self.left,
                top: self.top,
                right: self.right,
                bottom: self.bottom,
            });
        }
        Ok(())
    }

    /// As a kurbo rectangle.
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.left, self.top, self.right, self.bottom)
    }

    /// As an index AABB.
    pub fn to_aabb(&self) -> Aabb2D<f64> {
        Aabb2D::new(self.left, self.top, self.right, self.bottom)
    }

    /// Whether `p` lies inside the rectangle, allowing `tolerance` outside each edge.
    pub fn contains_with_tolerance(&self, p: Point, tolerance: f64) -> bool {
        p.x >= self.left - tolerance
            && p.x <= self.right + tolerance
            && p.y >= self.top - tolerance
            && p.y <= self.bottom + tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_is_closed_on_construction() {
        let p = Polygon::from_coords(7, 0, &[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]);
        assert_eq!(p.ring().len(), 5);
        assert_eq!(p.ring().first(), p.ring().last());
        assert_eq!(p.check(), RingCheck::Valid);

        let closed = Polygon::from_coords(7, 0, &[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 0.0]]);
        assert_eq!(closed.ring().len(), 4);
        assert_eq!(closed.check(), RingCheck::Valid);
    }

    #[test]
    fn unclosed_triangle_is_degenerate() {
        let p = Polygon::from_coords(5, 0, &[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0]]);
        assert_eq!(p.ring().len(), 3);
        assert_eq!(p.check(), RingCheck::Degenerate);
    }

    #[test]
    fn short_rings_are_degenerate() {
        let p = Polygon::from_coords(7, 0, &[[0.0, 0.0], [4.0, 0.0], [0.0, 0.0]]);
        assert_eq!(p.check(), RingCheck::Degenerate);
        let empty = Polygon::new(7, 0, Vec::new());
        assert_eq!(empty.check(), RingCheck::Degenerate);
        assert!(empty.bounds().is_none());
    }

    #[test]
    fn non_finite_rings_are_malformed() {
        let p = Polygon::from_coords(
            1,
            0,
            &[[0.0, 0.0], [f64::NAN, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]],
        );
        assert_eq!(p.check(), RingCheck::Malformed);
    }

    #[test]
    fn polygon_set_lookup_by_cell() {
        let set = PolygonSet::from_rings(
            3,
            [
                (1, vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)]),
                (2, vec![Point::new(5.0, 5.0), Point::new(6.0, 5.0), Point::new(6.0, 6.0)]),
                (1, vec![Point::new(9.0, 9.0), Point::new(9.5, 9.0), Point::new(9.5, 9.5)]),
            ],
        );
        assert_eq!(set.plane(), 3);
        assert_eq!(set.len(), 3);
        assert_eq!(set.polygons_of(1).count(), 2);
        assert_eq!(set.polygons_of(2).count(), 1);
        assert!(!set.contains_cell(3));
        assert_eq!(set.polygons_of(3).count(), 0);
    }

    #[test]
    fn selection_rect_validation() {
        assert!(SelectionRect::new(0.0, 0.0, 1.0, 1.0).is_ok());
        assert!(SelectionRect::new(1.0, 0.0, 1.0, 1.0).is_err());
        assert!(SelectionRect::new(0.0, 2.0, 1.0, 1.0).is_err());
        assert!(SelectionRect::new(0.0, 0.0, f64::INFINITY, 1.0).is_err());
        let flipped = SelectionRect::from_rect(Rect::new(6.0, 6.0, 4.0, 4.0)).unwrap();
        assert_eq!(flipped.to_aabb(), Aabb2D::new(4.0, 4.0, 6.0, 6.0));
    }
}
