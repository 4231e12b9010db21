// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exact polygon-rectangle clipping (the narrow phase).
//!
//! Clipping a concave ring by a rectangle can split it into several disjoint
//! pieces. Every piece is kept; the single-ring case and the split case are
//! distinct variants of [`ClippedBoundary`] so callers never have to sniff the shape.

use geo::{BooleanOps, Coord, Intersects, LineString, Polygon as GeoPolygon, Rect as GeoRect};
use kurbo::Point;

use crate::geometry::{MIN_RING_POINTS, Ring, SelectionRect, ring_bounds};

/// Geometry of a successful clip.
#[derive(Clone, Debug, PartialEq)]
pub enum ClippedBoundary {
    /// The overlap is one ring.
    Single(Ring),
    /// The rectangle split the polygon into disjoint rings.
    Multi(Vec<Ring>),
}

impl ClippedBoundary {
    /// All rings, one for `Single`.
    pub fn rings(&self) -> &[Ring] {
        match self {
            Self::Single(ring) => core::slice::from_ref(ring),
            Self::Multi(rings) => rings,
        }
    }

    /// Number of disjoint pieces.
    pub fn piece_count(&self) -> usize {
        self.rings().len()
    }

    /// Every vertex of every piece.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.rings().iter().flatten().copied()
    }
}

/// Result of clipping one ring by one rectangle.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipOutcome {
    /// The ring and the rectangle do not overlap.
    Disjoint,
    /// The overlap, as one or more rings.
    Clipped(ClippedBoundary),
    /// The shapes touch or overlap, but the clip produced no ring (for example a
    /// shared edge with zero-area overlap, or precision loss in a sliver).
    Empty,
}

impl ClipOutcome {
    /// Whether the ring and the rectangle were found to intersect.
    pub fn intersects(&self) -> bool {
        !matches!(self, Self::Disjoint)
    }
}

fn to_geo(ring: &[Point]) -> GeoPolygon<f64> {
    let coords: Vec<Coord<f64>> = ring.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    GeoPolygon::new(LineString::new(coords), Vec::new())
}

fn to_geo_rect(rect: &SelectionRect) -> GeoRect<f64> {
    GeoRect::new(
        Coord {
            x: rect.left,
            y: rect.top,
        },
        Coord {
            x: rect.right,
            y: rect.bottom,
        },
    )
}

/// Convert a clipper output ring back to points, pinned inside `rect`.
///
/// The overlay snaps coordinates to an integer grid internally, so vertices on the
/// rectangle edges can come back a rounding step outside of it.
fn from_geo(exterior: &LineString<f64>, rect: &SelectionRect) -> Option<Ring> {
    let ring: Ring = exterior
        .coords()
        .map(|c| {
            Point::new(
                c.x.clamp(rect.left, rect.right),
                c.y.clamp(rect.top, rect.bottom),
            )
        })
        .collect();
    (ring.len() >= MIN_RING_POINTS).then_some(ring)
}

/// Clip a closed ring against `rect`.
///
/// The ring must be valid (at least [`MIN_RING_POINTS`] finite points); callers
/// filter degenerate rings before clipping.
pub fn clip_ring(ring: &[Point], rect: &SelectionRect) -> ClipOutcome {
    let Some(bounds) = ring_bounds(ring) else {
        return ClipOutcome::Disjoint;
    };
    let window = rect.to_aabb();
    if !bounds.overlaps(&window) {
        return ClipOutcome::Disjoint;
    }
    // Entirely inside: the ring is its own clip.
    if window.contains_point(bounds.min_x, bounds.min_y)
        && window.contains_point(bounds.max_x, bounds.max_y)
    {
        return ClipOutcome::Clipped(ClippedBoundary::Single(ring.to_vec()));
    }

    let subject = to_geo(ring);
    let clip_rect = to_geo_rect(rect);
    let pieces = subject.intersection(&clip_rect.to_polygon());
    let mut rings: Vec<Ring> = pieces
        .0
        .iter()
        .filter_map(|piece| from_geo(piece.exterior(), rect))
        .collect();

    match rings.len() {
        0 => {
            if subject.intersects(&clip_rect) {
                ClipOutcome::Empty
            } else {
                ClipOutcome::Disjoint
            }
        }
        1 => ClipOutcome::Clipped(ClippedBoundary::Single(rings.swap_remove(0))),
        _ => ClipOutcome::Clipped(ClippedBoundary::Multi(rings)),
    }
}

/// Signed area of a closed ring (shoelace).
pub fn ring_area(ring: &[Point]) -> f64 {
    let twice: f64 = ring
        .windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum();
    0.5 * twice
}
