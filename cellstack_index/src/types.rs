// Copyright 2025 the Cellstack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.

use core::fmt::Debug;

/// Axis-aligned bounding box in 2D.
///
/// Intervals are closed: a box whose `max_x == min_x` is a vertical segment and
/// still overlaps anything touching it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Aabb2D<T> {
    /// Left edge.
    pub min_x: T,
    /// Top edge.
    pub min_y: T,
    /// Right edge.
    pub max_x: T,
    /// Bottom edge.
    pub max_y: T,
}

impl<T> Aabb2D<T> {
    /// Box spanning `(min_x, min_y)` to `(max_x, max_y)`.
    pub const fn new(min_x: T, min_y: T, max_x: T, max_y: T) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

impl<T: Scalar> Aabb2D<T> {
    /// A zero-area box covering a single point.
    pub const fn from_point(x: T, y: T) -> Self {
        Self::new(x, y, x, y)
    }

    /// Bounding box of a sequence of points. Returns `None` for an empty sequence.
    pub fn from_points(points: impl IntoIterator<Item = (T, T)>) -> Option<Self> {
        let mut it = points.into_iter();
        let (x, y) = it.next()?;
        Some(it.fold(Self::from_point(x, y), |mut bbox, (x, y)| {
            bbox.expand_to(x, y);
            bbox
        }))
    }

    /// Grow the box so that it contains the point.
    pub fn expand_to(&mut self, x: T, y: T) {
        self.min_x = self.min_x.min_of(x);
        self.min_y = self.min_y.min_of(y);
        self.max_x = self.max_x.max_of(x);
        self.max_y = self.max_y.max_of(y);
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.min_x.min_of(other.min_x),
            self.min_y.min_of(other.min_y),
            self.max_x.max_of(other.max_x),
            self.max_y.max_of(other.max_y),
        )
    }

    /// Whether the point lies inside or on the edge of the box.
    pub fn contains_point(&self, x: T, y: T) -> bool {
        self.min_x <= x && x <= self.max_x && self.min_y <= y && y <= self.max_y
    }

    /// Whether the two boxes share at least one point (edges included).
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// True if the box is inverted on some axis. Assumes no NaN.
    pub fn is_empty(&self) -> bool {
        self.max_x < self.min_x || self.max_y < self.min_y
    }

    /// Center of the box.
    pub fn center(&self) -> (T, T) {
        (
            T::halfway(self.min_x, self.max_x),
            T::halfway(self.min_y, self.max_y),
        )
    }
}

impl Aabb2D<f64> {
    /// Box from origin and size.
    pub const fn from_xywh(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// True if all four coordinates are finite.
    pub fn is_finite(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Coordinate type stored in the spatial index.
///
/// Comparisons treat incomparable values (NaN) as equal to the left operand, so a
/// NaN never widens a box.
pub trait Scalar: Copy + PartialOrd + Debug {
    /// Midpoint of `a` and `b`, used to order boxes by center during bulk loads.
    fn halfway(a: Self, b: Self) -> Self;

    /// The smaller of `self` and `other`.
    #[inline]
    fn min_of(self, other: Self) -> Self {
        if other < self { other } else { self }
    }

    /// The larger of `self` and `other`.
    #[inline]
    fn max_of(self, other: Self) -> Self {
        if other > self { other } else { self }
    }
}

impl Scalar for f32 {
    #[inline]
    fn halfway(a: Self, b: Self) -> Self {
        0.5 * (a + b)
    }
}

impl Scalar for f64 {
    #[inline]
    fn halfway(a: Self, b: Self) -> Self {
        0.5 * (a + b)
    }
}

impl Scalar for i64 {
    #[inline]
    fn halfway(a: Self, b: Self) -> Self {
        // Overflow-free average.
        (a & b) + ((a ^ b) >> 1)
    }
}
