//! A one-dimensional span.
//!
//! A span represents the closed interval `[start, stop]`.
use serde::{Deserialize, Serialize};

use crate::intersect::Intersect;

/// A closed interval of coordinates in one dimension.
///
/// Represents the range `[start, stop]`.
#[derive(
    Debug, Default, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize, PartialEq, Eq,
)]
pub struct Span {
    start: i64,
    stop: i64,
}

impl Span {
    /// Creates a new [`Span`] between two integers.
    ///
    /// The endpoints may be given in either order.
    pub fn new(start: i64, stop: i64) -> Self {
        Self {
            start: start.min(stop),
            stop: start.max(stop),
        }
    }

    /// Creates a span of zero length encompassing the given point.
    pub const fn from_point(x: i64) -> Self {
        Self { start: x, stop: x }
    }

    /// Creates a new [`Span`] with center `center` and length `span`.
    ///
    /// `span` must be a non-negative, even integer.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Span::from_center_span(50, 20), Span::new(40, 60));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `span` is negative or odd.
    pub fn from_center_span(center: i64, span: i64) -> Self {
        assert!(span >= 0, "span length must be non-negative");
        assert_eq!(span % 2, 0, "span length must be even");
        Self::new(center - span / 2, center + span / 2)
    }

    /// The starting (lower) endpoint.
    #[inline]
    pub const fn start(&self) -> i64 {
        self.start
    }

    /// The stopping (upper) endpoint.
    #[inline]
    pub const fn stop(&self) -> i64 {
        self.stop
    }

    /// The length of the span.
    #[inline]
    pub const fn length(&self) -> i64 {
        self.stop - self.start
    }

    /// The center of the span, rounded down.
    #[inline]
    pub const fn center(&self) -> i64 {
        (self.start + self.stop).div_euclid(2)
    }

    /// Creates a new [`Span`] expanded by `amount` in both directions.
    ///
    /// A negative `amount` shrinks the span; the result is clamped so that it never inverts.
    pub fn expand_all(self, amount: i64) -> Self {
        let start = self.start - amount;
        let stop = self.stop + amount;
        if start > stop {
            Self::from_point(self.center())
        } else {
            Self { start, stop }
        }
    }

    /// Returns `true` if the span contains `x` (endpoints included).
    #[inline]
    pub const fn contains(&self, x: i64) -> bool {
        self.start <= x && x <= self.stop
    }

    /// Returns `true` if `other` lies entirely within this span.
    #[inline]
    pub const fn contains_span(&self, other: Span) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }

    /// Gets the shortest distance between this span and a point.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let span = Span::new(10, 20);
    /// assert_eq!(span.dist_to(4), 6);
    /// assert_eq!(span.dist_to(12), 0);
    /// assert_eq!(span.dist_to(27), 7);
    /// ```
    pub fn dist_to(&self, point: i64) -> i64 {
        if point < self.start {
            self.start - point
        } else if point > self.stop {
            point - self.stop
        } else {
            0
        }
    }

    /// The point of the span closest to `x`.
    pub fn clamp_coord(&self, x: i64) -> i64 {
        x.clamp(self.start, self.stop)
    }

    /// The smallest span containing both `self` and `other`.
    pub fn union(&self, other: Span) -> Self {
        Self {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }
}

impl Intersect<Span> for Span {
    type Output = Self;

    /// Calculates the intersection of two spans.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Span::new(0, 10);
    /// assert_eq!(a.intersect(&Span::new(5, 20)), Some(Span::new(5, 10)));
    /// assert_eq!(a.intersect(&Span::new(10, 20)), Some(Span::from_point(10)));
    /// assert_eq!(a.intersect(&Span::new(11, 20)), None);
    /// ```
    fn intersect(&self, other: &Span) -> Option<Self::Output> {
        let start = self.start.max(other.start);
        let stop = self.stop.min(other.stop);
        if start > stop {
            None
        } else {
            Some(Self { start, stop })
        }
    }
}
