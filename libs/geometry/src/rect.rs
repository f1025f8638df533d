//! Axis-aligned rectangles.

use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;
use crate::intersect::Intersect;
use crate::point::Point;
use crate::span::Span;

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
#[derive(
    Debug, Default, Copy, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct Rect {
    /// The lower-left corner.
    p0: Point,
    /// The upper-right corner.
    p1: Point,
}

impl Rect {
    /// Creates a new rectangle from the given opposite corner points.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::new(Point::new(30, 20), Point::new(15, 40));
    /// assert_eq!(rect.left(), 15);
    /// assert_eq!(rect.bot(), 20);
    /// assert_eq!(rect.right(), 30);
    /// assert_eq!(rect.top(), 40);
    /// ```
    #[inline]
    pub fn new(lower_left: Point, upper_right: Point) -> Self {
        let p0 = lower_left;
        let p1 = upper_right;
        Self {
            p0: Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
            p1: Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
        }
    }

    /// Creates a rectangle from all 4 sides (left, bottom, right, top).
    ///
    /// # Panics
    ///
    /// This method panics if `left > right` or if `bot > top`.
    #[inline]
    pub fn from_sides(left: i64, bot: i64, right: i64, top: i64) -> Self {
        assert!(
            left <= right,
            "Rect::from_sides requires that left ({}) <= right ({})",
            left,
            right
        );
        assert!(
            bot <= top,
            "Rect::from_sides requires that bot ({}) <= top ({})",
            bot,
            top
        );
        Self {
            p0: Point::new(left, bot),
            p1: Point::new(right, top),
        }
    }

    /// Creates a rectangle from all 4 sides (left, bottom, right, top),
    /// but returns `None` if the given sides would make the rectangle empty.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides_option(15, 20, 30, 40);
    /// assert_eq!(rect, Some(Rect::from_sides(15, 20, 30, 40)));
    ///
    /// let rect = Rect::from_sides_option(10, 20, 0, 40);
    /// assert_eq!(rect, None);
    /// ```
    #[inline]
    pub fn from_sides_option(left: i64, bot: i64, right: i64, top: i64) -> Option<Self> {
        if left > right || bot > top {
            None
        } else {
            Some(Self::from_sides(left, bot, right, top))
        }
    }

    /// Creates a zero-area rectangle containing the given point.
    #[inline]
    pub const fn from_point(p: Point) -> Self {
        Self { p0: p, p1: p }
    }

    /// Creates a rectangle from a horizontal and a vertical span.
    pub fn from_spans(hspan: Span, vspan: Span) -> Self {
        Self::from_sides(hspan.start(), vspan.start(), hspan.stop(), vspan.stop())
    }

    /// Creates a rectangle of the given width and height centered at `center`.
    ///
    /// Both dimensions must be even.
    pub fn from_center(center: Point, width: i64, height: i64) -> Self {
        Self::from_spans(
            Span::from_center_span(center.x, width),
            Span::from_center_span(center.y, height),
        )
    }

    /// The left edge.
    #[inline]
    pub const fn left(&self) -> i64 {
        self.p0.x
    }

    /// The bottom edge.
    #[inline]
    pub const fn bot(&self) -> i64 {
        self.p0.y
    }

    /// The right edge.
    #[inline]
    pub const fn right(&self) -> i64 {
        self.p1.x
    }

    /// The top edge.
    #[inline]
    pub const fn top(&self) -> i64 {
        self.p1.y
    }

    /// The lower-left corner.
    #[inline]
    pub const fn lower_left(&self) -> Point {
        self.p0
    }

    /// The upper-right corner.
    #[inline]
    pub const fn upper_right(&self) -> Point {
        self.p1
    }

    /// The width of the rectangle.
    #[inline]
    pub const fn width(&self) -> i64 {
        self.p1.x - self.p0.x
    }

    /// The height of the rectangle.
    #[inline]
    pub const fn height(&self) -> i64 {
        self.p1.y - self.p0.y
    }

    /// The area of the rectangle.
    #[inline]
    pub const fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Returns `true` if the rectangle has zero area.
    #[inline]
    pub const fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Returns the center point of the rectangle, rounded down.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(0, 0, 200, 100);
    /// assert_eq!(rect.center(), Point::new(100, 50));
    /// ```
    pub fn center(&self) -> Point {
        Point::new(self.hspan().center(), self.vspan().center())
    }

    /// The horizontal extent of the rectangle.
    #[inline]
    pub fn hspan(&self) -> Span {
        Span::new(self.p0.x, self.p1.x)
    }

    /// The vertical extent of the rectangle.
    #[inline]
    pub fn vspan(&self) -> Span {
        Span::new(self.p0.y, self.p1.y)
    }

    /// Returns a copy of this rectangle with its horizontal extent replaced.
    pub fn with_hspan(&self, hspan: Span) -> Self {
        Self::from_spans(hspan, self.vspan())
    }

    /// Returns a copy of this rectangle with its vertical extent replaced.
    pub fn with_vspan(&self, vspan: Span) -> Self {
        Self::from_spans(self.hspan(), vspan)
    }

    /// Expands the rectangle by `amount` on all sides.
    ///
    /// Negative amounts shrink the rectangle; it never inverts.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let rect = Rect::from_sides(0, 0, 10, 20);
    /// assert_eq!(rect.expand_all(5), Rect::from_sides(-5, -5, 15, 25));
    /// ```
    pub fn expand_all(&self, amount: i64) -> Self {
        Self::from_spans(self.hspan().expand_all(amount), self.vspan().expand_all(amount))
    }

    /// Translates the rectangle by the given offset.
    pub fn translate(&self, p: Point) -> Self {
        Self {
            p0: self.p0 + p,
            p1: self.p1 + p,
        }
    }

    /// The smallest rectangle containing both `self` and `other`.
    pub fn bounding_union(&self, other: &Rect) -> Self {
        Self::from_spans(self.hspan().union(other.hspan()), self.vspan().union(other.vspan()))
    }

    /// Returns `true` if the point lies inside or on the boundary of the rectangle.
    pub fn contains_point(&self, p: Point) -> bool {
        self.hspan().contains(p.x) && self.vspan().contains(p.y)
    }

    /// Returns `true` if `other` lies entirely within this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.hspan().contains_span(other.hspan()) && self.vspan().contains_span(other.vspan())
    }

    /// Returns `true` if the two rectangles share a region of positive area.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Rect::from_sides(0, 0, 10, 10);
    /// assert!(a.overlaps(&Rect::from_sides(5, 5, 20, 20)));
    /// assert!(!a.overlaps(&Rect::from_sides(10, 0, 20, 10)));
    /// ```
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.intersect(other).is_some_and(|r| r.area() > 0)
    }

    /// Returns `true` if the two rectangles overlap or share an edge segment of positive length.
    ///
    /// Rectangles that meet only at a corner do not touch.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Rect::from_sides(0, 0, 10, 10);
    /// assert!(a.touches(&Rect::from_sides(10, 0, 20, 10)));
    /// assert!(!a.touches(&Rect::from_sides(10, 10, 20, 20)));
    /// ```
    pub fn touches(&self, other: &Rect) -> bool {
        self.intersect(other)
            .is_some_and(|r| r.width() > 0 || r.height() > 0)
    }

    /// The point of this rectangle closest to `p`.
    pub fn nearest_point(&self, p: Point) -> Point {
        Point::new(self.hspan().clamp_coord(p.x), self.vspan().clamp_coord(p.y))
    }

    /// Squared Euclidean distance from `p` to the nearest point of this rectangle.
    pub fn dist2_to(&self, p: Point) -> i64 {
        let q = self.nearest_point(p);
        let (dx, dy) = (q.x - p.x, q.y - p.y);
        dx * dx + dy * dy
    }

    /// Subtracts `other` from this rectangle.
    ///
    /// Returns at most four non-overlapping rectangles of positive area
    /// whose union is `self - other`.
    pub fn subtract(&self, other: &Rect) -> Vec<Rect> {
        let cut = match self.intersect(other) {
            Some(cut) if cut.area() > 0 => cut,
            _ => return if self.area() > 0 { vec![*self] } else { vec![] },
        };
        let pieces = [
            // Full-height strips left and right of the cut.
            Rect::from_sides_option(self.left(), self.bot(), cut.left(), self.top()),
            Rect::from_sides_option(cut.right(), self.bot(), self.right(), self.top()),
            // Strips directly below and above the cut.
            Rect::from_sides_option(cut.left(), self.bot(), cut.right(), cut.bot()),
            Rect::from_sides_option(cut.left(), cut.top(), cut.right(), self.top()),
        ];
        pieces
            .into_iter()
            .flatten()
            .filter(|r| r.area() > 0)
            .collect()
    }
}

impl Bbox for Rect {
    fn bbox(&self) -> Option<Rect> {
        Some(*self)
    }
}

impl Intersect<Rect> for Rect {
    type Output = Self;

    /// Calculates the closed intersection of two rectangles.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let a = Rect::from_sides(0, 0, 10, 10);
    /// let b = Rect::from_sides(5, 5, 20, 20);
    /// assert_eq!(a.intersect(&b), Some(Rect::from_sides(5, 5, 10, 10)));
    /// ```
    fn intersect(&self, other: &Rect) -> Option<Self::Output> {
        let h = self.hspan().intersect(&other.hspan())?;
        let v = self.vspan().intersect(&other.vspan())?;
        Some(Self::from_spans(h, v))
    }
}
