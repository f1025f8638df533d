//! Axis-aligned rectangular bounding boxes.

use crate::rect::Rect;

/// A geometric shape that has a bounding box.
///
/// # Examples
///
/// ```
/// # use geometry::prelude::*;
/// let rect = Rect::from_sides(0, 0, 100, 200);
/// assert_eq!(rect.bbox(), Some(Rect::from_sides(0, 0, 100, 200)));
/// let rects = vec![Rect::from_sides(0, 0, 10, 10), Rect::from_sides(20, 5, 30, 40)];
/// assert_eq!(rects.bbox(), Some(Rect::from_sides(0, 0, 30, 40)));
/// ```
pub trait Bbox {
    /// Computes the axis-aligned rectangular bounding box.
    ///
    /// If empty, this method should return `None`.
    fn bbox(&self) -> Option<Rect>;
}

/// Computes the bounding union of two optional rectangles.
pub fn bounding_union(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.bounding_union(&b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

impl<T> Bbox for &T
where
    T: Bbox,
{
    fn bbox(&self) -> Option<Rect> {
        T::bbox(*self)
    }
}

impl<T: Bbox> Bbox for Vec<T> {
    fn bbox(&self) -> Option<Rect> {
        self.iter()
            .fold(None, |bbox, item| bounding_union(bbox, item.bbox()))
    }
}

impl<T: Bbox> Bbox for [T] {
    fn bbox(&self) -> Option<Rect> {
        self.iter()
            .fold(None, |bbox, item| bounding_union(bbox, item.bbox()))
    }
}

impl Bbox for Option<Rect> {
    fn bbox(&self) -> Option<Rect> {
        *self
    }
}
