//! An import prelude that re-exports commonly used items.

pub use crate::bbox::Bbox;
pub use crate::intersect::Intersect;
pub use crate::point::Point;
pub use crate::rect::Rect;
pub use crate::region::Region;
pub use crate::span::Span;
