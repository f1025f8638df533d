//! 2-D geometric operations relevant to standard cell layout.
//!
//! All coordinates are integers in database units.
//! Rectangles are closed: a rectangle contains its boundary.
//!
//! # Examples
//!
//! Create a [rectangle](crate::rect::Rect) and a [region](crate::region::Region):
//!
//! ```
//! # use geometry::prelude::*;
//! let rect = Rect::from_sides(10, 20, 30, 40);
//! let region = Region::from(rect).difference(&Region::from(Rect::from_sides(10, 20, 20, 40)));
//! assert_eq!(region.area(), 200);
//! ```
#![warn(missing_docs)]

extern crate self as geometry;

pub mod bbox;
pub mod intersect;
pub mod point;
pub mod prelude;
pub mod rect;
pub mod region;
pub mod span;
