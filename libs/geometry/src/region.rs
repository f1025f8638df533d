//! Planar regions built from axis-aligned rectangles.
//!
//! A [`Region`] is a set of points in the plane represented as a list of
//! rectangles of positive area. The rectangles of a region may overlap
//! unless the region has been [normalized](Region::merged).
//!
//! Boolean operations always return regions whose rectangles have positive area;
//! degenerate (zero-width) input rectangles are dropped.

use serde::{Deserialize, Serialize};

use crate::bbox::{bounding_union, Bbox};
use crate::intersect::Intersect;
use crate::point::Point;
use crate::rect::Rect;

/// A set of points in the plane, stored as a union of rectangles.
#[derive(Debug, Default, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    /// Creates an empty region.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a region from the given rectangles.
    ///
    /// Zero-area rectangles are discarded.
    pub fn from_rects(rects: impl IntoIterator<Item = Rect>) -> Self {
        Self {
            rects: rects.into_iter().filter(|r| r.area() > 0).collect(),
        }
    }

    /// The rectangles making up this region.
    #[inline]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Returns `true` if the region contains no area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Adds a rectangle to the region.
    pub fn insert(&mut self, rect: Rect) {
        if rect.area() > 0 {
            self.rects.push(rect);
        }
    }

    /// The union of two regions.
    pub fn union(&self, other: &Region) -> Region {
        let mut rects = self.rects.clone();
        rects.extend_from_slice(&other.rects);
        Region { rects }.merged()
    }

    /// The points of `self` that do not lie in the interior of `other`.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let diff = Region::from(Rect::from_sides(0, 0, 100, 20));
    /// let gate = Region::from(Rect::from_sides(40, -10, 60, 30));
    /// let sd = diff.difference(&gate);
    /// assert_eq!(sd.area(), 1600);
    /// assert_eq!(sd.pieces().len(), 2);
    /// ```
    pub fn difference(&self, other: &Region) -> Region {
        let mut pieces = self.rects.clone();
        for cut in other.rects.iter() {
            pieces = pieces
                .into_iter()
                .flat_map(|piece| piece.subtract(cut))
                .collect();
        }
        Region { rects: pieces }.merged()
    }

    /// The intersection of two regions.
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// let poly = Region::from(Rect::from_sides(40, -10, 60, 30));
    /// let diff = Region::from(Rect::from_sides(0, 0, 100, 20));
    /// assert_eq!(poly.intersection(&diff).rects(), &[Rect::from_sides(40, 0, 60, 20)]);
    /// ```
    pub fn intersection(&self, other: &Region) -> Region {
        let mut rects = Vec::new();
        for a in self.rects.iter() {
            for b in other.rects.iter() {
                if let Some(r) = a.intersect(b) {
                    if r.area() > 0 {
                        rects.push(r);
                    }
                }
            }
        }
        Region { rects }.merged()
    }

    /// The total area covered by the region.
    ///
    /// Overlapping rectangles are only counted once.
    pub fn area(&self) -> i64 {
        self.merged().rects.iter().map(Rect::area).sum()
    }

    /// Returns `true` if `p` lies inside the region or on its boundary.
    pub fn contains_point(&self, p: Point) -> bool {
        self.rects.iter().any(|r| r.contains_point(p))
    }

    /// Returns `true` if every point of `rect` lies in the region.
    ///
    /// Degenerate rectangles are tested by their endpoints and center.
    pub fn contains_rect(&self, rect: &Rect) -> bool {
        if rect.area() == 0 {
            return [rect.lower_left(), rect.center(), rect.upper_right()]
                .into_iter()
                .all(|p| self.contains_point(p));
        }
        Region::from(*rect).difference(self).is_empty()
    }

    /// Returns `true` if the region shares positive area with `rect`.
    pub fn overlaps(&self, rect: &Rect) -> bool {
        self.rects.iter().any(|r| r.overlaps(rect))
    }

    /// The point of the region closest to `p`, or [`None`] if the region is empty.
    ///
    /// Ties are broken in favor of the rectangle listed first.
    pub fn nearest_point(&self, p: Point) -> Option<Point> {
        self.rects
            .iter()
            .min_by_key(|r| r.dist2_to(p))
            .map(|r| r.nearest_point(p))
    }

    /// Splits the region into its connected pieces.
    ///
    /// Rectangles that overlap or share an edge segment belong to the same piece;
    /// rectangles meeting only at a corner do not.
    pub fn pieces(&self) -> Vec<Region> {
        let rects = &self.merged().rects;
        let mut parent: Vec<usize> = (0..rects.len()).collect();
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                if rects[i].touches(&rects[j]) {
                    let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                    if a != b {
                        parent[b.max(a)] = a.min(b);
                    }
                }
            }
        }
        let mut roots: Vec<usize> = Vec::new();
        let mut out: Vec<Region> = Vec::new();
        for (i, rect) in rects.iter().enumerate() {
            let root = find(&mut parent, i);
            match roots.iter().position(|&r| r == root) {
                Some(idx) => out[idx].rects.push(*rect),
                None => {
                    roots.push(root);
                    out.push(Region { rects: vec![*rect] });
                }
            }
        }
        out
    }

    /// Returns an equivalent region made of non-overlapping rectangles.
    ///
    /// The plane is cut into a grid along every rectangle edge. Covered grid cells are
    /// merged first into maximal horizontal runs, then runs with identical
    /// horizontal extent in adjacent rows are stacked.
    /// The output is deterministic: rectangles are sorted bottom-to-top, then left-to-right.
    pub fn merged(&self) -> Region {
        if self.rects.len() <= 1 {
            return self.clone();
        }
        let mut xs: Vec<i64> = self.rects.iter().flat_map(|r| [r.left(), r.right()]).collect();
        let mut ys: Vec<i64> = self.rects.iter().flat_map(|r| [r.bot(), r.top()]).collect();
        xs.sort_unstable();
        xs.dedup();
        ys.sort_unstable();
        ys.dedup();

        // Horizontal runs per row band, as (x0, x1) index pairs into `xs`.
        let mut bands: Vec<Vec<(usize, usize)>> = Vec::with_capacity(ys.len().saturating_sub(1));
        for j in 0..ys.len().saturating_sub(1) {
            let cy2 = ys[j] + ys[j + 1];
            let mut runs = Vec::new();
            let mut start: Option<usize> = None;
            for i in 0..xs.len() - 1 {
                let cx2 = xs[i] + xs[i + 1];
                let covered = self.rects.iter().any(|r| {
                    2 * r.left() < cx2 && cx2 < 2 * r.right() && 2 * r.bot() < cy2 && cy2 < 2 * r.top()
                });
                match (covered, start) {
                    (true, None) => start = Some(i),
                    (false, Some(s)) => {
                        runs.push((s, i));
                        start = None;
                    }
                    _ => {}
                }
            }
            if let Some(s) = start {
                runs.push((s, xs.len() - 1));
            }
            bands.push(runs);
        }

        let mut out = Vec::new();
        // Open rectangles: run -> starting band.
        let mut open: Vec<((usize, usize), usize)> = Vec::new();
        for (j, runs) in bands.iter().enumerate() {
            let mut next_open = Vec::new();
            for (run, start) in open.into_iter() {
                if runs.contains(&run) {
                    next_open.push((run, start));
                } else {
                    out.push(Rect::from_sides(xs[run.0], ys[start], xs[run.1], ys[j]));
                }
            }
            for run in runs {
                if !next_open.iter().any(|(r, _)| r == run) {
                    next_open.push((*run, j));
                }
            }
            open = next_open;
        }
        let last = bands.len();
        for (run, start) in open {
            out.push(Rect::from_sides(xs[run.0], ys[start], xs[run.1], ys[last]));
        }
        out.sort_by_key(|r| (r.bot(), r.left(), r.top(), r.right()));
        Region { rects: out }
    }
}

impl From<Rect> for Region {
    fn from(value: Rect) -> Self {
        Self::from_rects([value])
    }
}

impl FromIterator<Rect> for Region {
    fn from_iter<T: IntoIterator<Item = Rect>>(iter: T) -> Self {
        Self::from_rects(iter)
    }
}

impl Bbox for Region {
    fn bbox(&self) -> Option<Rect> {
        self.rects
            .iter()
            .fold(None, |bbox, r| bounding_union(bbox, Some(*r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overlapping_rects() {
        let region = Region::from_rects([
            Rect::from_sides(0, 0, 10, 10),
            Rect::from_sides(5, 0, 15, 10),
        ]);
        let merged = region.merged();
        assert_eq!(merged.rects(), &[Rect::from_sides(0, 0, 15, 10)]);
        assert_eq!(region.area(), 150);
    }

    #[test]
    fn merge_l_shape_is_exact() {
        let region = Region::from_rects([
            Rect::from_sides(0, 0, 30, 10),
            Rect::from_sides(0, 0, 10, 30),
        ]);
        let merged = region.merged();
        assert_eq!(merged.area(), 300 + 200);
        assert_eq!(merged.rects().len(), 2);
        for (i, a) in merged.rects().iter().enumerate() {
            for b in &merged.rects()[i + 1..] {
                assert!(!a.overlaps(b));
            }
        }
    }

    #[test]
    fn difference_splits_into_pieces() {
        let diff = Region::from(Rect::from_sides(0, 0, 200, 40));
        let gates = Region::from_rects([
            Rect::from_sides(40, -10, 60, 50),
            Rect::from_sides(140, -10, 160, 50),
        ]);
        let sd = diff.difference(&gates);
        let pieces = sd.pieces();
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].bbox(), Some(Rect::from_sides(0, 0, 40, 40)));
        assert_eq!(pieces[1].bbox(), Some(Rect::from_sides(60, 0, 140, 40)));
        assert_eq!(pieces[2].bbox(), Some(Rect::from_sides(160, 0, 200, 40)));
    }

    #[test]
    fn containment_queries() {
        let region = Region::from_rects([
            Rect::from_sides(0, 0, 10, 10),
            Rect::from_sides(10, 0, 20, 10),
        ]);
        assert!(region.contains_rect(&Rect::from_sides(5, 2, 15, 8)));
        assert!(!region.contains_rect(&Rect::from_sides(5, 2, 25, 8)));
        assert!(region.contains_point(Point::new(20, 10)));
        assert!(!region.contains_point(Point::new(21, 10)));
        assert_eq!(region.nearest_point(Point::new(30, 5)), Some(Point::new(20, 5)));
        assert_eq!(Region::new().nearest_point(Point::zero()), None);
    }

    #[test]
    fn corner_contact_is_not_connected() {
        let region = Region::from_rects([
            Rect::from_sides(0, 0, 10, 10),
            Rect::from_sides(10, 10, 20, 20),
        ]);
        assert_eq!(region.pieces().len(), 2);
    }
}
