//! Abstract two-row cells.
//!
//! A [`Cell`] of width `W` has `W` slots per row. Slot `k` places its gate on
//! grid column `2k + 1` and its source and drain on columns `2k` and `2k + 2`,
//! so adjacent transistors in a row share a diffusion column.

use std::collections::HashMap;
use std::fmt::Display;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::netlist::{PowerNets, Transistor};

/// A row of transistor slots. [`None`] is a diffusion break.
pub type Row = Vec<Option<Transistor>>;

/// A placed cell: PMOS slots in the upper row, NMOS slots in the lower row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    /// The PMOS row.
    pub upper: Row,
    /// The NMOS row.
    pub lower: Row,
}

/// The number of grid columns spanned by `slots` slots.
#[inline]
pub const fn columns(slots: usize) -> usize {
    2 * slots + 1
}

/// Returns `true` if adjacent transistors in `row` share their diffusion net.
pub fn row_is_consistent(row: &[Option<Transistor>]) -> bool {
    row.windows(2).all(|w| match (&w[0], &w[1]) {
        (Some(a), Some(b)) => a.drain == b.source,
        _ => true,
    })
}

/// Removes leading and trailing gaps, and collapses runs of gaps into one.
pub fn trim_row(row: &[Option<Transistor>]) -> Row {
    let mut out: Row = Vec::with_capacity(row.len());
    for slot in row {
        if slot.is_none() && out.last().map_or(true, |s| s.is_none()) {
            continue;
        }
        out.push(slot.clone());
    }
    while out.last().is_some_and(|s| s.is_none()) {
        out.pop();
    }
    out
}

/// The row read right to left, with every transistor flipped.
pub fn mirror_row(row: &[Option<Transistor>]) -> Row {
    row.iter()
        .rev()
        .map(|slot| slot.as_ref().map(Transistor::flipped))
        .collect()
}

/// Joins rows left to right with one gap between them, then drops every gap
/// whose neighbours share their diffusion net.
pub fn join_rows<'a>(rows: impl IntoIterator<Item = &'a [Option<Transistor>]>) -> Row {
    let mut out: Row = Vec::new();
    for row in rows {
        if !out.is_empty() {
            out.push(None);
        }
        out.extend(row.iter().cloned());
    }
    compact_row(&out)
}

/// Drops every gap whose neighbours share their diffusion net.
pub fn compact_row(row: &[Option<Transistor>]) -> Row {
    let mut out: Row = Vec::with_capacity(row.len());
    for (i, slot) in row.iter().enumerate() {
        if slot.is_none() {
            if let (Some(Some(prev)), Some(Some(next))) = (out.last(), row.get(i + 1)) {
                if prev.drain == next.source {
                    continue;
                }
            }
        }
        out.push(slot.clone());
    }
    trim_row(&out)
}

impl Cell {
    /// Creates a cell from two rows, padding the shorter row with trailing gaps.
    pub fn new(mut upper: Row, mut lower: Row) -> Self {
        let width = upper.len().max(lower.len());
        upper.resize(width, None);
        lower.resize(width, None);
        Self { upper, lower }
    }

    /// Every alignment of two rows: the narrower row is placed at each
    /// horizontal offset inside the wider one.
    pub fn alignments(upper: &[Option<Transistor>], lower: &[Option<Transistor>]) -> Vec<Cell> {
        let width = upper.len().max(lower.len());
        let shift = |row: &[Option<Transistor>], offset: usize| {
            let mut out: Row = vec![None; offset];
            out.extend(row.iter().cloned());
            out.resize(width, None);
            out
        };
        let (narrow, upper_is_narrow) = if upper.len() <= lower.len() {
            (upper, true)
        } else {
            (lower, false)
        };
        (0..=(width - narrow.len()))
            .map(|offset| {
                if upper_is_narrow {
                    Cell::new(shift(upper, offset), lower.to_vec())
                } else {
                    Cell::new(upper.to_vec(), shift(lower, offset))
                }
            })
            .collect()
    }

    /// The number of slots per row.
    #[inline]
    pub fn width(&self) -> usize {
        self.upper.len()
    }

    /// The number of grid columns spanned by this cell.
    #[inline]
    pub fn columns(&self) -> usize {
        columns(self.width())
    }

    /// Returns `true` if the cell contains no transistors.
    pub fn is_empty(&self) -> bool {
        self.transistors().next().is_none()
    }

    /// All transistors in the cell, upper row first.
    pub fn transistors(&self) -> impl Iterator<Item = &Transistor> {
        self.upper.iter().chain(self.lower.iter()).flatten()
    }

    /// The number of slots in which both rows hold transistors driven by the same gate net.
    pub fn gate_sharing(&self) -> usize {
        self.upper
            .iter()
            .zip(self.lower.iter())
            .filter(|(u, l)| match (u, l) {
                (Some(u), Some(l)) => u.gate == l.gate,
                _ => false,
            })
            .count()
    }

    /// Returns `true` if every slot holding two transistors has one gate net.
    ///
    /// Required by stacked technologies, where both rows share one poly stripe.
    pub fn gates_aligned(&self) -> bool {
        self.upper
            .iter()
            .zip(self.lower.iter())
            .all(|(u, l)| match (u, l) {
                (Some(u), Some(l)) => u.gate == l.gate,
                _ => true,
            })
    }

    /// Returns `true` if the rows have equal widths and adjacent transistors
    /// share their diffusion net.
    pub fn is_consistent(&self) -> bool {
        self.upper.len() == self.lower.len()
            && row_is_consistent(&self.upper)
            && row_is_consistent(&self.lower)
    }

    /// The grid columns at which each net appears.
    fn net_columns(&self) -> HashMap<&ArcStr, (usize, usize)> {
        let mut extents: HashMap<&ArcStr, (usize, usize)> = HashMap::new();
        let mut add = |net, col: usize| {
            let e = extents.entry(net).or_insert((col, col));
            e.0 = e.0.min(col);
            e.1 = e.1.max(col);
        };
        for row in [&self.upper, &self.lower] {
            for (k, t) in row.iter().enumerate() {
                if let Some(t) = t {
                    add(&t.source, 2 * k);
                    add(&t.gate, 2 * k + 1);
                    add(&t.drain, 2 * k + 2);
                }
            }
        }
        extents
    }

    /// The total horizontal extent of all signal nets, in grid columns.
    pub fn wiring_length(&self, power: &PowerNets) -> usize {
        self.net_columns()
            .into_iter()
            .filter(|(net, _)| !power.contains(net))
            .map(|(_, (lo, hi))| hi - lo)
            .sum()
    }

    /// Removes columns that are gaps in both rows, unless removing them would
    /// join two transistors with different diffusion nets.
    pub fn compact(&self) -> Cell {
        let mut cell = self.clone();
        let mut k = 0;
        while k < cell.width() {
            let removable = cell.upper[k].is_none()
                && cell.lower[k].is_none()
                && [&cell.upper, &cell.lower].into_iter().all(|row| {
                    match (k.checked_sub(1).and_then(|i| row.get(i)), row.get(k + 1)) {
                        (Some(Some(prev)), Some(Some(next))) => prev.drain == next.source,
                        _ => true,
                    }
                });
            if removable {
                cell.upper.remove(k);
                cell.lower.remove(k);
            } else {
                k += 1;
            }
        }
        cell
    }

    /// Splits the cell into `tiers` consecutive pieces of at most `ceil(W / tiers)`
    /// slots each, bottom tier first.
    ///
    /// Each piece is [compacted](Cell::compact), so no piece starts or ends with an empty column.
    pub fn fold(&self, tiers: usize) -> Vec<Cell> {
        let tiers = tiers.max(1);
        let chunk = self.width().div_ceil(tiers).max(1);
        let mut out: Vec<Cell> = self
            .upper
            .chunks(chunk)
            .zip(self.lower.chunks(chunk))
            .map(|(u, l)| Cell::new(u.to_vec(), l.to_vec()).compact())
            .collect();
        out.resize(tiers, Cell::default());
        out
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in [&self.upper, &self.lower] {
            let names: Vec<&str> = row
                .iter()
                .map(|slot| slot.as_ref().map(|t| t.name.as_str()).unwrap_or("_"))
                .collect();
            writeln!(f, "[{}]", names.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::ChannelType;

    fn n(name: &str, s: &str, g: &str, d: &str) -> Option<Transistor> {
        Some(Transistor::new(name, ChannelType::Nmos, s, g, d))
    }

    fn p(name: &str, s: &str, g: &str, d: &str) -> Option<Transistor> {
        Some(Transistor::new(name, ChannelType::Pmos, s, g, d))
    }

    fn nand2() -> Cell {
        Cell::new(
            vec![p("p0", "vdd", "a", "y"), p("p1", "y", "b", "vdd")],
            vec![n("n0", "vss", "a", "x"), n("n1", "x", "b", "y")],
        )
    }

    #[test]
    fn nand2_metrics() {
        let cell = nand2();
        assert!(cell.is_consistent());
        assert_eq!(cell.columns(), 5);
        assert_eq!(cell.gate_sharing(), 2);
        assert!(cell.gates_aligned());
        // y spans columns 2..=4; a, b and x span nothing.
        assert_eq!(cell.wiring_length(&PowerNets::default()), 2);
    }

    #[test]
    fn inconsistent_rows_are_detected() {
        let cell = Cell::new(vec![], vec![n("n0", "vss", "a", "x"), n("n1", "y", "b", "z")]);
        assert!(!cell.is_consistent());
        assert!(!row_is_consistent(&cell.lower));
    }

    #[test]
    fn compact_keeps_gaps_that_prevent_shorts() {
        let cell = Cell::new(
            vec![None, p("p0", "vdd", "a", "y"), None, None, p("p1", "z", "b", "vdd"), None],
            vec![None, n("n0", "vss", "a", "y"), None, None, n("n1", "y", "b", "vss"), None],
        );
        let compact = cell.compact();
        assert_eq!(compact.width(), 3);
        assert!(compact.upper[1].is_none());
        assert!(compact.is_consistent());
    }

    #[test]
    fn compact_drops_shared_gaps() {
        let cell = Cell::new(
            vec![p("p0", "vdd", "a", "y"), None, p("p1", "y", "b", "vdd")],
            vec![n("n0", "vss", "a", "x"), None, n("n1", "x", "b", "y")],
        );
        assert_eq!(cell.compact(), nand2());
    }

    #[test]
    fn alignments_cover_every_offset() {
        let wide = vec![n("n0", "vss", "a", "x"), n("n1", "x", "b", "y"), n("n2", "y", "c", "z")];
        let narrow = vec![p("p0", "vdd", "a", "y")];
        let cells = Cell::alignments(&narrow, &wide);
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].gate_sharing(), 1);
        assert_eq!(cells[1].gate_sharing(), 0);
        assert!(cells.iter().all(|c| c.width() == 3 && c.lower == wide));
    }

    #[test]
    fn row_helpers() {
        let row = vec![None, n("n0", "a", "g", "b"), None, None, n("n1", "c", "h", "d"), None];
        let trimmed = trim_row(&row);
        assert_eq!(trimmed.len(), 3);
        let mirrored = mirror_row(&trimmed);
        assert_eq!(mirrored[0].as_ref().unwrap().source, "d");
        assert_eq!(mirrored[2].as_ref().unwrap().drain, "a");

        let left = [n("n0", "a", "g", "b")];
        let right = [n("n1", "b", "h", "c")];
        assert_eq!(join_rows([&left[..], &right[..]]).len(), 2);
        let apart = [n("n2", "z", "h", "c")];
        assert_eq!(join_rows([&left[..], &apart[..]]).len(), 3);
    }

    #[test]
    fn fold_into_two_tiers() {
        let cell = Cell::new(
            vec![p("p0", "vdd", "a", "y"), p("p1", "y", "b", "vdd"), p("p2", "vdd", "c", "y")],
            vec![n("n0", "vss", "a", "x"), n("n1", "x", "b", "w"), n("n2", "w", "c", "y")],
        );
        let tiers = cell.fold(2);
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[0].width(), 2);
        assert_eq!(tiers[1].width(), 1);
        assert_eq!(tiers[1].upper[0].as_ref().unwrap().name, "p2");
        assert_eq!(cell.fold(1), vec![cell.clone()]);
    }
}
