//! Device drawing.
//!
//! Converts placed (and possibly folded) cells into [`Shapes`] on the routing grid.
//! Tier `t` of a multi-height cell occupies tracks `t * (T - 1)` through
//! `(t + 1) * (T - 1)`, where `T` is the single-height track count; odd tiers are
//! mirrored so that adjacent tiers share a rail.

use std::collections::HashMap;

use arcstr::ArcStr;
use geometry::prelude::*;

use crate::cell::{Cell, Row};
use crate::error::{Error, Result};
use crate::netlist::{CellNetlist, ChannelType};
use crate::shapes::{Label, Shape, Shapes};
use crate::tech::{Layer, Supply, TechKind, Technology};

/// The number of grid columns spanned by a folded cell.
pub fn columns(tiers: &[Cell]) -> usize {
    tiers.iter().map(Cell::columns).max().unwrap_or(1)
}

/// The net on S/D column `col` of `row`.
fn sd_net(row: &Row, col: usize) -> Option<&ArcStr> {
    let k = col / 2;
    k.checked_sub(1)
        .and_then(|i| row.get(i))
        .and_then(Option::as_ref)
        .map(|t| &t.drain)
        .or_else(|| row.get(k).and_then(Option::as_ref).map(|t| &t.source))
}

/// A vertical stripe of the given width centered on `x`.
fn stripe(x: i64, width: i64, bot: i64, top: i64) -> Rect {
    let left = x - width / 2;
    Rect::from_sides(left, bot.min(top), left + width, bot.max(top))
}

/// The smallest interval containing both `a` and `b`.
fn hull(a: (i64, i64), b: (i64, i64)) -> (i64, i64) {
    (a.0.min(b.0), a.1.max(b.1))
}

/// The row of a cell holding devices of the given channel type.
fn row(cell: &Cell, channel: ChannelType) -> &Row {
    match channel {
        ChannelType::Nmos => &cell.lower,
        ChannelType::Pmos => &cell.upper,
    }
}

struct Drawer<'a> {
    tech: &'a Technology,
    netlist: &'a CellNetlist,
    columns: usize,
    /// The number of S/D and gate sites at which each net appears.
    sites: HashMap<ArcStr, usize>,
    shapes: Shapes,
}

impl<'a> Drawer<'a> {
    fn new(tiers: &[Cell], tech: &'a Technology, netlist: &'a CellNetlist) -> Self {
        let mut sites: HashMap<ArcStr, usize> = HashMap::new();
        for cell in tiers {
            for channel in [ChannelType::Nmos, ChannelType::Pmos] {
                let row = row(cell, channel);
                for col in (0..cell.columns()).step_by(2) {
                    if let Some(net) = sd_net(row, col) {
                        *sites.entry(net.clone()).or_default() += 1;
                    }
                }
                for t in row.iter().flatten() {
                    *sites.entry(t.gate.clone()).or_default() += 1;
                }
            }
        }
        Self {
            tech,
            netlist,
            columns: columns(tiers),
            sites,
            shapes: Shapes::new(),
        }
    }

    /// The global track of local track `local` in tier `tier`.
    fn track(&self, tier: usize, local: usize) -> usize {
        let base = tier * (self.tech.tracks - 1);
        if tier % 2 == 0 {
            base + local
        } else {
            base + (self.tech.tracks - 1 - local)
        }
    }

    /// The vertical extent of local tracks `lo..=hi` in `tier`, grown by `ext` on both ends.
    fn extent(&self, tier: usize, lo: usize, hi: usize, ext: i64) -> (i64, i64) {
        let (a, b) = (
            self.tech.y(self.track(tier, lo)),
            self.tech.y(self.track(tier, hi)),
        );
        (a.min(b) - ext, a.max(b) + ext)
    }

    /// The vertical extent of local tracks `lo..=hi`, stretched to the center of
    /// the local rail track `rail` and one landing extension beyond it.
    fn extent_to_rail(&self, tier: usize, lo: usize, hi: usize, rail: usize, ext: i64) -> (i64, i64) {
        let (bot, top) = self.extent(tier, lo, hi, ext);
        let (rb, rt) = self.extent(tier, rail, rail, ext);
        (bot.min(rb), top.max(rt))
    }

    /// Returns `true` if an S/D contact must be drawn for `net`.
    fn needs_contact(&self, net: &ArcStr) -> bool {
        self.netlist.is_io(net)
            || self.netlist.power.contains(net)
            || self.sites.get(net).copied().unwrap_or_default() > 1
    }

    /// The local rail track a contact of `net` in a row of `channel` extends to.
    fn rail_for(&self, net: &str, channel: ChannelType) -> Option<usize> {
        match (self.netlist.power.supply(net)?, channel) {
            (Supply::Vss, ChannelType::Nmos) => Some(0),
            (Supply::Vdd, ChannelType::Pmos) => Some(self.tech.tracks - 1),
            _ => None,
        }
    }

    fn draw_rails(&mut self) {
        let tech = self.tech;
        let half = tech.step_x() / 2;
        let (left, right) = (tech.x(0) - half, tech.x(self.columns - 1) + half);
        let width = tech.width(Layer::Metal1);
        for (track, supply) in tech.rails() {
            let net = self.netlist.power.net(supply).clone();
            let y = tech.y(track);
            let bot = y - width / 2;
            self.shapes.add_rect(
                Layer::Metal1,
                Rect::from_sides(left, bot, right, bot + width),
                net.clone(),
            );
            self.shapes.add_label(Label {
                layer: Layer::Metal1,
                text: net,
                at: Point::new(tech.x(0), y),
                pin: false,
            });
        }
    }

    /// Draws one diffusion rectangle per maximal run of transistors in `row`.
    fn draw_diffusion(&mut self, row: &Row, channel: ChannelType, tier: usize, lo: usize, hi: usize) {
        let tech = self.tech;
        let layer = Layer::diffusion(channel);
        let w = tech.width(Layer::DiffCon).max(tech.width(layer));
        let (bot, top) = self.extent(tier, lo, hi, tech.landing_extension(Layer::DiffCon));
        let mut k = 0;
        while k < row.len() {
            if row[k].is_none() {
                k += 1;
                continue;
            }
            let start = k;
            while k < row.len() && row[k].is_some() {
                k += 1;
            }
            let rect = Rect::from_sides(
                tech.x(2 * start) - w / 2,
                bot,
                tech.x(2 * k) - w / 2 + w,
                top,
            );
            self.shapes.add(layer, Shape { rect, net: None });
        }
    }

    /// Draws a gate contact over local tracks `lo..=hi`.
    fn draw_gate_con(&mut self, tier: usize, col: usize, lo: usize, hi: usize, net: &ArcStr) {
        let tech = self.tech;
        let (bot, top) = self.extent(tier, lo, hi, tech.landing_extension(Layer::GateCon));
        self.shapes.add_rect(
            Layer::GateCon,
            stripe(tech.x(col), tech.width(Layer::GateCon), bot, top),
            net.clone(),
        );
    }

    fn draw_poly(&mut self, col: usize, (bot, top): (i64, i64), net: &ArcStr) {
        let tech = self.tech;
        self.shapes.add_rect(
            Layer::Poly,
            stripe(tech.x(col), tech.width(Layer::Poly), bot, top),
            net.clone(),
        );
    }

    /// Draws the gates of one tier in a planar technology.
    fn draw_planar_gates(&mut self, cell: &Cell, tier: usize) {
        let t = self.tech.tracks;
        let dt = self.tech.diffusion_tracks;
        let overhang = self.tech.m1_pitch / 2;
        let ext_gc = self.tech.landing_extension(Layer::GateCon);
        // Gate contact tracks lie between the two diffusion rows.
        let (mid_lo, mid_hi) = (dt + 1, t - 2 - dt);
        let split = dt + (mid_hi + 1 - mid_lo) / 2;

        for (k, (upper, lower)) in cell.upper.iter().zip(cell.lower.iter()).enumerate() {
            let col = 2 * k + 1;
            match (lower, upper) {
                (Some(n), Some(p)) if n.gate == p.gate => {
                    let span = self.extent(tier, 1, t - 2, overhang);
                    self.draw_poly(col, span, &n.gate);
                    self.draw_gate_con(tier, col, mid_lo, mid_hi, &n.gate);
                }
                (Some(n), Some(p)) => {
                    let n_span = hull(
                        self.extent(tier, 1, 1, overhang),
                        self.extent(tier, split, split, ext_gc),
                    );
                    let p_span = hull(
                        self.extent(tier, split + 1, split + 1, ext_gc),
                        self.extent(tier, t - 2, t - 2, overhang),
                    );
                    self.draw_poly(col, n_span, &n.gate);
                    self.draw_poly(col, p_span, &p.gate);
                    self.draw_gate_con(tier, col, mid_lo, split, &n.gate);
                    self.draw_gate_con(tier, col, split + 1, mid_hi, &p.gate);
                }
                (Some(n), None) => {
                    let span = hull(
                        self.extent(tier, 1, dt, overhang),
                        self.extent(tier, mid_lo, mid_hi, ext_gc),
                    );
                    self.draw_poly(col, span, &n.gate);
                    self.draw_gate_con(tier, col, mid_lo, mid_hi, &n.gate);
                }
                (None, Some(p)) => {
                    let span = hull(
                        self.extent(tier, t - 1 - dt, t - 2, overhang),
                        self.extent(tier, mid_lo, mid_hi, ext_gc),
                    );
                    self.draw_poly(col, span, &p.gate);
                    self.draw_gate_con(tier, col, mid_lo, mid_hi, &p.gate);
                }
                (None, None) => {}
            }
        }
    }

    /// Draws the S/D contacts of one row in a planar technology.
    fn draw_planar_contacts(&mut self, cell: &Cell, channel: ChannelType, tier: usize) {
        let tech = self.tech;
        let (t, dt) = (tech.tracks, tech.diffusion_tracks);
        let (lo, hi) = match channel {
            ChannelType::Nmos => (1, dt),
            ChannelType::Pmos => (t - 1 - dt, t - 2),
        };
        let layer = tech.sd_contact(channel);
        let ext = tech.landing_extension(layer);
        let row = row(cell, channel);
        for col in (0..cell.columns()).step_by(2) {
            let Some(net) = sd_net(row, col) else {
                continue;
            };
            if !self.needs_contact(net) {
                continue;
            }
            let (bot, top) = match self.rail_for(net, channel) {
                Some(rail) => self.extent_to_rail(tier, lo, hi, rail, ext),
                None => self.extent(tier, lo, hi, ext),
            };
            self.shapes.add_rect(
                layer,
                stripe(tech.x(col), tech.width(layer), bot, top),
                net.clone(),
            );
        }
    }

    fn draw_planar(&mut self, cell: &Cell, tier: usize) {
        let (t, dt) = (self.tech.tracks, self.tech.diffusion_tracks);
        self.draw_diffusion(&cell.lower, ChannelType::Nmos, tier, 1, dt);
        self.draw_diffusion(&cell.upper, ChannelType::Pmos, tier, t - 1 - dt, t - 2);
        self.draw_planar_gates(cell, tier);
        self.draw_planar_contacts(cell, ChannelType::Nmos, tier);
        self.draw_planar_contacts(cell, ChannelType::Pmos, tier);
    }

    /// Draws a stacked cell. Both rows cover every internal track.
    ///
    /// Where both tiers need a contact on one column, differing nets split the
    /// internal tracks between the tiers and equal nets share all of them.
    fn draw_cfet(&mut self, cell: &Cell) {
        let tech = self.tech;
        let t = tech.tracks;
        let overhang = tech.m1_pitch / 2;
        let mid = (t - 1) / 2;
        self.draw_diffusion(&cell.lower, ChannelType::Nmos, 0, 1, t - 2);
        self.draw_diffusion(&cell.upper, ChannelType::Pmos, 0, 1, t - 2);

        for (k, (upper, lower)) in cell.upper.iter().zip(cell.lower.iter()).enumerate() {
            let Some(gate) = lower.as_ref().or(upper.as_ref()).map(|t| &t.gate) else {
                continue;
            };
            let col = 2 * k + 1;
            let span = self.extent(0, 1, t - 2, overhang);
            self.draw_poly(col, span, gate);
            self.draw_gate_con(0, col, 1, t - 2, gate);
        }

        for col in (0..cell.columns()).step_by(2) {
            let lower = sd_net(&cell.lower, col).filter(|n| self.needs_contact(n)).cloned();
            let upper = sd_net(&cell.upper, col).filter(|n| self.needs_contact(n)).cloned();
            let (lower_tracks, upper_tracks) = match (&lower, &upper) {
                (Some(l), Some(u)) if l != u => ((1, mid), (mid + 1, t - 2)),
                _ => ((1, t - 2), (1, t - 2)),
            };
            for (net, channel, (lo, hi)) in [
                (lower, ChannelType::Nmos, lower_tracks),
                (upper, ChannelType::Pmos, upper_tracks),
            ] {
                let Some(net) = net else {
                    continue;
                };
                let layer = tech.sd_contact(channel);
                let ext = tech.landing_extension(layer);
                let (bot, top) = match self.rail_for(&net, channel) {
                    Some(rail) => self.extent_to_rail(0, lo, hi, rail, ext),
                    None => self.extent(0, lo, hi, ext),
                };
                self.shapes
                    .add_rect(layer, stripe(tech.x(col), tech.width(layer), bot, top), net);
            }
        }
    }
}

/// Draws the devices and supply rails of a folded cell.
///
/// `tiers` holds one cell per tier, bottom first.
pub fn draw(tiers: &[Cell], tech: &Technology, netlist: &CellNetlist) -> Result<Shapes> {
    let _guard = tracing::info_span!("draw", cell = %netlist.name, tech = %tech.name).entered();
    if tiers.len() != tech.kind.tiers() {
        return Err(Error::invariant(format!(
            "{} tiers given for a technology with {} tiers",
            tiers.len(),
            tech.kind.tiers()
        )));
    }
    if tech.tracks < 2 {
        return Err(Error::invariant(format!(
            "cannot draw a cell with {} tracks",
            tech.tracks
        )));
    }

    let mut drawer = Drawer::new(tiers, tech, netlist);
    drawer.draw_rails();
    for (tier, cell) in tiers.iter().enumerate() {
        match tech.kind {
            TechKind::Cfet => drawer.draw_cfet(cell),
            TechKind::Gaa | TechKind::Finfet | TechKind::MultiheightGaa => {
                drawer.draw_planar(cell, tier)
            }
        }
    }
    let shapes = drawer.shapes;
    tracing::debug!(
        columns = drawer.columns,
        shapes = shapes.len(),
        "drew devices"
    );
    Ok(shapes)
}
