//! Technology rules and canonical layers.
//!
//! A [`Technology`] is produced by an external adapter and is read-only for the
//! duration of a synthesis run. Its rule tables are plain lists of records so that
//! it can be written as TOML:
//!
//! ```toml
//! name = "gaa_5t"
//! kind = "gaa"
//! routing = "two_metal"
//! cpp = 90
//! m1_pitch = 40
//! tracks = 8
//! diffusion_tracks = 2
//!
//! [[layers]]
//! layer = "metal1"
//! width = 20
//!
//! [[vias]]
//! via = "via0"
//! width = 16
//! height = 16
//! enclosure = 2
//! ```

pub mod layer_map;
pub mod validation;

use std::fmt::Display;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::netlist::ChannelType;

pub use layer_map::{CfetLayers, LayerMap, PlanarLayers};
pub use validation::{Cause, Severity, TechIssue, TechIssues};

/// A canonical layout layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// N-type diffusion.
    Ndiff,
    /// P-type diffusion.
    Pdiff,
    /// Gate polysilicon.
    Poly,
    /// Source/drain contact. The lower tier in stacked technologies.
    DiffCon,
    /// Upper tier source/drain contact in stacked technologies.
    DiffConTop,
    /// Gate contact.
    GateCon,
    /// Via from a contact to metal 1.
    Via0,
    /// Via from a gate contact to metal 1.
    ViaGate,
    /// Via from a lower tier contact through the upper tier to metal 1.
    ViaDeep,
    /// Metal 1. Routes horizontally.
    Metal1,
    /// Via from metal 1 to metal 2.
    Via1,
    /// Metal 2. Routes vertically.
    Metal2,
}

impl Layer {
    /// All layers, from the bottom of the stack to the top.
    pub const ALL: [Layer; 12] = [
        Layer::Ndiff,
        Layer::Pdiff,
        Layer::Poly,
        Layer::DiffCon,
        Layer::DiffConTop,
        Layer::GateCon,
        Layer::Via0,
        Layer::ViaGate,
        Layer::ViaDeep,
        Layer::Metal1,
        Layer::Via1,
        Layer::Metal2,
    ];

    /// The canonical layer name.
    pub const fn name(&self) -> &'static str {
        match self {
            Layer::Ndiff => "ndiff",
            Layer::Pdiff => "pdiff",
            Layer::Poly => "poly",
            Layer::DiffCon => "diff_con",
            Layer::DiffConTop => "diff_con_top",
            Layer::GateCon => "gate_con",
            Layer::Via0 => "via0",
            Layer::ViaGate => "via_gate",
            Layer::ViaDeep => "via_deep",
            Layer::Metal1 => "metal1",
            Layer::Via1 => "via1",
            Layer::Metal2 => "metal2",
        }
    }

    /// Returns `true` if this is a via layer.
    pub const fn is_via(&self) -> bool {
        matches!(
            self,
            Layer::Via0 | Layer::ViaGate | Layer::ViaDeep | Layer::Via1
        )
    }

    /// Returns `true` if this is a metal routing layer.
    pub const fn is_metal(&self) -> bool {
        matches!(self, Layer::Metal1 | Layer::Metal2)
    }

    /// The diffusion layer of the given channel type.
    pub const fn diffusion(channel: ChannelType) -> Layer {
        match channel {
            ChannelType::Nmos => Layer::Ndiff,
            ChannelType::Pmos => Layer::Pdiff,
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The device architecture of a technology.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechKind {
    /// Complementary FET: PMOS stacked directly above NMOS.
    Cfet,
    /// Gate-all-around nanosheets.
    Gaa,
    /// FinFET.
    Finfet,
    /// Gate-all-around with cells folded over two rows.
    MultiheightGaa,
}

impl TechKind {
    /// Returns `true` if both channel types share one footprint.
    #[inline]
    pub const fn is_stacked(&self) -> bool {
        matches!(self, TechKind::Cfet)
    }

    /// The number of rows a cell is folded into.
    #[inline]
    pub const fn tiers(&self) -> usize {
        match self {
            TechKind::MultiheightGaa => 2,
            _ => 1,
        }
    }

    /// The layer map describing this architecture.
    pub fn layer_map(&self) -> &'static dyn LayerMap {
        match self {
            TechKind::Cfet => &CfetLayers,
            TechKind::Gaa | TechKind::Finfet | TechKind::MultiheightGaa => &PlanarLayers,
        }
    }
}

/// The metal layers available for routing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingCapability {
    /// Only metal 1 is available.
    SingleMetal,
    /// Metal 1 and metal 2 are available.
    TwoMetal,
}

impl RoutingCapability {
    /// The metal layers available for routing, bottom first.
    pub fn metals(&self) -> &'static [Layer] {
        match self {
            Self::SingleMetal => &[Layer::Metal1],
            Self::TwoMetal => &[Layer::Metal1, Layer::Metal2],
        }
    }
}

/// The drawn width of a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRule {
    /// The layer.
    pub layer: Layer,
    /// The width of a stripe on this layer.
    pub width: i64,
}

/// The size of a via.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaRule {
    /// The via layer.
    pub via: Layer,
    /// The horizontal size of the via cut.
    pub width: i64,
    /// The vertical size of the via cut.
    pub height: i64,
    /// The enclosure required by the layers above and below the cut.
    #[serde(default)]
    pub enclosure: i64,
}

impl ViaRule {
    /// The via cut grown by its enclosure, as `(width, height)`.
    #[inline]
    pub fn footprint(&self) -> (i64, i64) {
        (
            self.width + 2 * self.enclosure,
            self.height + 2 * self.enclosure,
        )
    }
}

/// Minimum spacing between shapes on two layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacingRule {
    /// The first layer.
    pub a: Layer,
    /// The second layer.
    pub b: Layer,
    /// The minimum space.
    pub space: i64,
}

/// A layer whose shapes block via access to the layer below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HinderRule {
    /// The blocking layer.
    pub upper: Layer,
    /// The blocked layer.
    pub lower: Layer,
}

/// A routing cost assigned to a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerWeight {
    /// The layer.
    pub layer: Layer,
    /// The cost per grid step (routing layers) or per via.
    pub weight: u64,
}

/// Routing costs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingWeights {
    /// Per grid step costs of routing layers.
    pub layers: Vec<LayerWeight>,
    /// Per via costs.
    pub vias: Vec<LayerWeight>,
}

impl RoutingWeights {
    /// The default cost of one grid step.
    pub const DEFAULT_LAYER_WEIGHT: u64 = 1;
    /// The default cost of a via.
    pub const DEFAULT_VIA_WEIGHT: u64 = 4;

    /// The cost per grid step on `layer`.
    pub fn layer(&self, layer: Layer) -> u64 {
        self.layers
            .iter()
            .find(|w| w.layer == layer)
            .map(|w| w.weight)
            .unwrap_or(Self::DEFAULT_LAYER_WEIGHT)
    }

    /// The cost of a via on `via`.
    pub fn via(&self, via: Layer) -> u64 {
        self.vias
            .iter()
            .find(|w| w.layer == via)
            .map(|w| w.weight)
            .unwrap_or(Self::DEFAULT_VIA_WEIGHT)
    }
}

/// Which supply a rail carries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Supply {
    /// The positive supply.
    Vdd,
    /// Ground.
    Vss,
}

/// Technology rules for one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technology {
    /// The technology name.
    pub name: ArcStr,
    /// The device architecture.
    pub kind: TechKind,
    /// The available routing metals.
    pub routing: RoutingCapability,
    /// Contacted poly pitch. The horizontal grid step is half of this.
    pub cpp: i64,
    /// Metal 1 track pitch. This is the vertical grid step.
    pub m1_pitch: i64,
    /// The number of metal 1 tracks in a single-height cell, including both rails.
    pub tracks: usize,
    /// The number of tracks covered by each diffusion row (planar technologies).
    #[serde(default)]
    pub diffusion_tracks: usize,
    /// The x coordinate of grid column 0.
    #[serde(default)]
    pub offset_x: i64,
    /// The y coordinate of track 0.
    #[serde(default)]
    pub offset_y: i64,
    /// Layer widths.
    pub layers: Vec<LayerRule>,
    /// Via sizes.
    pub vias: Vec<ViaRule>,
    /// Spacing rules.
    #[serde(default)]
    pub spacing: Vec<SpacingRule>,
    /// Hindering rules.
    #[serde(default)]
    pub hinder: Vec<HinderRule>,
    /// Routing costs.
    #[serde(default)]
    pub weights: RoutingWeights,
}

impl Technology {
    /// Parses a technology from a TOML string.
    pub fn from_toml_str(s: &str) -> crate::error::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// The layer map of this technology's architecture.
    #[inline]
    pub fn layer_map(&self) -> &'static dyn LayerMap {
        self.kind.layer_map()
    }

    /// The width of `layer`, or 0 if the layer is not declared.
    pub fn width(&self, layer: Layer) -> i64 {
        self.layers
            .iter()
            .find(|r| r.layer == layer)
            .map(|r| r.width)
            .unwrap_or_default()
    }

    /// Returns `true` if the technology declares a width for `layer`.
    pub fn has_layer(&self, layer: Layer) -> bool {
        self.layers.iter().any(|r| r.layer == layer)
    }

    /// The rule for the via layer `via`.
    pub fn via(&self, via: Layer) -> Option<&ViaRule> {
        self.vias.iter().find(|r| r.via == via)
    }

    /// The minimum spacing between `a` and `b`, or 0 if unconstrained.
    pub fn spacing(&self, a: Layer, b: Layer) -> i64 {
        self.spacing
            .iter()
            .filter(|r| (r.a == a && r.b == b) || (r.a == b && r.b == a))
            .map(|r| r.space)
            .max()
            .unwrap_or_default()
    }

    /// The layer that blocks via access to `lower`, if any.
    pub fn hindered_by(&self, lower: Layer) -> Option<Layer> {
        self.hinder.iter().find(|r| r.lower == lower).map(|r| r.upper)
    }

    /// The horizontal grid step.
    #[inline]
    pub fn step_x(&self) -> i64 {
        self.cpp / 2
    }

    /// The x coordinate of grid column `i`.
    #[inline]
    pub fn x(&self, i: usize) -> i64 {
        self.offset_x + i as i64 * self.step_x()
    }

    /// The y coordinate of track `j`.
    #[inline]
    pub fn y(&self, j: usize) -> i64 {
        self.offset_y + j as i64 * self.m1_pitch
    }

    /// The total number of metal 1 tracks in a cell, including all rails.
    pub fn total_tracks(&self) -> usize {
        match self.kind.tiers() {
            1 => self.tracks,
            n => n * self.tracks.saturating_sub(1) + 1,
        }
    }

    /// The supply rails as `(track, supply)`, bottom first.
    ///
    /// Rails alternate between ground and supply, starting with ground.
    pub fn rails(&self) -> Vec<(usize, Supply)> {
        (0..=self.kind.tiers())
            .map(|i| {
                let supply = if i % 2 == 0 { Supply::Vss } else { Supply::Vdd };
                (i * self.tracks.saturating_sub(1), supply)
            })
            .collect()
    }

    /// Half the vertical extent of a via footprint landing on `layer`.
    ///
    /// Contacts are drawn this far beyond the centers of their first and last tracks.
    pub fn landing_extension(&self, layer: Layer) -> i64 {
        self.layer_map()
            .vias_landing_on(layer)
            .iter()
            .filter_map(|via| self.via(*via))
            .map(|rule| rule.footprint().1 / 2)
            .max()
            .unwrap_or_else(|| self.width(layer) / 2)
    }

    /// The source/drain contact layer used by devices of the given channel type.
    #[inline]
    pub fn sd_contact(&self, channel: ChannelType) -> Layer {
        self.layer_map().sd_contact(channel)
    }

    /// Validates the technology, returning all issues found.
    pub fn validate(&self) -> TechIssues {
        validation::validate(self)
    }
}
