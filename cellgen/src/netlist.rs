//! Transistor-level cell netlists.

use std::fmt::Display;
use std::path::Path;

use arcstr::ArcStr;
use indexmap::IndexSet;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spice::{ParsedSpice, Parser, PinDir, Subckt};

use crate::error::{Error, Result};
use crate::tech::Supply;

/// The channel type of a MOS transistor.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// N-channel.
    Nmos,
    /// P-channel.
    Pmos,
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nmos => write!(f, "nmos"),
            Self::Pmos => write!(f, "pmos"),
        }
    }
}

/// A MOS transistor.
///
/// Two transistors with identical terminals remain distinct as long as their names differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Transistor {
    /// The instance name.
    pub name: ArcStr,
    /// The source net.
    pub source: ArcStr,
    /// The drain net.
    pub drain: ArcStr,
    /// The gate net.
    pub gate: ArcStr,
    /// The channel type.
    pub channel: ChannelType,
    /// The channel width, if given.
    pub width: Option<Decimal>,
    /// The channel length, if given.
    pub length: Option<Decimal>,
}

impl Transistor {
    /// Creates a transistor with unspecified dimensions.
    pub fn new(
        name: impl Into<ArcStr>,
        channel: ChannelType,
        source: impl Into<ArcStr>,
        gate: impl Into<ArcStr>,
        drain: impl Into<ArcStr>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            drain: drain.into(),
            gate: gate.into(),
            channel,
            width: None,
            length: None,
        }
    }

    /// Sets the channel dimensions.
    pub fn with_size(mut self, width: Option<Decimal>, length: Option<Decimal>) -> Self {
        self.width = width;
        self.length = length;
        self
    }

    /// The same device traversed in the opposite direction, with source and drain swapped.
    pub fn flipped(&self) -> Self {
        Self {
            source: self.drain.clone(),
            drain: self.source.clone(),
            ..self.clone()
        }
    }

    /// The nets this transistor connects to, as `[source, gate, drain]`.
    pub fn terminals(&self) -> [&ArcStr; 3] {
        [&self.source, &self.gate, &self.drain]
    }

    /// Returns `true` if the source or drain connects to `net`.
    pub fn touches_diffusion(&self, net: &str) -> bool {
        self.source == net || self.drain == net
    }
}

/// The supply nets of a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PowerNets {
    /// The positive supply.
    pub vdd: ArcStr,
    /// Ground.
    pub vss: ArcStr,
}

impl Default for PowerNets {
    fn default() -> Self {
        Self {
            vdd: arcstr::literal!("vdd"),
            vss: arcstr::literal!("vss"),
        }
    }
}

impl PowerNets {
    /// Creates a new set of power nets.
    pub fn new(vdd: impl Into<ArcStr>, vss: impl Into<ArcStr>) -> Self {
        Self {
            vdd: vdd.into(),
            vss: vss.into(),
        }
    }

    /// Returns `true` if `net` is a supply net.
    #[inline]
    pub fn contains(&self, net: &str) -> bool {
        self.vdd == net || self.vss == net
    }

    /// The supply carried by `net`, if any.
    pub fn supply(&self, net: &str) -> Option<Supply> {
        if self.vdd == net {
            Some(Supply::Vdd)
        } else if self.vss == net {
            Some(Supply::Vss)
        } else {
            None
        }
    }

    /// The net carrying `supply`.
    pub fn net(&self, supply: Supply) -> &ArcStr {
        match supply {
            Supply::Vdd => &self.vdd,
            Supply::Vss => &self.vss,
        }
    }
}

/// Maps SPICE model names to channel types.
///
/// Model names are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMap {
    /// Models of N-channel devices.
    pub nmos: Vec<ArcStr>,
    /// Models of P-channel devices.
    pub pmos: Vec<ArcStr>,
    /// Port names recognized as the positive supply.
    pub vdd: Vec<ArcStr>,
    /// Port names recognized as ground.
    pub vss: Vec<ArcStr>,
}

impl Default for ModelMap {
    fn default() -> Self {
        Self {
            nmos: vec![
                arcstr::literal!("nmos"),
                arcstr::literal!("nch"),
                arcstr::literal!("nfet"),
            ],
            pmos: vec![
                arcstr::literal!("pmos"),
                arcstr::literal!("pch"),
                arcstr::literal!("pfet"),
            ],
            vdd: vec![arcstr::literal!("vdd"), arcstr::literal!("vpwr")],
            vss: vec![
                arcstr::literal!("vss"),
                arcstr::literal!("gnd"),
                arcstr::literal!("vgnd"),
            ],
        }
    }
}

impl ModelMap {
    /// The channel type of devices using `model`.
    pub fn channel(&self, model: &str) -> Option<ChannelType> {
        let eq = |m: &ArcStr| m.eq_ignore_ascii_case(model);
        if self.nmos.iter().any(eq) {
            Some(ChannelType::Nmos)
        } else if self.pmos.iter().any(eq) {
            Some(ChannelType::Pmos)
        } else {
            None
        }
    }

    fn find_port<'a>(&self, ports: &'a [spice::Node], names: &[ArcStr]) -> Option<&'a spice::Node> {
        ports
            .iter()
            .find(|p| names.iter().any(|n| n.eq_ignore_ascii_case(p)))
    }
}

/// The transistor netlist of a single standard cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellNetlist {
    /// The cell name.
    pub name: ArcStr,
    /// The ports of the cell, in declaration order.
    pub ports: Vec<ArcStr>,
    /// All transistors.
    pub transistors: Vec<Transistor>,
    /// Input and output pins. Excludes the supply nets.
    pub io_pins: IndexSet<ArcStr>,
    /// The supply nets.
    pub power: PowerNets,
}

impl CellNetlist {
    /// Creates a netlist whose ports are its IO pins followed by the supply nets.
    pub fn new(
        name: impl Into<ArcStr>,
        transistors: Vec<Transistor>,
        io_pins: impl IntoIterator<Item = impl Into<ArcStr>>,
        power: PowerNets,
    ) -> Self {
        let io_pins: IndexSet<ArcStr> = io_pins.into_iter().map(Into::into).collect();
        let ports = io_pins
            .iter()
            .cloned()
            .chain([power.vdd.clone(), power.vss.clone()])
            .collect();
        Self {
            name: name.into(),
            ports,
            transistors,
            io_pins,
            power,
        }
    }

    /// Parses the subcircuit `subckt` from SPICE source text.
    pub fn from_spice(text: &str, subckt: &str, models: &ModelMap) -> Result<Self> {
        Self::select(&Parser::parse(text)?, subckt, models)
    }

    /// Reads the subcircuit `subckt` from a SPICE file.
    pub fn from_file(path: impl AsRef<Path>, subckt: &str, models: &ModelMap) -> Result<Self> {
        let parsed = Parser::parse_file(path)?;
        tracing::debug!(root = ?parsed.root, library = %parsed.name, "read cell library");
        Self::select(&parsed, subckt, models)
    }

    fn select(parsed: &ParsedSpice, subckt: &str, models: &ModelMap) -> Result<Self> {
        let sub = parsed.subckt(subckt).ok_or_else(|| {
            Error::Netlist(format!("no subcircuit named `{subckt}` in `{}`", parsed.name))
        })?;
        Self::from_subckt(sub, models)
    }

    /// Converts a parsed subcircuit.
    pub fn from_subckt(sub: &Subckt, models: &ModelMap) -> Result<Self> {
        let vdd = models.find_port(&sub.ports, &models.vdd);
        let vss = models.find_port(&sub.ports, &models.vss);
        let (Some(vdd), Some(vss)) = (vdd, vss) else {
            return Err(Error::Netlist(format!(
                "subcircuit `{}` must have a supply and a ground port",
                sub.name
            )));
        };
        let power = PowerNets::new(ArcStr::from(vdd.clone()), ArcStr::from(vss.clone()));

        let mut transistors = Vec::new();
        for mos in sub.mosfets() {
            let channel = models.channel(&mos.model).ok_or_else(|| {
                Error::Netlist(format!(
                    "unknown model `{}` for transistor `{}`",
                    mos.model, mos.name
                ))
            })?;
            let dim = |key: &str| mos.params.get(key).and_then(|v| spice::parse_value(v));
            transistors.push(
                Transistor::new(
                    ArcStr::from(mos.name.clone()),
                    channel,
                    ArcStr::from(mos.s.clone()),
                    ArcStr::from(mos.g.clone()),
                    ArcStr::from(mos.d.clone()),
                )
                .with_size(dim("w"), dim("l")),
            );
        }

        let io_pins = match &sub.pin_info {
            Some(info) => info
                .iter()
                .filter(|(_, dir)| matches!(dir, PinDir::Input | PinDir::Output | PinDir::InOut))
                .map(|(node, _)| ArcStr::from(node.clone()))
                .filter(|n| !power.contains(n))
                .collect(),
            None => sub
                .ports
                .iter()
                .map(|node| ArcStr::from(node.clone()))
                .filter(|n| !power.contains(n))
                .collect(),
        };

        let netlist = Self {
            name: ArcStr::from(sub.name.clone()),
            ports: sub.ports.iter().map(|n| ArcStr::from(n.clone())).collect(),
            transistors,
            io_pins,
            power,
        };
        tracing::debug!(
            cell = %netlist.name,
            transistors = netlist.transistors.len(),
            pins = netlist.io_pins.len(),
            "loaded cell netlist"
        );
        Ok(netlist)
    }

    /// The transistors of the given channel type.
    pub fn transistors_of(&self, channel: ChannelType) -> Vec<Transistor> {
        self.transistors
            .iter()
            .filter(|t| t.channel == channel)
            .cloned()
            .collect()
    }

    /// All nets, in order of first appearance.
    pub fn nets(&self) -> IndexSet<ArcStr> {
        self.ports
            .iter()
            .cloned()
            .chain(
                self.transistors
                    .iter()
                    .flat_map(|t| t.terminals().into_iter().cloned()),
            )
            .collect()
    }

    /// Returns `true` if `net` is an input or output pin.
    #[inline]
    pub fn is_io(&self, net: &str) -> bool {
        self.io_pins.contains(net)
    }
}
