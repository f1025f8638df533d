//! Flat transistor-level circuits.

use std::fmt::Display;

use arcstr::ArcStr;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::netlist::{CellNetlist, ChannelType};

/// A three-terminal MOS device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// The instance name.
    pub name: ArcStr,
    /// The channel type.
    pub kind: ChannelType,
    /// The drain net.
    pub d: ArcStr,
    /// The gate net.
    pub g: ArcStr,
    /// The source net.
    pub s: ArcStr,
    /// The channel width, if known.
    pub w: Option<Decimal>,
    /// The channel length, if known.
    pub l: Option<Decimal>,
    /// The number of parallel transistors this device stands for.
    #[serde(default = "one")]
    pub fingers: usize,
}

fn one() -> usize {
    1
}

impl Device {
    /// The source and drain nets, in sorted order.
    pub fn diffusion(&self) -> (&ArcStr, &ArcStr) {
        if self.s <= self.d {
            (&self.s, &self.d)
        } else {
            (&self.d, &self.s)
        }
    }
}

/// A flat circuit of MOS devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    /// The circuit name.
    pub name: ArcStr,
    /// The devices.
    pub devices: Vec<Device>,
    /// Every net, in order of first appearance.
    pub nets: IndexSet<ArcStr>,
    /// The externally visible nets.
    pub ports: IndexSet<ArcStr>,
}

impl Circuit {
    /// Creates an empty circuit.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds a port, creating its net if needed.
    pub fn add_port(&mut self, net: impl Into<ArcStr>) {
        let net = net.into();
        self.nets.insert(net.clone());
        self.ports.insert(net);
    }

    /// Adds a device and its nets.
    pub fn add_device(&mut self, device: Device) {
        for net in [&device.d, &device.g, &device.s] {
            self.nets.insert(net.clone());
        }
        self.devices.push(device);
    }

    /// The reference circuit of a cell netlist.
    pub fn from_netlist(netlist: &CellNetlist) -> Self {
        let mut circuit = Self::new(netlist.name.clone());
        for port in netlist.ports.iter() {
            circuit.add_port(port.clone());
        }
        for t in netlist.transistors.iter() {
            circuit.add_device(Device {
                name: t.name.clone(),
                kind: t.channel,
                d: t.drain.clone(),
                g: t.gate.clone(),
                s: t.source.clone(),
                w: t.width,
                l: t.length,
                fingers: 1,
            });
        }
        circuit
    }

    /// Returns an equivalent circuit in canonical form.
    ///
    /// Source and drain are swapped so that the source sorts first, floating
    /// internal nets are removed and, if `merge_parallel` is set, devices with
    /// the same type, gate and diffusion nets are merged into one. A merged
    /// device adds up the fingers and widths of its parts.
    pub fn simplified(&self, merge_parallel: bool) -> Self {
        let mut out = Self::new(self.name.clone());
        for port in self.ports.iter() {
            out.add_port(port.clone());
        }
        let mut merged: IndexMap<(ChannelType, ArcStr, ArcStr, ArcStr), usize> = IndexMap::new();
        for device in self.devices.iter() {
            let (s, d) = device.diffusion();
            let key = (device.kind, device.g.clone(), s.clone(), d.clone());
            if merge_parallel {
                if let Some(&i) = merged.get(&key) {
                    let into = &mut out.devices[i];
                    into.fingers += device.fingers;
                    into.w = into.w.zip(device.w).map(|(a, b)| a + b);
                    continue;
                }
                merged.insert(key, out.devices.len());
            }
            out.add_device(Device {
                s: s.clone(),
                d: d.clone(),
                ..device.clone()
            });
        }
        let dropped = self.nets.len() - out.nets.len();
        if dropped > 0 {
            tracing::debug!(circuit = %self.name, dropped, "removed floating nets");
        }
        out
    }

    /// The number of transistors of the given type, counting every finger.
    pub fn count(&self, kind: ChannelType) -> usize {
        self.devices
            .iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.fingers)
            .sum()
    }
}

impl Display for Circuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, ".subckt {} {}", self.name, self.ports.iter().join(" "))?;
        for device in self.devices.iter() {
            let prefix = if device.name.starts_with(['M', 'm']) { "" } else { "M" };
            write!(
                f,
                "{prefix}{} {} {} {} {}",
                device.name, device.d, device.g, device.s, device.kind
            )?;
            if let Some(w) = device.w {
                write!(f, " w={w}")?;
            }
            if let Some(l) = device.l {
                write!(f, " l={l}")?;
            }
            if device.fingers > 1 {
                write!(f, " m={}", device.fingers)?;
            }
            writeln!(f)?;
        }
        writeln!(f, ".ends")
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::tests::nand2;

    #[test]
    fn reference_circuit_of_nand2() {
        let circuit = Circuit::from_netlist(&nand2());
        assert_eq!(circuit.count(ChannelType::Nmos), 2);
        assert_eq!(circuit.count(ChannelType::Pmos), 2);
        assert_eq!(circuit.ports.len(), 5);
        assert!(circuit.nets.contains("x"));
        let text = circuit.to_string();
        assert!(text.starts_with(".subckt nand2 a b y vdd vss\n"));
        assert!(text.contains("Mn1 y b x nmos\n"));
        assert!(!text.contains("MM"));
        assert!(text.ends_with(".ends\n"));
    }

    #[test]
    fn simplification_merges_parallel_devices() {
        let mut circuit = Circuit::new("par");
        circuit.add_port("a");
        circuit.add_port("y");
        circuit.add_port("vss");
        let device = |name: &str, s: &str, d: &str| Device {
            name: name.into(),
            kind: ChannelType::Nmos,
            d: d.into(),
            g: "a".into(),
            s: s.into(),
            w: Some(Decimal::from(2)),
            l: None,
            fingers: 1,
        };
        circuit.add_device(device("m0", "vss", "y"));
        circuit.add_device(device("m1", "y", "vss"));
        circuit.nets.insert("floating".into());

        let merged = circuit.simplified(true);
        assert_eq!(merged.devices.len(), 1);
        assert_eq!(merged.devices[0].fingers, 2);
        assert_eq!(merged.devices[0].w, Some(Decimal::from(4)));
        assert_eq!(merged.count(ChannelType::Nmos), 2);
        assert!(merged.to_string().contains("\nm0 y a vss nmos w=4 m=2\n"));
        assert!(!merged.nets.contains("floating"));
        let kept = circuit.simplified(false);
        assert_eq!(kept.devices.len(), 2);
        assert_eq!(kept.devices[1].s, "vss");
        assert_eq!(kept.devices[1].d, "y");
    }
}
