//! Device and net extraction from drawn layout.

use arcstr::ArcStr;
use ena::unify::{InPlaceUnificationTable, UnifyKey};
use geometry::prelude::*;
use indexmap::IndexMap;

use crate::netlist::{ChannelType, PowerNets};
use crate::shapes::Shapes;
use crate::tech::{Layer, Technology};

use super::circuit::{Circuit, Device};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct ConductorKey(u32);

impl UnifyKey for ConductorKey {
    type Value = ();

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        Self(u)
    }

    fn tag() -> &'static str {
        "ConductorKey"
    }
}

/// A connected piece of conducting geometry on one layer.
#[derive(Debug, Clone)]
struct Conductor {
    layer: Layer,
    region: Region,
}

impl Conductor {
    fn overlaps(&self, other: &Conductor) -> bool {
        self.region.rects().iter().any(|r| other.region.overlaps(r))
    }

    fn touches(&self, other: &Conductor) -> bool {
        self.region
            .rects()
            .iter()
            .any(|r| other.region.rects().iter().any(|q| r.touches(q)))
    }
}

/// A transistor channel: the part of a diffusion covered by poly.
struct Channel {
    kind: ChannelType,
    region: Region,
    source: usize,
    drain: usize,
}

/// Layers whose shapes conduct as drawn.
const CONDUCTORS: [Layer; 10] = [
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

/// Extracts the circuit drawn in `shapes`.
///
/// Each region where poly crosses diffusion forms a device whose source is the
/// diffusion to its left and whose drain is the diffusion to its right. Nets are
/// named after the labels they carry; unlabelled nets are numbered. Pin labels
/// and labels on supply nets become ports.
pub fn extract(shapes: &Shapes, tech: &Technology, name: &str, power: &PowerNets) -> Circuit {
    let map = tech.layer_map();
    let poly = shapes.region(Layer::Poly);

    let mut conductors: Vec<Conductor> = Vec::new();
    let mut channels: Vec<Channel> = Vec::new();
    for kind in [ChannelType::Nmos, ChannelType::Pmos] {
        let layer = Layer::diffusion(kind);
        let diff = shapes.region(layer);
        let gate = poly.intersection(&diff);
        let first = conductors.len();
        conductors.extend(
            diff.difference(&gate)
                .pieces()
                .into_iter()
                .map(|region| Conductor { layer, region }),
        );
        let sd = first..conductors.len();
        for region in gate.pieces() {
            let Some(center) = region.bbox().map(|b| b.center()) else {
                continue;
            };
            let channel = Conductor { layer, region };
            let side = |left: bool| {
                sd.clone().find(|&i| {
                    let c = &conductors[i];
                    c.touches(&channel)
                        && c.region
                            .bbox()
                            .is_some_and(|b| (b.center().x < center.x) == left)
                })
            };
            match (side(true), side(false)) {
                (Some(source), Some(drain)) => channels.push(Channel {
                    kind,
                    region: channel.region,
                    source,
                    drain,
                }),
                _ => tracing::warn!(%kind, at = ?center, "channel without source and drain"),
            }
        }
    }
    for layer in CONDUCTORS {
        conductors.extend(shapes.shapes(layer).iter().map(|s| Conductor {
            layer,
            region: Region::from(s.rect),
        }));
    }

    let mut table: InPlaceUnificationTable<ConductorKey> = InPlaceUnificationTable::new();
    let keys: Vec<ConductorKey> = conductors.iter().map(|_| table.new_key(())).collect();
    for (i, a) in conductors.iter().enumerate() {
        for (j, b) in conductors.iter().enumerate().skip(i + 1) {
            let connected = if a.layer == b.layer {
                a.touches(b)
            } else {
                map.connects(a.layer, b.layer) && a.overlaps(b)
            };
            if connected {
                table.union(keys[i], keys[j]);
            }
        }
    }

    // Labels of one name join their nets.
    let mut labelled: IndexMap<ArcStr, Vec<usize>> = IndexMap::new();
    for label in shapes.labels() {
        let hits = conductors
            .iter()
            .enumerate()
            .filter(|(_, c)| c.layer == label.layer && c.region.contains_point(label.at))
            .map(|(i, _)| i);
        labelled.entry(label.text.clone()).or_default().extend(hits);
    }
    for idxs in labelled.values() {
        for pair in idxs.windows(2) {
            table.union(keys[pair[0]], keys[pair[1]]);
        }
    }

    let mut names: IndexMap<ConductorKey, ArcStr> = IndexMap::new();
    for (text, idxs) in labelled.iter() {
        for &i in idxs {
            let root = table.find(keys[i]);
            match names.get(&root) {
                Some(existing) if existing != text => {
                    tracing::warn!(net = %existing, other = %text, "labels short two nets")
                }
                Some(_) => {}
                None => {
                    names.insert(root, text.clone());
                }
            }
        }
    }
    let mut unnamed = 0;
    let mut net_of = |i: usize, table: &mut InPlaceUnificationTable<ConductorKey>| -> ArcStr {
        let root = table.find(keys[i]);
        names
            .entry(root)
            .or_insert_with(|| {
                unnamed += 1;
                arcstr::format!("net{unnamed}")
            })
            .clone()
    };

    let mut circuit = Circuit::new(name);
    for label in shapes.labels() {
        if (label.pin || power.contains(&label.text)) && !labelled[&label.text].is_empty() {
            circuit.add_port(label.text.clone());
        }
    }
    for (n, channel) in channels.iter().enumerate() {
        let gate = conductors
            .iter()
            .position(|c| c.layer == Layer::Poly && channel.region.rects().iter().any(|r| c.region.overlaps(r)));
        let Some(gate) = gate else {
            tracing::warn!(kind = %channel.kind, "channel without a gate");
            continue;
        };
        let device = Device {
            name: arcstr::format!("{n}"),
            kind: channel.kind,
            d: net_of(channel.drain, &mut table),
            g: net_of(gate, &mut table),
            s: net_of(channel.source, &mut table),
            w: None,
            l: None,
            fingers: 1,
        };
        circuit.add_device(device);
    }
    tracing::debug!(
        devices = circuit.devices.len(),
        nets = circuit.nets.len(),
        "extracted circuit"
    );
    circuit
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::shapes::Label;
    use crate::tests::gaa_tech;

    fn label(layer: Layer, text: &str, x: i64, y: i64, pin: bool) -> Label {
        Label {
            layer,
            text: text.into(),
            at: Point::new(x, y),
            pin,
        }
    }

    /// A hand-drawn NMOS with its source on a labelled rail.
    fn nmos_shapes() -> Shapes {
        let mut shapes = Shapes::new();
        shapes.add(
            Layer::Ndiff,
            crate::shapes::Shape {
                rect: Rect::from_sides(-10, 32, 110, 88),
                net: None,
            },
        );
        shapes.add_rect(Layer::Poly, Rect::from_sides(42, 20, 58, 180), "a");
        shapes.add_rect(Layer::GateCon, Rect::from_sides(40, 112, 60, 168), "a");
        shapes.add_rect(Layer::DiffCon, Rect::from_sides(-10, -8, 10, 88), "vss");
        shapes.add_rect(Layer::DiffCon, Rect::from_sides(90, 32, 110, 88), "y");
        shapes.add_rect(Layer::Metal1, Rect::from_sides(-25, -10, 125, 10), "vss");
        shapes.add_rect(Layer::Via0, Rect::from_sides(-6, -6, 6, 6), "vss");
        shapes.add_rect(Layer::ViaGate, Rect::from_sides(44, 114, 56, 126), "a");
        shapes.add_rect(Layer::Metal1, Rect::from_sides(40, 110, 60, 130), "a");
        shapes.add_rect(Layer::Via0, Rect::from_sides(94, 74, 106, 86), "y");
        shapes.add_rect(Layer::Metal1, Rect::from_sides(90, 70, 110, 90), "y");
        shapes.add_label(label(Layer::Metal1, "vss", 0, 0, false));
        shapes.add_label(label(Layer::Metal1, "a", 50, 120, true));
        shapes.add_label(label(Layer::Metal1, "y", 100, 80, true));
        shapes
    }

    #[test]
    fn extracts_a_labelled_transistor() {
        let circuit = extract(&nmos_shapes(), &gaa_tech(), "n", &PowerNets::default());
        assert_eq!(circuit.devices.len(), 1);
        let device = &circuit.devices[0];
        assert_eq!(device.kind, ChannelType::Nmos);
        assert_eq!((&*device.s, &*device.g, &*device.d), ("vss", "a", "y"));
        assert_eq!(
            circuit.ports.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            vec!["vss", "a", "y"]
        );
    }

    #[test]
    fn unlabelled_nets_are_numbered() {
        let mut shapes = nmos_shapes();
        shapes.set_labels(vec![label(Layer::Metal1, "a", 50, 120, true)]);
        let circuit = extract(&shapes, &gaa_tech(), "n", &PowerNets::default());
        let device = &circuit.devices[0];
        assert_eq!(device.g, "a");
        assert!(device.s.starts_with("net"));
        assert!(device.d.starts_with("net"));
        assert_ne!(device.s, device.d);
    }

    #[test]
    fn touching_metal_joins_nets() {
        let mut shapes = nmos_shapes();
        // A metal 1 strap shorting the drain to the rail.
        shapes.add_rect(Layer::Metal1, Rect::from_sides(90, 10, 110, 70), "y");
        let circuit = extract(&shapes, &gaa_tech(), "n", &PowerNets::default());
        let device = &circuit.devices[0];
        assert_eq!(device.s, device.d);
    }
}
