//! Terminal identification.
//!
//! A terminal is the set of routing graph nodes through which a router may
//! reach one connected piece of a net's device geometry.

use arcstr::ArcStr;
use ena::unify::{InPlaceUnificationTable, UnifyKey};
use geometry::prelude::*;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashSet;

use crate::shapes::Shapes;
use crate::tech::Layer;

use super::graph::{GridNode, RoutingGraph};

/// The routing access points of one connected piece of a net.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    /// The net.
    pub net: ArcStr,
    /// The layer of the terminal's access nodes.
    pub layer: Layer,
    /// The routing graph nodes from which the terminal can be reached.
    pub nodes: IndexSet<GridNode>,
    /// The accessible region of the terminal's shapes.
    pub region: Region,
}

impl Terminal {
    /// Returns `true` if `node` is an access node of this terminal.
    #[inline]
    pub fn contains(&self, node: &GridNode) -> bool {
        self.nodes.contains(node)
    }

    /// The tracks spanned by the terminal's nodes.
    pub fn track_span(&self) -> Option<(usize, usize)> {
        let lo = self.nodes.iter().map(|n| n.y).min()?;
        let hi = self.nodes.iter().map(|n| n.y).max()?;
        Some((lo, hi))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct ShapeKey(u32);

impl UnifyKey for ShapeKey {
    type Value = ();

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        Self(u)
    }

    fn tag() -> &'static str {
        "ShapeKey"
    }
}

/// A device shape and the part of it that vias may land on.
struct AccessShape {
    layer: Layer,
    rect: Rect,
    net: ArcStr,
    access: Region,
}

/// A rectangle of the given size centered on `p`.
pub(crate) fn centered(p: Point, width: i64, height: i64) -> Rect {
    let (left, bot) = (p.x - width / 2, p.y - height / 2);
    Rect::from_sides(left, bot, left + width, bot + height)
}

fn access_shapes(shapes: &Shapes, graph: &RoutingGraph) -> Vec<AccessShape> {
    let tech = graph.tech();
    let mut out = Vec::new();
    for &layer in tech.layer_map().access_layers() {
        let blocked = tech
            .hindered_by(layer)
            .map(|upper| shapes.region(upper))
            .unwrap_or_default();
        for shape in shapes.shapes(layer) {
            let Some(net) = shape.net.clone() else {
                continue;
            };
            out.push(AccessShape {
                layer,
                rect: shape.rect,
                net,
                access: Region::from(shape.rect).difference(&blocked),
            });
        }
    }
    out
}

/// Finds every terminal of the drawn devices and supply rails.
///
/// Overlapping, connected shapes of one net form a single terminal. A node is
/// claimed by at most one terminal.
pub fn find_terminals(shapes: &Shapes, graph: &RoutingGraph) -> Vec<Terminal> {
    let tech = graph.tech();
    let map = tech.layer_map();
    let access = access_shapes(shapes, graph);

    let mut table: InPlaceUnificationTable<ShapeKey> = InPlaceUnificationTable::new();
    let keys: Vec<ShapeKey> = access.iter().map(|_| table.new_key(())).collect();
    for (i, a) in access.iter().enumerate() {
        for (j, b) in access.iter().enumerate().skip(i + 1) {
            if a.net == b.net
                && a.rect.overlaps(&b.rect)
                && (a.layer == b.layer || map.connects(a.layer, b.layer))
            {
                table.union(keys[i], keys[j]);
            }
        }
    }
    let mut groups: IndexMap<ShapeKey, Vec<usize>> = IndexMap::new();
    for (i, key) in keys.iter().enumerate() {
        groups.entry(table.find(*key)).or_default().push(i);
    }

    let mut claimed: FxHashSet<GridNode> = FxHashSet::default();
    let mut out = Vec::new();
    for members in groups.values() {
        let mut nodes = IndexSet::new();
        let mut region = Region::new();
        for &i in members {
            let shape = &access[i];
            region = region.union(&shape.access);
            let Some(rule) = map.access_via(shape.layer).and_then(|via| tech.via(via)) else {
                continue;
            };
            let (w, h) = rule.footprint();
            for node in graph.nodes_on(shape.layer) {
                if claimed.contains(&node) {
                    continue;
                }
                if shape.access.contains_rect(&centered(graph.point(&node), w, h)) {
                    claimed.insert(node);
                    nodes.insert(node);
                }
            }
        }
        let first = &access[members[0]];
        let layer = nodes.first().map(|n: &GridNode| n.layer).unwrap_or(first.layer);
        if nodes.is_empty() {
            tracing::warn!(net = %first.net, %layer, "device shape has no routing access");
            continue;
        }
        out.push(Terminal {
            net: first.net.clone(),
            layer,
            nodes,
            region,
        });
    }

    // All rails of one net form a single terminal.
    let mut rails: IndexMap<ArcStr, Vec<Rect>> = IndexMap::new();
    for shape in shapes.shapes(Layer::Metal1) {
        if let Some(net) = &shape.net {
            rails.entry(net.clone()).or_default().push(shape.rect);
        }
    }
    for (net, rects) in rails {
        let region = Region::from_rects(rects.iter().copied()).merged();
        let nodes: IndexSet<GridNode> = graph
            .nodes_on(Layer::Metal1)
            .filter(|n| !claimed.contains(n) && region.contains_point(graph.point(n)))
            .collect();
        claimed.extend(nodes.iter().copied());
        out.push(Terminal {
            net,
            layer: Layer::Metal1,
            nodes,
            region,
        });
    }

    tracing::debug!(terminals = out.len(), "identified terminals");
    out
}

/// The terminals of each net, in order of first appearance.
pub fn terminals_by_net(terminals: &[Terminal]) -> IndexMap<ArcStr, Vec<usize>> {
    let mut out: IndexMap<ArcStr, Vec<usize>> = IndexMap::new();
    for (i, t) in terminals.iter().enumerate() {
        out.entry(t.net.clone()).or_default().push(i);
    }
    out
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::cell::Cell;
    use crate::draw::{columns, draw};
    use crate::netlist::{ChannelType, Transistor};
    use crate::tests::{cfet_tech, gaa_tech, inv, multiheight_tech};

    fn inv_cell() -> Cell {
        Cell::new(
            vec![Some(Transistor::new("mp", ChannelType::Pmos, "vdd", "a", "y"))],
            vec![Some(Transistor::new("mn", ChannelType::Nmos, "vss", "a", "y"))],
        )
    }

    #[test]
    fn planar_inverter_terminals() {
        let tech = gaa_tech();
        let cells = [inv_cell()];
        let shapes = draw(&cells, &tech, &inv()).unwrap();
        let graph = RoutingGraph::new(&tech, columns(&cells));
        let terminals = find_terminals(&shapes, &graph);
        let by_net = terminals_by_net(&terminals);
        // Two output contacts, and one contact plus the rail per supply.
        assert_eq!(by_net["y"].len(), 2);
        assert_eq!(by_net["vss"].len(), 2);
        assert_eq!(by_net["vdd"].len(), 2);
        assert_eq!(by_net["a"].len(), 1);

        let gate = &terminals[by_net["a"][0]];
        assert_eq!(gate.layer, Layer::GateCon);
        assert_eq!(gate.track_span(), Some((3, 4)));

        let vss_contact = terminals[by_net["vss"][0]].clone();
        assert_eq!(vss_contact.layer, Layer::DiffCon);
        assert!(vss_contact.contains(&GridNode::new(Layer::DiffCon, 0, 0)));
        let rail = &terminals[by_net["vss"][1]];
        assert_eq!(rail.layer, Layer::Metal1);
        assert_eq!(rail.nodes.len(), 3);

        let mut seen = FxHashSet::default();
        for t in terminals.iter() {
            for n in t.nodes.iter() {
                assert!(seen.insert(*n), "{n} claimed twice");
            }
        }
    }

    #[test]
    fn hindered_contacts_lose_access() {
        let tech = cfet_tech();
        let cells = [inv_cell()];
        let shapes = draw(&cells, &tech, &inv()).unwrap();
        let graph = RoutingGraph::new(&tech, columns(&cells));
        let terminals = find_terminals(&shapes, &graph);
        let by_net = terminals_by_net(&terminals);

        // The stacked `y` contacts merge into one upper tier terminal.
        assert_eq!(by_net["y"].len(), 1);
        let y = &terminals[by_net["y"][0]];
        assert_eq!(y.layer, Layer::DiffConTop);
        assert_eq!(y.track_span(), Some((1, 5)));

        // The ground contact keeps the tracks below the supply contact.
        let vss = &terminals[by_net["vss"][0]];
        assert_eq!(vss.layer, Layer::DiffCon);
        assert_eq!(vss.track_span(), Some((0, 3)));
        let vdd = &terminals[by_net["vdd"][0]];
        assert_eq!(vdd.layer, Layer::DiffConTop);
        assert_eq!(vdd.track_span(), Some((4, 6)));
    }

    #[test]
    fn rails_of_one_net_form_one_terminal() {
        let tech = multiheight_tech();
        let cells = [inv_cell(), inv_cell()];
        let shapes = draw(&cells, &tech, &inv()).unwrap();
        let graph = RoutingGraph::new(&tech, columns(&cells));
        let terminals = find_terminals(&shapes, &graph);
        let rails: Vec<&Terminal> = terminals
            .iter()
            .filter(|t| t.layer == Layer::Metal1 && t.net == "vss")
            .collect();
        assert_eq!(rails.len(), 1);
        assert_eq!(rails[0].nodes.len(), 6);
        // The supply contacts of both tiers meet on the shared rail.
        let vdd: Vec<&Terminal> = terminals
            .iter()
            .filter(|t| t.layer == Layer::DiffCon && t.net == "vdd")
            .collect();
        assert_eq!(vdd.len(), 1);
    }
}
