//! Routing.
//!
//! Connects the terminals of each net on the routing grid, draws the resulting
//! wires and vias into the cell's [`Shapes`] and places pin labels.

pub mod graph;
pub mod single;
pub mod terminal;
pub mod two;

use std::cmp::Reverse;

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexSet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::RoutingConfig;
use crate::error::{Error, Result};
use crate::netlist::CellNetlist;
use crate::shapes::{Label, Shapes};
use crate::tech::{Layer, RoutingCapability, Technology};

pub use graph::{GridNode, RoutingGraph};
pub use single::SingleMetalRouter;
pub use terminal::{find_terminals, terminals_by_net, Terminal};
pub use two::TwoMetalRouter;

/// The routed connection of one net.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetRoute {
    /// The net.
    pub net: ArcStr,
    /// Wires between two nodes on one layer, and vias between two layers at one grid point.
    pub segments: Vec<(GridNode, GridNode)>,
    /// The metal 1 node carrying the pin label, for input/output nets.
    pub pin: Option<GridNode>,
}

impl NetRoute {
    /// Creates an empty route for `net`.
    pub fn new(net: impl Into<ArcStr>) -> Self {
        Self {
            net: net.into(),
            ..Default::default()
        }
    }

    /// The segments that change layer.
    pub fn vias(&self) -> impl Iterator<Item = &(GridNode, GridNode)> {
        self.segments.iter().filter(|(a, b)| a.layer != b.layer)
    }

    /// The segments that stay on one layer.
    pub fn wires(&self) -> impl Iterator<Item = &(GridNode, GridNode)> {
        self.segments.iter().filter(|(a, b)| a.layer == b.layer)
    }

    /// Every node covered by the route, including the nodes inside each wire.
    pub fn nodes(&self) -> IndexSet<GridNode> {
        self.segments
            .iter()
            .flat_map(|&(a, b)| covered(a, b))
            .collect()
    }

    /// The metal 1 node of the route closest to the center track.
    fn center_node(&self, center: usize) -> Option<GridNode> {
        self.nodes()
            .into_iter()
            .filter(|n| n.layer == Layer::Metal1)
            .min_by_key(|n| (n.y.abs_diff(center), n.x, n.y))
    }
}

/// The grid nodes of a segment, from `a` to `b`.
///
/// A via covers its two ends. A wire covers every node along its track.
fn covered(a: GridNode, b: GridNode) -> Vec<GridNode> {
    if a.layer != b.layer {
        return vec![a, b];
    }
    let steps = |from: usize, to: usize| -> Vec<usize> {
        if from <= to {
            (from..=to).collect()
        } else {
            (to..=from).rev().collect()
        }
    };
    steps(a.x, b.x)
        .into_iter()
        .flat_map(|x| steps(a.y, b.y).into_iter().map(move |y| GridNode { x, y, ..a }))
        .collect()
}

/// The outcome of routing a cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingResult {
    /// The route of every net that needed one.
    pub routed_nets: Vec<NetRoute>,
    /// The nets carrying a pin label.
    pub pins: IndexSet<ArcStr>,
}

impl RoutingResult {
    /// The route of `net`, if it was routed.
    pub fn net(&self, net: &str) -> Option<&NetRoute> {
        self.routed_nets.iter().find(|r| r.net == net)
    }
}

/// A routing engine.
pub trait Router {
    /// Connects the terminals of every net that needs routing.
    ///
    /// Returns one route per net returned by [`nets_to_route`].
    fn route(
        &self,
        graph: &RoutingGraph<'_>,
        terminals: &[Terminal],
        netlist: &CellNetlist,
    ) -> Result<Vec<NetRoute>>;
}

/// A net and the indices of its terminals.
pub type NetTerminals = (ArcStr, Vec<usize>);

/// The nets that need routing, hardest first.
///
/// A net needs routing if it has more than one terminal or is an input/output pin.
/// Nets with fewer access points come first, then nets spanning more columns.
pub fn nets_to_route(terminals: &[Terminal], netlist: &CellNetlist) -> Result<Vec<NetTerminals>> {
    let by_net = terminals_by_net(terminals);
    for pin in netlist.io_pins.iter() {
        if !by_net.contains_key(pin) {
            return Err(Error::infeasible(pin.clone(), "pin has no routing access"));
        }
    }
    let key = |idxs: &Vec<usize>| {
        let nodes = idxs.iter().flat_map(|&i| terminals[i].nodes.iter());
        let points = idxs.iter().map(|&i| terminals[i].nodes.len()).sum::<usize>();
        let span = match nodes.map(|n| n.x).minmax().into_option() {
            Some((lo, hi)) => hi - lo,
            None => 0,
        };
        (points, Reverse(span))
    };
    Ok(by_net
        .into_iter()
        .filter(|(net, idxs)| idxs.len() > 1 || netlist.is_io(net))
        .sorted_by(|(a, x), (b, y)| key(x).cmp(&key(y)).then_with(|| a.cmp(b)))
        .collect())
}

/// Picks the node of a lone terminal nearest the center track whose metal 1
/// node is free, returning the access node and the metal 1 node above it.
pub(crate) fn forced_pin(
    graph: &RoutingGraph<'_>,
    terminal: &Terminal,
    is_free: impl Fn(&GridNode) -> bool,
) -> Option<(GridNode, GridNode)> {
    let center = graph.center_track();
    terminal
        .nodes
        .iter()
        .sorted_by_key(|n| (n.y.abs_diff(center), n.x, n.y))
        .map(|n| (*n, n.with_layer(Layer::Metal1)))
        .find(|(_, m1)| is_free(m1))
}

/// A rectangle of width `width` joining the centers `a` and `b`.
fn wire(a: Point, b: Point, width: i64) -> Rect {
    let (lo, hi) = (width / 2, width - width / 2);
    Rect::from_sides(
        a.x.min(b.x) - lo,
        a.y.min(b.y) - lo,
        a.x.max(b.x) + hi,
        a.y.max(b.y) + hi,
    )
}

/// A via cut drawn by [`draw_routes`].
#[derive(Debug, Clone, Copy)]
struct PlacedVia {
    via: Layer,
    landing: Layer,
    cut: Rect,
}

/// Draws wires, via cuts and metal landing pads for every route.
fn draw_routes(shapes: &mut Shapes, graph: &RoutingGraph<'_>, routes: &[NetRoute]) -> Result<Vec<PlacedVia>> {
    let tech = graph.tech();
    let mut vias = Vec::new();
    for route in routes {
        for (a, b) in route.segments.iter() {
            let (pa, pb) = (graph.point(a), graph.point(b));
            if a.layer == b.layer {
                shapes.add_rect(a.layer, wire(pa, pb, tech.width(a.layer)), route.net.clone());
                continue;
            }
            let via = graph.via_between(a.layer, b.layer).ok_or_else(|| {
                Error::invariant(format!("no via joins {a} and {b} on net `{}`", route.net))
            })?;
            let rule = tech
                .via(via)
                .ok_or_else(|| Error::invariant(format!("missing rule for via `{via}`")))?;
            let cut = terminal::centered(pa, rule.width, rule.height);
            shapes.add_rect(via, cut, route.net.clone());
            let (fw, fh) = rule.footprint();
            for layer in [a.layer, b.layer].into_iter().filter(Layer::is_metal) {
                let w = tech.width(layer);
                shapes.add_rect(
                    layer,
                    terminal::centered(pa, fw.max(w), fh.max(w)),
                    route.net.clone(),
                );
            }
            let landing = if a.layer.is_metal() { b.layer } else { a.layer };
            if !landing.is_metal() {
                vias.push(PlacedVia { via, landing, cut });
            }
        }
    }
    Ok(vias)
}

/// Shortens shapes on hindering layers that crowd a via landing below them.
///
/// Each offending shape is cut back vertically to clear the via cut by the
/// spacing between the via and the hindering layer.
fn reduce_heights(shapes: &mut Shapes, tech: &Technology, vias: &[PlacedVia]) {
    for placed in vias {
        let Some(upper) = tech.hindered_by(placed.landing) else {
            continue;
        };
        let space = tech.spacing(placed.via, upper);
        let keep_out = placed.cut.expand_all(space);
        let net = shapes
            .shapes(placed.via)
            .iter()
            .find(|s| s.rect == placed.cut)
            .and_then(|s| s.net.clone());
        for shape in shapes.shapes_mut(upper).iter_mut() {
            if shape.net == net || !shape.rect.overlaps(&keep_out) {
                continue;
            }
            let r = shape.rect;
            let reduced = if keep_out.center().y < r.center().y {
                Rect::from_sides_option(r.left(), keep_out.top(), r.right(), r.top())
            } else {
                Rect::from_sides_option(r.left(), r.bot(), r.right(), keep_out.bot())
            };
            match reduced.filter(|r| r.height() >= tech.width(upper)) {
                Some(reduced) => {
                    tracing::debug!(layer = %upper, from = ?r, to = ?reduced, "reduced shape height");
                    shape.rect = reduced;
                }
                None => {
                    tracing::warn!(layer = %upper, rect = ?r, via = %placed.via, "cannot reduce shape height")
                }
            }
        }
    }
}

/// Adds net and pin labels for every route, then snaps each label onto the
/// drawn metal of its net.
///
/// Labels whose net has no metal on the label's layer are dropped.
fn place_labels(shapes: &mut Shapes, graph: &RoutingGraph<'_>, routes: &[NetRoute]) {
    for route in routes {
        let Some(node) = route
            .nodes()
            .into_iter()
            .find(|n| n.layer == Layer::Metal1)
        else {
            continue;
        };
        shapes.add_label(Label {
            layer: Layer::Metal1,
            text: route.net.clone(),
            at: graph.point(&node),
            pin: false,
        });
        if let Some(pin) = route.pin {
            shapes.add_label(Label {
                layer: pin.layer,
                text: route.net.clone(),
                at: graph.point(&pin),
                pin: true,
            });
        }
    }

    let mut labels = Vec::with_capacity(shapes.labels().len());
    for label in shapes.labels().iter() {
        let region = shapes.net_region(label.layer, &label.text);
        match region.nearest_point(label.at) {
            Some(at) => labels.push(Label { at, ..label.clone() }),
            None => tracing::warn!(net = %label.text, layer = %label.layer, "dropping label with no metal"),
        }
    }
    shapes.set_labels(labels.into_iter().unique().collect());
}

/// Checks that every pin label names a labelled net and that the pins are
/// exactly the input/output nets.
fn check_pins(shapes: &Shapes, netlist: &CellNetlist) -> Result<IndexSet<ArcStr>> {
    let labels: IndexSet<ArcStr> = shapes.labels().iter().map(|l| l.text.clone()).collect();
    let pins: IndexSet<ArcStr> = shapes
        .labels()
        .iter()
        .filter(|l| l.pin)
        .map(|l| l.text.clone())
        .collect();
    if !pins.is_subset(&labels) {
        return Err(Error::invariant(format!(
            "pin labels {:?} are not all net labels",
            pins.difference(&labels).collect::<Vec<_>>()
        )));
    }
    if pins != netlist.io_pins {
        return Err(Error::invariant(format!(
            "routed pins {:?} do not match the declared pins {:?}",
            pins, netlist.io_pins
        )));
    }
    Ok(pins)
}

/// Routes a drawn cell spanning `columns` grid columns.
///
/// The router is chosen by the technology's routing capability. On success,
/// wires, vias and labels are added to `shapes`; on failure `shapes` is left
/// untouched.
pub fn route(
    shapes: &mut Shapes,
    tech: &Technology,
    netlist: &CellNetlist,
    columns: usize,
    config: &RoutingConfig,
) -> Result<RoutingResult> {
    let _guard = tracing::info_span!("route", cell = %netlist.name, routing = ?tech.routing).entered();
    let graph = RoutingGraph::new(tech, columns);
    graph.check_connected()?;
    let terminals = find_terminals(shapes, &graph);

    let routes = match tech.routing {
        RoutingCapability::SingleMetal => {
            SingleMetalRouter::new(config.clone()).route(&graph, &terminals, netlist)?
        }
        RoutingCapability::TwoMetal => {
            TwoMetalRouter::new(config.clone()).route(&graph, &terminals, netlist)?
        }
    };

    let mut routed = shapes.clone();
    let vias = draw_routes(&mut routed, &graph, &routes)?;
    reduce_heights(&mut routed, tech, &vias);
    place_labels(&mut routed, &graph, &routes);
    let pins = check_pins(&routed, netlist)?;
    *shapes = routed;

    tracing::info!(nets = routes.len(), pins = pins.len(), "routed cell");
    Ok(RoutingResult {
        routed_nets: routes,
        pins,
    })
}
