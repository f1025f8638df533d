//! Routing with metal 1 only.
//!
//! Each net is connected by a minimum spanning tree over the metal 1 positions
//! above its access nodes. Terminals only connect along a shared track, so the
//! drawn contacts provide all vertical connectivity.

use arcstr::ArcStr;
use indexmap::IndexSet;
use pathfinding::undirected::kruskal::kruskal_indices;
use rustc_hash::FxHashMap;

use crate::config::RoutingConfig;
use crate::error::{Error, Result};
use crate::netlist::CellNetlist;
use crate::tech::Layer;

use super::{forced_pin, nets_to_route, GridNode, NetRoute, Router, RoutingGraph, Terminal};

/// Metal 1 grid positions claimed by nets.
#[derive(Debug, Default, Clone)]
struct Occupancy {
    owners: FxHashMap<(usize, usize), ArcStr>,
}

impl Occupancy {
    fn is_free(&self, x: usize, y: usize, net: &str) -> bool {
        self.owners.get(&(x, y)).map_or(true, |owner| owner == net)
    }

    fn span_is_free(&self, y: usize, x0: usize, x1: usize, net: &str) -> bool {
        (x0.min(x1)..=x0.max(x1)).all(|x| self.is_free(x, y, net))
    }

    fn claim(&mut self, x: usize, y: usize, net: &ArcStr) {
        self.owners.entry((x, y)).or_insert_with(|| net.clone());
    }

    /// Claims a wire's span and one end-of-line step past each end.
    fn claim_wire(&mut self, y: usize, x0: usize, x1: usize, columns: usize, net: &ArcStr) {
        let (lo, hi) = (x0.min(x1), x0.max(x1));
        for x in lo.saturating_sub(1)..=(hi + 1).min(columns - 1) {
            self.claim(x, y, net);
        }
    }
}

/// A node from which a net may be reached, with its terminal.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    terminal: usize,
    node: GridNode,
}

impl Candidate {
    fn m1(&self) -> GridNode {
        self.node.with_layer(Layer::Metal1)
    }
}

/// Routes every net on metal 1 with a minimum spanning tree.
#[derive(Debug, Clone, Default)]
pub struct SingleMetalRouter {
    config: RoutingConfig,
}

impl SingleMetalRouter {
    /// Creates a new [`SingleMetalRouter`].
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    fn route_net(
        &self,
        graph: &RoutingGraph<'_>,
        net: &ArcStr,
        terminals: &[&Terminal],
        is_io: bool,
        occupancy: &mut Occupancy,
    ) -> Result<NetRoute> {
        let mut route = NetRoute::new(net.clone());
        let columns = graph.columns();

        if let [terminal] = terminals {
            let (access, m1) = forced_pin(graph, terminal, |n| occupancy.is_free(n.x, n.y, net))
                .ok_or_else(|| Error::infeasible(net.clone(), "no free track above the pin"))?;
            route.segments.push((access, m1));
            occupancy.claim_wire(m1.y, m1.x, m1.x, columns, net);
            if let Some(end) = self.pin_extension(m1, columns, net, occupancy) {
                route.segments.push((m1, end));
                occupancy.claim_wire(m1.y, m1.x, end.x, columns, net);
            }
            route.pin = Some(m1);
            tracing::debug!(%net, pin = %m1, "placed lone pin");
            return Ok(route);
        }

        let candidates: Vec<Candidate> = terminals
            .iter()
            .enumerate()
            .flat_map(|(terminal, t)| t.nodes.iter().map(move |&node| Candidate { terminal, node }))
            .collect();
        let edges = self.edges(graph, net, &candidates, is_io, occupancy);
        let tree: Vec<(usize, usize, u64)> = kruskal_indices(candidates.len(), &edges).collect();
        if tree.len() + 1 != candidates.len() {
            return Err(Error::infeasible(
                net.clone(),
                format!(
                    "{} terminals cannot be joined on shared metal 1 tracks",
                    terminals.len()
                ),
            ));
        }

        let mut used: IndexSet<usize> = IndexSet::new();
        for &(i, j, _) in tree.iter() {
            let (a, b) = (candidates[i], candidates[j]);
            if a.terminal == b.terminal {
                continue;
            }
            used.insert(i);
            used.insert(j);
            let (ma, mb) = (a.m1(), b.m1());
            if ma.x != mb.x {
                route.segments.push((ma, mb));
            }
            occupancy.claim_wire(ma.y, ma.x, mb.x, columns, net);
        }
        for &i in used.iter() {
            let c = candidates[i];
            if c.node.layer != Layer::Metal1 {
                route.segments.push((c.node, c.m1()));
            }
        }
        if is_io {
            route.pin = route.center_node(graph.center_track());
        }
        tracing::debug!(%net, segments = route.segments.len(), "routed net");
        Ok(route)
    }

    /// The edges of the complete candidate graph that can be drawn.
    ///
    /// Candidates of one terminal are chained at no cost. Candidates of different
    /// terminals are joined when they share a track whose span is free.
    fn edges(
        &self,
        graph: &RoutingGraph<'_>,
        net: &ArcStr,
        candidates: &[Candidate],
        is_io: bool,
        occupancy: &Occupancy,
    ) -> Vec<(usize, usize, u64)> {
        let weight = graph.tech().weights.layer(Layer::Metal1);
        let center = graph.center_track();
        let mut edges = Vec::new();
        for (i, a) in candidates.iter().enumerate() {
            for (j, b) in candidates.iter().enumerate().skip(i + 1) {
                if a.terminal == b.terminal {
                    if j == i + 1 {
                        edges.push((i, j, 0));
                    }
                    continue;
                }
                let (ma, mb) = (a.m1(), b.m1());
                if ma.y != mb.y || !occupancy.span_is_free(ma.y, ma.x, mb.x, net) {
                    continue;
                }
                let dx = ma.x.abs_diff(mb.x);
                let mut cost = dx as u64 * weight + self.config.center_bias * ma.y.abs_diff(center) as u64;
                if is_io && dx < self.config.min_pin_span {
                    cost += self.config.short_span_penalty;
                }
                edges.push((i, j, cost));
            }
        }
        edges
    }

    /// A free metal 1 node extending a lone pin to the minimum pin span.
    ///
    /// Pins always get a wire of at least one step. If the minimum span does
    /// not fit, a single step is used instead.
    fn pin_extension(
        &self,
        pin: GridNode,
        columns: usize,
        net: &ArcStr,
        occupancy: &Occupancy,
    ) -> Option<GridNode> {
        let reach = |span: usize| {
            let right = Some(pin.x + span).filter(|&x| x < columns);
            let left = pin.x.checked_sub(span);
            [right, left]
                .into_iter()
                .flatten()
                .find(|&x| occupancy.span_is_free(pin.y, pin.x, x, net))
        };
        let span = self.config.min_pin_span.max(1);
        let end = reach(span).or_else(|| {
            if span == 1 {
                return None;
            }
            tracing::warn!(%net, %pin, span, "cannot extend pin to its minimum span");
            reach(1)
        });
        if end.is_none() {
            tracing::warn!(%net, %pin, "no room for a pin wire");
        }
        end.map(|x| GridNode { x, ..pin })
    }
}

impl Router for SingleMetalRouter {
    fn route(
        &self,
        graph: &RoutingGraph<'_>,
        terminals: &[Terminal],
        netlist: &CellNetlist,
    ) -> Result<Vec<NetRoute>> {
        let mut occupancy = Occupancy::default();
        for t in terminals.iter().filter(|t| t.layer == Layer::Metal1) {
            for n in t.nodes.iter() {
                occupancy.claim(n.x, n.y, &t.net);
            }
        }

        let nets = nets_to_route(terminals, netlist)?;
        let mut routes = Vec::with_capacity(nets.len());
        for (net, idxs) in nets {
            let terms: Vec<&Terminal> = idxs.iter().map(|&i| &terminals[i]).collect();
            routes.push(self.route_net(graph, &net, &terms, netlist.is_io(&net), &mut occupancy)?);
        }
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::cell::Cell;
    use crate::draw::{columns, draw};
    use crate::netlist::{ChannelType, Transistor};
    use crate::route::find_terminals;
    use crate::tests::{cfet_tech, finfet_tech, inv};

    fn inv_cell() -> Cell {
        Cell::new(
            vec![Some(Transistor::new("mp", ChannelType::Pmos, "vdd", "a", "y"))],
            vec![Some(Transistor::new("mn", ChannelType::Nmos, "vss", "a", "y"))],
        )
    }

    fn route_inv(config: RoutingConfig) -> Vec<NetRoute> {
        let tech = cfet_tech();
        let cells = [inv_cell()];
        let shapes = draw(&cells, &tech, &inv()).unwrap();
        let graph = RoutingGraph::new(&tech, columns(&cells));
        let terminals = find_terminals(&shapes, &graph);
        SingleMetalRouter::new(config)
            .route(&graph, &terminals, &inv())
            .unwrap()
    }

    #[test]
    fn cfet_inverter() {
        let routes = route_inv(RoutingConfig::default());
        let nets: Vec<&str> = routes.iter().map(|r| r.net.as_str()).collect();
        assert_eq!(nets, vec!["a", "y", "vdd", "vss"]);

        // The gate takes the center track, and the output the next free one.
        assert_eq!(routes[0].pin, Some(GridNode::new(Layer::Metal1, 1, 3)));
        assert_eq!(routes[1].pin, Some(GridNode::new(Layer::Metal1, 2, 2)));

        // Supplies drop a via from their contact onto the rail.
        assert_eq!(
            routes[3].segments,
            vec![(GridNode::new(Layer::DiffCon, 0, 0), GridNode::new(Layer::Metal1, 0, 0))]
        );
        assert_eq!(routes[2].pin, None);
    }

    #[test]
    fn lone_pin_gets_a_via_and_a_wire() {
        let routes = route_inv(RoutingConfig::default());
        let a = &routes[0];
        let pin = a.pin.unwrap();
        assert_eq!(a.vias().count(), 1);
        let wires: Vec<_> = a.wires().collect();
        assert_eq!(wires, vec![&(pin, GridNode::new(Layer::Metal1, 2, 3))]);

        let routes = route_inv(RoutingConfig {
            min_pin_span: 2,
            ..Default::default()
        });
        // Two steps do not fit in three columns, so the pin keeps a single step.
        let wires: Vec<_> = routes[0].wires().collect();
        assert_eq!(wires, vec![&(pin, GridNode::new(Layer::Metal1, 2, 3))]);
    }

    #[test]
    fn terminals_without_a_shared_track_are_infeasible() {
        let tech = finfet_tech();
        let cells = [inv_cell()];
        let shapes = draw(&cells, &tech, &inv()).unwrap();
        let graph = RoutingGraph::new(&tech, columns(&cells));
        let terminals = find_terminals(&shapes, &graph);
        let err = SingleMetalRouter::default()
            .route(&graph, &terminals, &inv())
            .unwrap_err();
        assert!(matches!(err, Error::RoutingInfeasible { ref net, .. } if net == "y"));
    }

    #[test]
    fn occupied_spans_block_other_nets() {
        let mut occupancy = Occupancy::default();
        let a: ArcStr = "a".into();
        occupancy.claim_wire(2, 1, 3, 6, &a);
        assert!(!occupancy.is_free(0, 2, "b"));
        assert!(!occupancy.is_free(4, 2, "b"));
        assert!(occupancy.is_free(5, 2, "b"));
        assert!(occupancy.span_is_free(2, 0, 5, "a"));
        assert!(!occupancy.span_is_free(2, 4, 5, "b"));
        assert!(occupancy.span_is_free(3, 0, 5, "b"));
    }
}
