//! Routing with metal 1 and metal 2.
//!
//! Nets are routed one at a time by growing a shortest path tree from one
//! terminal to the others. A net that cannot be routed rips up the most recently
//! routed net, and both are queued again.

use std::collections::VecDeque;

use arcstr::ArcStr;
use indexmap::{IndexMap, IndexSet};
use pathfinding::prelude::dijkstra;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::RoutingConfig;
use crate::error::{Error, Result};
use crate::netlist::CellNetlist;
use crate::tech::Layer;

use super::{forced_pin, nets_to_route, GridNode, NetRoute, Router, RoutingGraph, Terminal};

/// The routing state of a net.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NetState {
    /// Waiting to be routed for the first time.
    Queued,
    /// Routed, with its nodes reserved.
    Routed,
    /// Failed or ripped up, and waiting to be routed again.
    FailedRequeued,
}

/// Grid nodes reserved by routed nets.
#[derive(Debug, Default, Clone)]
struct Reservations {
    /// Rail nodes, which are never released.
    fixed: FxHashMap<GridNode, ArcStr>,
    routed: FxHashMap<GridNode, ArcStr>,
}

impl Reservations {
    fn is_free(&self, node: &GridNode, net: &str) -> bool {
        [&self.fixed, &self.routed]
            .into_iter()
            .all(|map| map.get(node).map_or(true, |owner| owner == net))
    }

    /// Reserves the nodes of `route` and their along-track neighbors on metal layers.
    fn reserve(&mut self, graph: &RoutingGraph<'_>, route: &NetRoute) {
        for node in route.nodes() {
            if node.layer.is_metal() {
                for (n, _) in graph.track_successors(&node) {
                    self.routed.entry(n).or_insert_with(|| route.net.clone());
                }
            }
            self.routed.entry(node).or_insert_with(|| route.net.clone());
        }
    }

    fn release(&mut self, net: &str) {
        self.routed.retain(|_, owner| owner != net);
    }
}

/// Routes nets over two metal layers with rip-up and reroute.
#[derive(Debug, Clone, Default)]
pub struct TwoMetalRouter {
    config: RoutingConfig,
}

impl TwoMetalRouter {
    /// Creates a new [`TwoMetalRouter`].
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// Connects every terminal of `net`, or returns [`None`] if some terminal
    /// cannot be reached under the current reservations.
    fn route_net(
        &self,
        graph: &RoutingGraph<'_>,
        net: &ArcStr,
        terminals: &[&Terminal],
        is_io: bool,
        reservations: &Reservations,
    ) -> Option<NetRoute> {
        let mut route = NetRoute::new(net.clone());
        if let [terminal] = terminals {
            let (access, m1) = forced_pin(graph, terminal, |n| reservations.is_free(n, net))?;
            route.segments.push((access, m1));
            // A one-step stub, preferring the right-hand neighbor.
            match graph
                .track_successors(&m1)
                .into_iter()
                .rev()
                .map(|(n, _)| n)
                .find(|n| reservations.is_free(n, net))
            {
                Some(end) => route.segments.push((m1, end)),
                None => tracing::warn!(%net, pin = %m1, "no room for a pin wire"),
            }
            route.pin = Some(m1);
            return Some(route);
        }

        let own: FxHashSet<GridNode> = terminals
            .iter()
            .flat_map(|t| t.nodes.iter().copied())
            .collect();
        let mut tree: IndexSet<GridNode> = terminals[0].nodes.clone();
        let mut pending: Vec<&Terminal> = terminals[1..].to_vec();

        let successors = |node: &Option<GridNode>| -> Vec<(Option<GridNode>, u64)> {
            let Some(node) = node else {
                return Vec::new();
            };
            let mut out = if graph.is_access(node.layer) {
                Vec::new()
            } else {
                graph.track_successors(node)
            };
            out.extend(graph.via_successors(node));
            out.into_iter()
                .filter(|(n, _)| {
                    if graph.is_access(n.layer) {
                        own.contains(n)
                    } else {
                        reservations.is_free(n, net)
                    }
                })
                .map(|(n, c)| (Some(n), c))
                .collect()
        };

        while !pending.is_empty() {
            let (path, _) = dijkstra(
                &None,
                |node| match node {
                    None => tree.iter().map(|n| (Some(*n), 0)).collect(),
                    Some(_) => successors(node),
                },
                |node| node.is_some_and(|n| pending.iter().any(|t| t.contains(&n))),
            )?;
            let path: Vec<GridNode> = path.into_iter().flatten().collect();
            let last = path.last().copied()?;
            let reached = pending.iter().position(|t| t.contains(&last))?;
            let terminal = pending.swap_remove(reached);
            route.segments.extend(merge_collinear(&path));
            tree.extend(path);
            tree.extend(terminal.nodes.iter().copied());
        }
        if is_io {
            route.pin = route.center_node(graph.center_track());
        }
        Some(route)
    }
}

/// Converts a path into segments, joining consecutive steps along one track.
fn merge_collinear(path: &[GridNode]) -> Vec<(GridNode, GridNode)> {
    let mut out: Vec<(GridNode, GridNode)> = Vec::new();
    for step in path.windows(2) {
        let (a, b) = (step[0], step[1]);
        if let Some(last) = out.last_mut() {
            let same_track = last.1 == a
                && last.0.layer == a.layer
                && a.layer == b.layer
                && ((last.0.x == b.x && a.x == b.x) || (last.0.y == b.y && a.y == b.y));
            if same_track {
                last.1 = b;
                continue;
            }
        }
        out.push((a, b));
    }
    out
}

impl Router for TwoMetalRouter {
    fn route(
        &self,
        graph: &RoutingGraph<'_>,
        terminals: &[Terminal],
        netlist: &CellNetlist,
    ) -> Result<Vec<NetRoute>> {
        let mut reservations = Reservations::default();
        for t in terminals.iter().filter(|t| t.layer == Layer::Metal1) {
            for n in t.nodes.iter() {
                reservations.fixed.insert(*n, t.net.clone());
            }
        }

        let nets: IndexMap<ArcStr, Vec<usize>> = nets_to_route(terminals, netlist)?.into_iter().collect();
        let total = nets.len();
        let mut states: IndexMap<ArcStr, NetState> =
            nets.keys().map(|n| (n.clone(), NetState::Queued)).collect();
        let mut queue: VecDeque<ArcStr> = nets.keys().cloned().collect();
        let mut routed: Vec<NetRoute> = Vec::new();
        let mut seen: FxHashSet<Vec<ArcStr>> = FxHashSet::default();
        let mut iterations = 0;

        while let Some(net) = queue.pop_front() {
            iterations += 1;
            if iterations > self.config.max_iterations {
                return Err(Error::infeasible(
                    net,
                    format!("no routing found within {} iterations", self.config.max_iterations),
                ));
            }
            let terms: Vec<&Terminal> = nets[&net].iter().map(|&i| &terminals[i]).collect();
            match self.route_net(graph, &net, &terms, netlist.is_io(&net), &reservations) {
                Some(route) => {
                    tracing::debug!(%net, segments = route.segments.len(), "routed net");
                    reservations.reserve(graph, &route);
                    routed.push(route);
                    states.insert(net, NetState::Routed);
                }
                None => {
                    states.insert(net.clone(), NetState::FailedRequeued);
                    let Some(ripped) = routed.pop() else {
                        tracing::debug!(%net, "failed with nothing to rip up");
                        queue.push_back(net);
                        continue;
                    };
                    tracing::info!(%net, ripped = %ripped.net, "ripping up net");
                    reservations.release(&ripped.net);
                    states.insert(ripped.net.clone(), NetState::FailedRequeued);
                    queue.push_front(ripped.net);
                    queue.push_front(net);

                    if !seen.insert(queue.iter().cloned().collect()) {
                        if let Some(extra) = routed.pop() {
                            tracing::info!(ripped = %extra.net, "breaking routing cycle");
                            reservations.release(&extra.net);
                            states.insert(extra.net.clone(), NetState::FailedRequeued);
                            queue.insert(2, extra.net);
                        }
                    }
                }
            }
        }

        let done = states.values().filter(|s| **s == NetState::Routed).count();
        if done != total || routed.len() != total {
            return Err(Error::invariant(format!(
                "routing finished with {done} of {total} nets routed"
            )));
        }
        tracing::debug!(nets = total, iterations, "two metal routing complete");

        // Report routes in the order nets were first queued.
        let order: FxHashMap<&ArcStr, usize> = nets.keys().enumerate().map(|(i, n)| (n, i)).collect();
        routed.sort_by_key(|r| order.get(&r.net).copied().unwrap_or(usize::MAX));
        Ok(routed)
    }
}

#[cfg(test)]
mod tests {
    use indexmap::indexset;
    use test_log::test;

    use super::*;
    use crate::cell::Cell;
    use crate::draw::{columns, draw};
    use crate::netlist::{ChannelType, Transistor};
    use crate::route::find_terminals;
    use crate::tests::{gaa_tech, inv, multiheight_tech, nand2};

    fn inv_cell() -> Cell {
        Cell::new(
            vec![Some(Transistor::new("mp", ChannelType::Pmos, "vdd", "a", "y"))],
            vec![Some(Transistor::new("mn", ChannelType::Nmos, "vss", "a", "y"))],
        )
    }

    fn terminal(net: &str, nodes: impl IntoIterator<Item = GridNode>) -> Terminal {
        Terminal {
            net: net.into(),
            layer: Layer::DiffCon,
            nodes: nodes.into_iter().collect(),
            region: Default::default(),
        }
    }

    #[test]
    fn inverter_output_crosses_on_metal2() {
        let tech = gaa_tech();
        let cells = [inv_cell()];
        let shapes = draw(&cells, &tech, &inv()).unwrap();
        let graph = RoutingGraph::new(&tech, columns(&cells));
        let terminals = find_terminals(&shapes, &graph);
        let routes = TwoMetalRouter::default().route(&graph, &terminals, &inv()).unwrap();
        assert_eq!(routes.len(), 4);

        let y = &routes[1];
        assert_eq!(y.net, "y");
        assert_eq!(
            y.segments,
            vec![
                (GridNode::new(Layer::DiffCon, 2, 2), GridNode::new(Layer::Metal1, 2, 2)),
                (GridNode::new(Layer::Metal1, 2, 2), GridNode::new(Layer::Metal2, 2, 2)),
                (GridNode::new(Layer::Metal2, 2, 2), GridNode::new(Layer::Metal2, 2, 5)),
                (GridNode::new(Layer::Metal2, 2, 5), GridNode::new(Layer::Metal1, 2, 5)),
                (GridNode::new(Layer::Metal1, 2, 5), GridNode::new(Layer::DiffCon, 2, 5)),
            ]
        );
        assert_eq!(y.pin, Some(GridNode::new(Layer::Metal1, 2, 2)));
        assert_eq!(routes[0].pin, Some(GridNode::new(Layer::Metal1, 1, 3)));
    }

    #[test]
    fn lone_pin_gets_a_via_and_a_wire() {
        let tech = gaa_tech();
        let cells = [inv_cell()];
        let shapes = draw(&cells, &tech, &inv()).unwrap();
        let graph = RoutingGraph::new(&tech, columns(&cells));
        let terminals = find_terminals(&shapes, &graph);
        let routes = TwoMetalRouter::new(RoutingConfig::default())
            .route(&graph, &terminals, &inv())
            .unwrap();
        let a = &routes[0];
        assert_eq!(a.net, "a");
        assert_eq!(a.vias().count(), 1);
        assert_eq!(
            a.wires().collect::<Vec<_>>(),
            vec![&(GridNode::new(Layer::Metal1, 1, 3), GridNode::new(Layer::Metal1, 2, 3))]
        );
    }

    #[test]
    fn nand2_and_multiheight_cells_route() {
        let tech = gaa_tech();
        let netlist = nand2();
        let cell = Cell::new(
            vec![
                Some(Transistor::new("p0", ChannelType::Pmos, "vdd", "a", "y")),
                Some(Transistor::new("p1", ChannelType::Pmos, "y", "b", "vdd")),
            ],
            vec![
                Some(Transistor::new("n0", ChannelType::Nmos, "vss", "a", "x")),
                Some(Transistor::new("n1", ChannelType::Nmos, "x", "b", "y")),
            ],
        );
        let cells = [cell];
        let shapes = draw(&cells, &tech, &netlist).unwrap();
        let graph = RoutingGraph::new(&tech, columns(&cells));
        let terminals = find_terminals(&shapes, &graph);
        let routes = TwoMetalRouter::default().route(&graph, &terminals, &netlist).unwrap();
        let names: IndexSet<&str> = routes.iter().map(|r| r.net.as_str()).collect();
        assert_eq!(names.len(), 5);
        assert!(!names.contains("x"));

        let tech = multiheight_tech();
        let cells = [inv_cell(), inv_cell()];
        let shapes = draw(&cells, &tech, &inv()).unwrap();
        let graph = RoutingGraph::new(&tech, columns(&cells));
        let terminals = find_terminals(&shapes, &graph);
        let routes = TwoMetalRouter::default().route(&graph, &terminals, &inv()).unwrap();
        let routed: IndexSet<&str> = routes.iter().map(|r| r.net.as_str()).collect();
        assert_eq!(routed, indexset! {"a", "y", "vdd", "vss"});
    }

    #[test]
    fn blocked_net_rips_up_the_last_route() {
        // `p` first takes track 3 straight across, which covers the only access to `q`.
        let tech = gaa_tech();
        let graph = RoutingGraph::new(&tech, 5);
        let terminals = vec![
            terminal("p", [GridNode::new(Layer::DiffCon, 0, 3)]),
            terminal("p", [GridNode::new(Layer::DiffCon, 4, 3)]),
            terminal("q", [GridNode::new(Layer::DiffCon, 2, 3)]),
            terminal("q", [GridNode::new(Layer::DiffCon, 2, 5)]),
        ];
        let netlist = CellNetlist::new("t", vec![], Vec::<ArcStr>::new(), Default::default());
        let routes = TwoMetalRouter::default().route(&graph, &terminals, &netlist).unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].net, "p");
        let nodes: Vec<IndexSet<GridNode>> = routes.iter().map(NetRoute::nodes).collect();
        assert!(nodes[0].is_disjoint(&nodes[1]));
        // After the rip-up, `p` detours over metal 2.
        assert!(nodes[0].iter().any(|n| n.layer == Layer::Metal2));
        assert!(nodes[1].contains(&GridNode::new(Layer::Metal1, 2, 3)));
    }

    #[test]
    fn iteration_cap_is_a_hard_failure() {
        let tech = gaa_tech();
        let graph = RoutingGraph::new(&tech, 1);
        // The only metal 1 node above `p`'s lower terminal belongs to `q`.
        let terminals = vec![
            terminal("p", [GridNode::new(Layer::DiffCon, 0, 3)]),
            terminal("p", [GridNode::new(Layer::DiffCon, 0, 5)]),
            Terminal {
                layer: Layer::Metal1,
                ..terminal("q", [GridNode::new(Layer::Metal1, 0, 3)])
            },
        ];
        let netlist = CellNetlist::new("t", vec![], Vec::<ArcStr>::new(), Default::default());
        let router = TwoMetalRouter::new(RoutingConfig {
            max_iterations: 3,
            ..Default::default()
        });
        let err = router.route(&graph, &terminals, &netlist).unwrap_err();
        assert!(matches!(err, Error::RoutingInfeasible { ref net, .. } if net == "p"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn collinear_steps_are_merged() {
        let path = [
            GridNode::new(Layer::DiffCon, 0, 1),
            GridNode::new(Layer::Metal1, 0, 1),
            GridNode::new(Layer::Metal1, 1, 1),
            GridNode::new(Layer::Metal1, 2, 1),
            GridNode::new(Layer::Metal2, 2, 1),
            GridNode::new(Layer::Metal2, 2, 2),
        ];
        assert_eq!(
            merge_collinear(&path),
            vec![
                (path[0], path[1]),
                (path[1], path[3]),
                (path[3], path[4]),
                (path[4], path[5]),
            ]
        );
    }
}
