//! The routing grid graph.

use std::fmt::Display;

use geometry::prelude::*;
use pathfinding::prelude::bfs_reach;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tech::{Layer, RoutingCapability, Technology};

/// A node of the routing graph: a layer and a grid position.
///
/// `x` indexes grid columns and `y` indexes metal 1 tracks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridNode {
    /// The layer.
    pub layer: Layer,
    /// The grid column.
    pub x: usize,
    /// The track.
    pub y: usize,
}

impl GridNode {
    /// Creates a new [`GridNode`].
    #[inline]
    pub const fn new(layer: Layer, x: usize, y: usize) -> Self {
        Self { layer, x, y }
    }

    /// The node at the same position on another layer.
    #[inline]
    pub const fn with_layer(&self, layer: Layer) -> Self {
        Self { layer, ..*self }
    }
}

impl Display for GridNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {})", self.layer, self.x, self.y)
    }
}

/// The routing graph of one cell.
///
/// Access layers connect vertically along a contact, metal 1 routes horizontally
/// and metal 2 vertically. Every access layer joins metal 1 through its access via,
/// and metal 1 joins metal 2 through `via1`.
#[derive(Debug, Clone)]
pub struct RoutingGraph<'a> {
    tech: &'a Technology,
    columns: usize,
    tracks: usize,
    layers: Vec<Layer>,
}

impl<'a> RoutingGraph<'a> {
    /// Creates the routing graph of a cell spanning `columns` grid columns.
    pub fn new(tech: &'a Technology, columns: usize) -> Self {
        let mut layers = tech.layer_map().access_layers().to_vec();
        layers.extend_from_slice(tech.routing.metals());
        Self {
            tech,
            columns,
            tracks: tech.total_tracks(),
            layers,
        }
    }

    /// The technology.
    #[inline]
    pub fn tech(&self) -> &'a Technology {
        self.tech
    }

    /// The number of grid columns.
    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// The number of tracks.
    #[inline]
    pub fn tracks(&self) -> usize {
        self.tracks
    }

    /// The routable layers, access layers first.
    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The track closest to the vertical center of the cell.
    #[inline]
    pub fn center_track(&self) -> usize {
        (self.tracks - 1) / 2
    }

    /// Returns `true` if `layer` is a device access layer.
    pub fn is_access(&self, layer: Layer) -> bool {
        self.tech.layer_map().access_layers().contains(&layer)
    }

    /// Returns `true` if the graph contains `node`.
    pub fn contains(&self, node: &GridNode) -> bool {
        node.x < self.columns && node.y < self.tracks && self.layers.contains(&node.layer)
    }

    /// Every node on `layer`, column-major.
    pub fn nodes_on(&self, layer: Layer) -> impl Iterator<Item = GridNode> + '_ {
        (0..self.columns)
            .flat_map(move |x| (0..self.tracks).map(move |y| GridNode::new(layer, x, y)))
    }

    /// Every node of the graph.
    pub fn nodes(&self) -> impl Iterator<Item = GridNode> + '_ {
        self.layers.iter().flat_map(move |layer| self.nodes_on(*layer))
    }

    /// The number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.layers.len() * self.columns * self.tracks
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The physical location of `node`.
    #[inline]
    pub fn point(&self, node: &GridNode) -> Point {
        Point::new(self.tech.x(node.x), self.tech.y(node.y))
    }

    /// The via layer joining `a` and `b`, if the graph has an edge between them.
    pub fn via_between(&self, a: Layer, b: Layer) -> Option<Layer> {
        let map = self.tech.layer_map();
        match (a, b) {
            (Layer::Metal1, Layer::Metal2) | (Layer::Metal2, Layer::Metal1) => {
                (self.tech.routing == RoutingCapability::TwoMetal).then_some(Layer::Via1)
            }
            (access, Layer::Metal1) | (Layer::Metal1, access) => map.access_via(access),
            _ => None,
        }
    }

    /// The via edges of `node`, as `(neighbor, cost)`.
    pub fn via_successors(&self, node: &GridNode) -> Vec<(GridNode, u64)> {
        let weights = &self.tech.weights;
        let mut out = Vec::new();
        let mut push = |layer: Layer| {
            if let Some(via) = self.via_between(node.layer, layer) {
                out.push((node.with_layer(layer), weights.via(via)));
            }
        };
        match node.layer {
            Layer::Metal1 => {
                for &access in self.tech.layer_map().access_layers() {
                    push(access);
                }
                push(Layer::Metal2);
            }
            Layer::Metal2 => push(Layer::Metal1),
            _ => push(Layer::Metal1),
        }
        out
    }

    /// The same-layer edges of `node`, as `(neighbor, cost)`.
    pub fn track_successors(&self, node: &GridNode) -> Vec<(GridNode, u64)> {
        let weight = self.tech.weights.layer(node.layer);
        let mut out = Vec::with_capacity(2);
        let horizontal = node.layer == Layer::Metal1;
        let (pos, len) = if horizontal {
            (node.x, self.columns)
        } else {
            (node.y, self.tracks)
        };
        for next in [pos.checked_sub(1), Some(pos + 1).filter(|&p| p < len)]
            .into_iter()
            .flatten()
        {
            let n = if horizontal {
                GridNode { x: next, ..*node }
            } else {
                GridNode { y: next, ..*node }
            };
            out.push((n, weight));
        }
        out
    }

    /// Every edge of `node`, as `(neighbor, cost)`.
    pub fn successors(&self, node: &GridNode) -> Vec<(GridNode, u64)> {
        let mut out = self.track_successors(node);
        out.extend(self.via_successors(node));
        out
    }

    /// Checks that every node is reachable from every other node.
    ///
    /// A disconnected graph indicates an inconsistent technology.
    pub fn check_connected(&self) -> Result<()> {
        let Some(start) = self.nodes().next() else {
            return Err(Error::invariant("routing graph is empty"));
        };
        let reached = bfs_reach(start, |n| {
            self.successors(n).into_iter().map(|(n, _)| n).collect::<Vec<_>>()
        })
        .count();
        if reached != self.len() {
            return Err(Error::invariant(format!(
                "routing graph is disconnected: {reached} of {} nodes reachable from {start}",
                self.len()
            )));
        }
        tracing::debug!(nodes = reached, "routing graph is connected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::tech::RoutingWeights;
    use crate::tests::{cfet_tech, gaa_tech};

    #[test]
    fn graph_is_connected() {
        let tech = gaa_tech();
        let graph = RoutingGraph::new(&tech, 5);
        assert_eq!(graph.len(), 4 * 5 * 8);
        graph.check_connected().unwrap();

        let tech = cfet_tech();
        let graph = RoutingGraph::new(&tech, 3);
        assert_eq!(graph.layers(), &[Layer::DiffCon, Layer::DiffConTop, Layer::GateCon, Layer::Metal1]);
        graph.check_connected().unwrap();
    }

    #[test]
    fn edges_follow_layer_directions() {
        let tech = gaa_tech();
        let graph = RoutingGraph::new(&tech, 5);
        let m1 = GridNode::new(Layer::Metal1, 0, 3);
        let tracks: Vec<GridNode> = graph.track_successors(&m1).into_iter().map(|(n, _)| n).collect();
        assert_eq!(tracks, vec![GridNode::new(Layer::Metal1, 1, 3)]);

        let m2 = GridNode::new(Layer::Metal2, 2, 7);
        let tracks: Vec<GridNode> = graph.track_successors(&m2).into_iter().map(|(n, _)| n).collect();
        assert_eq!(tracks, vec![GridNode::new(Layer::Metal2, 2, 6)]);

        let vias = graph.via_successors(&m1);
        assert_eq!(vias.len(), 3);
        assert!(vias.iter().all(|(_, cost)| *cost == RoutingWeights::DEFAULT_VIA_WEIGHT));
        assert_eq!(graph.via_between(Layer::DiffCon, Layer::Metal1), Some(Layer::Via0));
        assert_eq!(graph.via_between(Layer::DiffCon, Layer::Metal2), None);
    }

    #[test]
    fn single_metal_graphs_have_no_metal2() {
        let tech = cfet_tech();
        let graph = RoutingGraph::new(&tech, 3);
        assert!(!graph.contains(&GridNode::new(Layer::Metal2, 0, 0)));
        assert_eq!(graph.via_between(Layer::Metal1, Layer::Metal2), None);
        assert_eq!(graph.via_between(Layer::DiffCon, Layer::Metal1), Some(Layer::ViaDeep));
    }
}
