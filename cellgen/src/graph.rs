//! Net-level connectivity multigraphs.
//!
//! Nodes are nets and edges are transistors, directed from source to drain.
//! Parallel edges are allowed, since two transistors can share both diffusion nets.

use std::fmt::Display;

use arcstr::ArcStr;
use ena::unify::{InPlaceUnificationTable, UnifyKey};
use indexmap::IndexSet;

use crate::netlist::{PowerNets, Transistor};
use crate::place::budget::{Search, SearchBudget};

/// A node of a [`Multigraph`].
///
/// Supply nets are split into one node per occurrence when building a
/// [partitioning graph](Multigraph::with_split_power); `occurrence` tells the copies apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetNode {
    /// The net name.
    pub net: ArcStr,
    /// The occurrence counter of a split supply net.
    pub occurrence: Option<usize>,
}

impl NetNode {
    fn net(net: &ArcStr) -> Self {
        Self {
            net: net.clone(),
            occurrence: None,
        }
    }
}

impl Display for NetNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.occurrence {
            Some(n) => write!(f, "{}#{}", self.net, n),
            None => write!(f, "{}", self.net),
        }
    }
}

/// An edge of a [`Multigraph`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    /// The index of the node at the transistor's source.
    pub src: usize,
    /// The index of the node at the transistor's drain.
    pub dst: usize,
    /// The transistor, or [`None`] for an edge added to balance node degrees.
    pub transistor: Option<Transistor>,
}

impl Edge {
    /// The endpoint of this edge opposite `node`.
    #[inline]
    pub fn other(&self, node: usize) -> usize {
        if node == self.src {
            self.dst
        } else {
            self.src
        }
    }

    /// Returns `true` if this edge was added by degree balancing.
    #[inline]
    pub fn is_balancing(&self) -> bool {
        self.transistor.is_none()
    }
}

/// A net-level multigraph with one edge per transistor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multigraph {
    nodes: IndexSet<NetNode>,
    edges: Vec<Edge>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeKey(u32);

impl UnifyKey for NodeKey {
    type Value = ();

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        Self(u)
    }

    fn tag() -> &'static str {
        "NodeKey"
    }
}

impl Multigraph {
    /// Builds the multigraph of the given transistors.
    pub fn new<'a>(transistors: impl IntoIterator<Item = &'a Transistor>) -> Self {
        let mut graph = Self::default();
        for t in transistors {
            let src = graph.add_node(NetNode::net(&t.source));
            let dst = graph.add_node(NetNode::net(&t.drain));
            graph.add_edge(src, dst, Some(t.clone()));
        }
        graph
    }

    /// Builds the multigraph of the given transistors, with every occurrence of a
    /// supply net as a distinct node.
    ///
    /// Supply nets then never join unrelated transistors into one component.
    pub fn with_split_power<'a>(
        transistors: impl IntoIterator<Item = &'a Transistor>,
        power: &PowerNets,
    ) -> Self {
        let mut graph = Self::default();
        let mut counter = 0;
        let mut node = |graph: &mut Self, net: &ArcStr| {
            let mut node = NetNode::net(net);
            if power.contains(net) {
                node.occurrence = Some(counter);
                counter += 1;
            }
            graph.add_node(node)
        };
        for t in transistors {
            let src = node(&mut graph, &t.source);
            let dst = node(&mut graph, &t.drain);
            graph.add_edge(src, dst, Some(t.clone()));
        }
        graph
    }

    fn add_node(&mut self, node: NetNode) -> usize {
        self.nodes.insert_full(node).0
    }

    fn add_edge(&mut self, src: usize, dst: usize, transistor: Option<Transistor>) {
        self.edges.push(Edge {
            src,
            dst,
            transistor,
        });
    }

    /// The nodes of the graph.
    #[inline]
    pub fn nodes(&self) -> &IndexSet<NetNode> {
        &self.nodes
    }

    /// The node with index `idx`.
    #[inline]
    pub fn node(&self, idx: usize) -> &NetNode {
        &self.nodes[idx]
    }

    /// The edges of the graph.
    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns `true` if the graph has no edges.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The transistors of the graph, in edge order.
    pub fn transistors(&self) -> impl Iterator<Item = &Transistor> {
        self.edges.iter().filter_map(|e| e.transistor.as_ref())
    }

    /// The degree of every node. Self-loops count twice.
    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.nodes.len()];
        for edge in self.edges.iter() {
            degrees[edge.src] += 1;
            degrees[edge.dst] += 1;
        }
        degrees
    }

    /// The indices of nodes with odd degree.
    pub fn odd_nodes(&self) -> Vec<usize> {
        self.degrees()
            .into_iter()
            .enumerate()
            .filter(|(_, d)| d % 2 == 1)
            .map(|(i, _)| i)
            .collect()
    }

    /// The index of the connected component containing each node.
    ///
    /// Components are numbered in order of their first node.
    fn component_ids(&self) -> (Vec<usize>, usize) {
        let mut table: InPlaceUnificationTable<NodeKey> = InPlaceUnificationTable::new();
        let keys: Vec<NodeKey> = (0..self.nodes.len()).map(|_| table.new_key(())).collect();
        for edge in self.edges.iter() {
            table.union(keys[edge.src], keys[edge.dst]);
        }
        let mut roots: Vec<NodeKey> = Vec::new();
        let ids = keys
            .iter()
            .map(|&k| {
                let root = table.find(k);
                match roots.iter().position(|&r| r == root) {
                    Some(id) => id,
                    None => {
                        roots.push(root);
                        roots.len() - 1
                    }
                }
            })
            .collect();
        (ids, roots.len())
    }

    /// Returns `true` if every node is reachable from every other node.
    ///
    /// An empty graph is connected.
    pub fn is_connected(&self) -> bool {
        self.component_ids().1 <= 1
    }

    /// Splits the graph into its maximal connected components.
    pub fn components(&self) -> Vec<Multigraph> {
        let (ids, n) = self.component_ids();
        let mut out = vec![Multigraph::default(); n];
        for edge in self.edges.iter() {
            let graph = &mut out[ids[edge.src]];
            let src = graph.add_node(self.nodes[edge.src].clone());
            let dst = graph.add_node(self.nodes[edge.dst].clone());
            graph.add_edge(src, dst, edge.transistor.clone());
        }
        tracing::trace!(components = n, "partitioned connectivity graph");
        out
    }

    /// All ways of making every node degree even by adding balancing edges
    /// between pairs of odd-degree nodes.
    ///
    /// Only connected results are kept. A graph that is already balanced
    /// is returned as is (if connected). The matchings of the odd nodes are
    /// enumerated depth first, checking `budget` before each step.
    pub fn balanced(&self, budget: &SearchBudget) -> Search<Vec<Multigraph>> {
        let odd = self.odd_nodes();
        let mut out = Vec::new();
        let mut matchings = 0usize;
        let mut stack: Vec<(Vec<usize>, Vec<(usize, usize)>)> = vec![(odd.clone(), Vec::new())];
        while let Some((unmatched, pairs)) = stack.pop() {
            if budget.check().is_err() {
                tracing::debug!(odd = odd.len(), matchings, "balancing timed out");
                return Search::Aborted;
            }
            let Some((&first, rest)) = unmatched.split_first() else {
                matchings += 1;
                let mut graph = self.clone();
                for &(a, b) in pairs.iter() {
                    graph.add_edge(a, b, None);
                }
                if graph.is_connected() {
                    out.push(graph);
                }
                continue;
            };
            // Pushed in reverse so that the first partner is explored first.
            for (i, &partner) in rest.iter().enumerate().rev() {
                let mut unmatched = rest.to_vec();
                unmatched.remove(i);
                let mut pairs = pairs.clone();
                pairs.push((first.min(partner), first.max(partner)));
                stack.push((unmatched, pairs));
            }
        }
        tracing::trace!(
            odd = odd.len(),
            matchings,
            balanced = out.len(),
            "balanced connectivity graph"
        );
        Search::Found(out)
    }
}
