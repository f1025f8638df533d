//! Placement by partitioning into independent subgraphs.
//!
//! Splitting supply nets per occurrence breaks the connectivity graph of each
//! channel type into small components. Each component is placed on its own as
//! a child cell; child cells are then ordered by a permutation search over the
//! nets they share.

use std::collections::{BTreeSet, HashMap};

use arcstr::ArcStr;
use itertools::Itertools;

use crate::cell::{join_rows, mirror_row, Cell, Row};
use crate::graph::Multigraph;
use crate::netlist::{CellNetlist, ChannelType, PowerNets};

use super::budget::{Search, SearchBudget};
use super::euler::{orderings, Best, EulerPlacer};
use super::Placer;

/// A connected component of one row, with all of its minimum-width placements.
#[derive(Debug, Clone)]
struct Child {
    options: Vec<Row>,
    width: usize,
    nets: BTreeSet<ArcStr>,
}

impl Child {
    fn new(graph: &Multigraph, power: &PowerNets, budget: &SearchBudget) -> Search<Self> {
        let rows = match orderings(graph, budget) {
            Search::Found(rows) => rows,
            Search::Exhausted => return Search::Exhausted,
            Search::Aborted => return Search::Aborted,
        };
        let options: BTreeSet<Row> = rows
            .iter()
            .flat_map(|row| [row.clone(), mirror_row(row)])
            .collect();
        let width = rows.first().map(|r| r.len()).unwrap_or_default();
        let nets = graph
            .transistors()
            .flat_map(|t| t.terminals().into_iter().cloned())
            .filter(|n| !power.contains(n))
            .collect();
        Search::Found(Self {
            options: options.into_iter().collect(),
            width,
            nets,
        })
    }
}

/// The children of one row.
fn children(
    netlist: &CellNetlist,
    channel: ChannelType,
    budget: &SearchBudget,
) -> Search<Vec<Child>> {
    let transistors = netlist.transistors_of(channel);
    let graph = Multigraph::with_split_power(&transistors, &netlist.power);
    let mut out = Vec::new();
    for component in graph.components() {
        match Child::new(&component, &netlist.power, budget) {
            Search::Found(child) => out.push(child),
            Search::Exhausted => return Search::Exhausted,
            Search::Aborted => return Search::Aborted,
        }
    }
    Search::Found(out)
}

/// Every order of `n` children.
fn orders(n: usize, budget: &SearchBudget) -> Search<Vec<Vec<usize>>> {
    if n == 0 {
        return Search::Found(vec![vec![]]);
    }
    let mut out = Vec::new();
    for order in (0..n).permutations(n) {
        if budget.check().is_err() {
            return Search::Aborted;
        }
        out.push(order);
    }
    Search::Found(out)
}

/// Twice the center column of every child in `order`, with one gap slot between children.
fn centers(children: &[Child], order: &[usize]) -> Vec<(usize, usize)> {
    let mut start = 0;
    order
        .iter()
        .map(|&i| {
            let center = 2 * start + children[i].width;
            start += children[i].width + 1;
            (i, center)
        })
        .collect()
}

/// The wiring length between children, measured between child centers.
fn inter_child_wiring(
    upper: &[Child],
    upper_order: &[usize],
    lower: &[Child],
    lower_order: &[usize],
) -> usize {
    let mut extents: HashMap<&ArcStr, (usize, usize)> = HashMap::new();
    for (children, order) in [(upper, upper_order), (lower, lower_order)] {
        for (i, center) in centers(children, order) {
            for net in children[i].nets.iter() {
                let e = extents.entry(net).or_insert((center, center));
                e.0 = e.0.min(center);
                e.1 = e.1.max(center);
            }
        }
    }
    extents.values().map(|(lo, hi)| hi - lo).sum()
}

/// Every concrete row obtained by choosing one option per child in `order`.
fn rows(children: &[Child], order: &[usize], budget: &SearchBudget) -> Search<BTreeSet<Row>> {
    let mut out = BTreeSet::new();
    if order.is_empty() {
        out.insert(Vec::new());
        return Search::Found(out);
    }
    for choice in order
        .iter()
        .map(|&i| children[i].options.iter())
        .multi_cartesian_product()
    {
        if budget.check().is_err() {
            return Search::Aborted;
        }
        out.insert(join_rows(choice.into_iter().map(|r| r.as_slice())));
    }
    Search::Found(out)
}

/// Partition and permutation placement.
///
/// Falls back to an [`EulerPlacer`] search bounded by `fallback_upper_limit`
/// circuits, with a fresh clock, if the partition search runs out of time.
#[derive(Debug, Copy, Clone)]
pub struct PartitionPlacer {
    /// The circuit limit of the fallback search.
    pub fallback_upper_limit: usize,
}

impl Default for PartitionPlacer {
    fn default() -> Self {
        Self {
            fallback_upper_limit: 32,
        }
    }
}

impl PartitionPlacer {
    /// Runs the partition search without falling back.
    pub fn search(&self, netlist: &CellNetlist, stacked: bool, budget: &SearchBudget) -> Search<Cell> {
        let upper = match children(netlist, ChannelType::Pmos, budget) {
            Search::Found(c) => c,
            Search::Exhausted => return Search::Exhausted,
            Search::Aborted => return Search::Aborted,
        };
        let lower = match children(netlist, ChannelType::Nmos, budget) {
            Search::Found(c) => c,
            Search::Exhausted => return Search::Exhausted,
            Search::Aborted => return Search::Aborted,
        };
        let (upper_orders, lower_orders) =
            match (orders(upper.len(), budget), orders(lower.len(), budget)) {
                (Search::Found(u), Search::Found(l)) => (u, l),
                _ => return Search::Aborted,
            };
        tracing::debug!(
            upper_children = upper.len(),
            lower_children = lower.len(),
            pairs = upper_orders.len() * lower_orders.len(),
            "searching child orders"
        );

        let mut best_pairs: Vec<(&[usize], &[usize])> = Vec::new();
        let mut best_cost = usize::MAX;
        for u in upper_orders.iter() {
            for l in lower_orders.iter() {
                if budget.check().is_err() {
                    return Search::Aborted;
                }
                let cost = inter_child_wiring(&upper, u, &lower, l);
                if cost < best_cost {
                    best_cost = cost;
                    best_pairs.clear();
                }
                if cost == best_cost {
                    best_pairs.push((u, l));
                }
            }
        }

        let mut best = Best::default();
        for (u, l) in best_pairs {
            let upper_rows = match rows(&upper, u, budget) {
                Search::Found(r) => r,
                _ => return Search::Aborted,
            };
            let lower_rows = match rows(&lower, l, budget) {
                Search::Found(r) => r,
                _ => return Search::Aborted,
            };
            for ur in upper_rows.iter() {
                for lr in lower_rows.iter() {
                    if budget.check().is_err() {
                        return Search::Aborted;
                    }
                    for cell in Cell::alignments(ur, lr) {
                        if !stacked || cell.gates_aligned() {
                            best.offer(cell.compact(), &netlist.power);
                        }
                    }
                }
            }
        }
        tracing::debug!(
            candidates = best.seen(),
            inter_child_wiring = best_cost,
            "ranked partition placements"
        );
        best.into_search()
    }
}

impl Placer for PartitionPlacer {
    fn place(&self, netlist: &CellNetlist, stacked: bool, budget: &SearchBudget) -> Search<Cell> {
        match self.search(netlist, stacked, budget) {
            Search::Aborted => {
                tracing::info!(
                    upper_limit = self.fallback_upper_limit,
                    "partition placement timed out; falling back to bounded Euler placement"
                );
                let fallback = budget
                    .restarted()
                    .with_upper_limit(Some(self.fallback_upper_limit));
                EulerPlacer.place(netlist, stacked, &fallback)
            }
            other => other,
        }
    }
}
