//! Exhaustive placement by Eulerian circuit enumeration.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::cell::{mirror_row, row_is_consistent, trim_row, Cell, Row};
use crate::graph::Multigraph;
use crate::netlist::{ChannelType, CellNetlist, PowerNets, Transistor};

use super::budget::{Search, SearchBudget};
use super::Placer;

/// One step of an Eulerian circuit: the edge taken and the node it was entered from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    /// The edge index.
    pub edge: usize,
    /// The node the edge is traversed from.
    pub from: usize,
}

/// Enumerates the Eulerian circuits of a balanced, connected multigraph.
///
/// Every circuit starts at the source of the first edge. Enumeration stops early
/// once the budget's upper limit is reached.
pub fn circuits(graph: &Multigraph, budget: &SearchBudget) -> Search<Vec<Vec<Step>>> {
    let edges = graph.edges();
    let m = edges.len();
    if m == 0 {
        return Search::Found(vec![vec![]]);
    }
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes().len()];
    for (i, e) in edges.iter().enumerate() {
        adj[e.src].push(i);
        if e.dst != e.src {
            adj[e.dst].push(i);
        }
    }

    let start = edges[0].src;
    let mut used = vec![false; m];
    let mut trail: Vec<Step> = Vec::with_capacity(m);
    // Each frame is a node on the current trail and the next adjacency entry to try.
    let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
    let mut out = Vec::new();

    fn backtrack(stack: &mut Vec<(usize, usize)>, trail: &mut Vec<Step>, used: &mut [bool]) {
        stack.pop();
        if let Some(step) = trail.pop() {
            used[step.edge] = false;
        }
    }

    while let Some(frame) = stack.last_mut() {
        if budget.check().is_err() {
            return Search::Aborted;
        }
        let node = frame.0;
        if trail.len() == m {
            if node == start {
                out.push(trail.clone());
                if budget.limit_reached(out.len()) {
                    break;
                }
            }
            backtrack(&mut stack, &mut trail, &mut used);
            continue;
        }
        let next = adj[node][frame.1..]
            .iter()
            .position(|&e| !used[e])
            .map(|i| i + frame.1);
        match next {
            Some(i) => {
                frame.1 = i + 1;
                let edge = adj[node][i];
                used[edge] = true;
                trail.push(Step { edge, from: node });
                stack.push((edges[edge].other(node), 0));
            }
            None => backtrack(&mut stack, &mut trail, &mut used),
        }
    }

    if out.is_empty() {
        Search::Exhausted
    } else {
        Search::Found(out)
    }
}

/// Converts a circuit into a row, orienting each transistor along the direction of travel.
///
/// Balancing edges become gaps.
pub fn chain(graph: &Multigraph, circuit: &[Step]) -> Row {
    circuit
        .iter()
        .map(|step| {
            let edge = &graph.edges()[step.edge];
            edge.transistor.as_ref().map(|t| {
                if step.from == edge.src {
                    t.clone()
                } else {
                    t.flipped()
                }
            })
        })
        .collect()
}

/// The shortest gap-trimmed rows realizing any Eulerian circuit of any balanced
/// version of `graph`.
///
/// Every rotation of every circuit is considered. Rows are returned sorted and deduplicated.
pub fn orderings(graph: &Multigraph, budget: &SearchBudget) -> Search<Vec<Row>> {
    if graph.is_empty() {
        return Search::Found(vec![vec![]]);
    }
    let balanced = match graph.balanced(budget) {
        Search::Found(balanced) => balanced,
        other => return other.map(|_| Vec::new()),
    };
    if balanced.is_empty() {
        tracing::debug!("no connected balanced graph exists");
        return Search::Exhausted;
    }

    let mut best: BTreeSet<Row> = BTreeSet::new();
    let mut best_len = usize::MAX;
    let mut total = 0;
    for g in balanced.iter() {
        let found = match circuits(g, budget) {
            Search::Found(found) => found,
            Search::Exhausted => continue,
            Search::Aborted => return Search::Aborted,
        };
        total += found.len();
        for circuit in found.iter() {
            if budget.check().is_err() {
                return Search::Aborted;
            }
            let row = chain(g, circuit);
            for r in 0..row.len() {
                let rotated: Row = row[r..].iter().chain(row[..r].iter()).cloned().collect();
                let trimmed = trim_row(&rotated);
                if trimmed.len() > best_len || !row_is_consistent(&trimmed) {
                    continue;
                }
                if trimmed.len() < best_len {
                    best_len = trimmed.len();
                    best.clear();
                }
                best.insert(trimmed);
            }
        }
    }
    tracing::debug!(
        balanced = balanced.len(),
        circuits = total,
        orderings = best.len(),
        width = best_len,
        "enumerated Eulerian orderings"
    );
    if best.is_empty() {
        Search::Exhausted
    } else {
        Search::Found(best.into_iter().collect())
    }
}

/// The candidate rows of one channel type.
///
/// With `dedup_mirrors`, a row and its mirror image count once; the smaller of
/// the two is kept.
pub fn row_candidates(
    transistors: &[Transistor],
    dedup_mirrors: bool,
    budget: &SearchBudget,
) -> Search<Vec<Row>> {
    orderings(&Multigraph::new(transistors), budget).map(|rows| {
        if !dedup_mirrors {
            return rows;
        }
        rows.into_iter()
            .map(|row| {
                let mirrored = mirror_row(&row);
                row.min(mirrored)
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    })
}

/// The ranking key of a candidate cell: more gate sharing first, then shorter wiring,
/// then lexicographic order.
pub(crate) fn rank(cell: &Cell, power: &PowerNets) -> (Reverse<usize>, usize) {
    (Reverse(cell.gate_sharing()), cell.wiring_length(power))
}

/// Keeps the best of a stream of candidate cells.
#[derive(Debug, Default)]
pub(crate) struct Best {
    best: Option<((Reverse<usize>, usize), Cell)>,
    seen: usize,
}

impl Best {
    pub(crate) fn offer(&mut self, cell: Cell, power: &PowerNets) {
        self.seen += 1;
        let key = rank(&cell, power);
        let better = match &self.best {
            None => true,
            Some((best_key, best)) => (&key, &cell) < (best_key, best),
        };
        if better {
            self.best = Some((key, cell));
        }
    }

    pub(crate) fn seen(&self) -> usize {
        self.seen
    }

    pub(crate) fn into_search(self) -> Search<Cell> {
        match self.best {
            Some((_, cell)) => Search::Found(cell),
            None => Search::Exhausted,
        }
    }
}

/// Exhaustive Eulerian path placement over the whole netlist.
#[derive(Debug, Default, Copy, Clone)]
pub struct EulerPlacer;

impl EulerPlacer {
    /// Every candidate cell, before ranking.
    ///
    /// NMOS rows are deduplicated up to mirroring; PMOS rows are kept in both
    /// orientations so that every relative orientation of the two rows is produced.
    pub fn candidates(
        &self,
        netlist: &CellNetlist,
        stacked: bool,
        budget: &SearchBudget,
    ) -> Search<Vec<Cell>> {
        let nmos = netlist.transistors_of(ChannelType::Nmos);
        let lower = match row_candidates(&nmos, true, budget) {
            Search::Found(rows) => rows,
            Search::Exhausted => return Search::Exhausted,
            Search::Aborted => return Search::Aborted,
        };
        let pmos = netlist.transistors_of(ChannelType::Pmos);
        let upper = match row_candidates(&pmos, false, budget) {
            Search::Found(rows) => rows,
            Search::Exhausted => return Search::Exhausted,
            Search::Aborted => return Search::Aborted,
        };

        let mut cells = Vec::new();
        for u in upper.iter() {
            for l in lower.iter() {
                if budget.check().is_err() {
                    return Search::Aborted;
                }
                cells.extend(
                    Cell::alignments(u, l)
                        .into_iter()
                        .filter(|c| !stacked || c.gates_aligned())
                        .map(|c| c.compact()),
                );
            }
        }
        if cells.is_empty() {
            Search::Exhausted
        } else {
            Search::Found(cells)
        }
    }
}

impl Placer for EulerPlacer {
    fn place(&self, netlist: &CellNetlist, stacked: bool, budget: &SearchBudget) -> Search<Cell> {
        let cells = match self.candidates(netlist, stacked, budget) {
            Search::Found(cells) => cells,
            Search::Exhausted => return Search::Exhausted,
            Search::Aborted => return Search::Aborted,
        };
        let mut best = Best::default();
        for cell in cells {
            best.offer(cell, &netlist.power);
        }
        tracing::debug!(candidates = best.seen(), "ranked Euler placements");
        best.into_search()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use test_log::test;

    use super::*;
    use crate::netlist::PowerNets;

    fn nmos(name: &str, s: &str, g: &str, d: &str) -> Transistor {
        Transistor::new(name, ChannelType::Nmos, s, g, d)
    }

    #[test]
    fn circuits_use_every_edge_once() {
        let ts = [
            nmos("m0", "a", "g", "b"),
            nmos("m1", "b", "g", "c"),
            nmos("m2", "c", "g", "a"),
            nmos("m3", "a", "g", "d"),
            nmos("m4", "d", "g", "a"),
        ];
        let graph = Multigraph::new(&ts);
        let Search::Found(circuits) = circuits(&graph, &SearchBudget::unlimited()) else {
            panic!("expected circuits");
        };
        assert!(!circuits.is_empty());
        for circuit in circuits.iter() {
            let edges: HashSet<usize> = circuit.iter().map(|s| s.edge).collect();
            assert_eq!(edges.len(), ts.len());
            assert_eq!(circuit.len(), ts.len());
            let row = chain(&graph, circuit);
            assert!(row_is_consistent(&row));
        }
    }

    #[test]
    fn upper_limit_truncates_enumeration() {
        let ts = [
            nmos("m0", "a", "g", "b"),
            nmos("m1", "b", "g", "a"),
            nmos("m2", "a", "g", "b"),
            nmos("m3", "b", "g", "a"),
        ];
        let graph = Multigraph::new(&ts);
        let all = circuits(&graph, &SearchBudget::unlimited()).found().unwrap();
        assert!(all.len() > 1);
        let budget = SearchBudget::unlimited().with_upper_limit(Some(1));
        assert_eq!(circuits(&graph, &budget).found().unwrap().len(), 1);
    }

    #[test]
    fn shared_drain_has_one_ordering() {
        let m0 = nmos("m0", "a", "g0", "x");
        let m1 = nmos("m1", "b", "g1", "x");
        let rows = row_candidates(&[m0.clone(), m1.clone()], true, &SearchBudget::unlimited())
            .found()
            .unwrap();
        assert_eq!(rows, vec![vec![Some(m0.clone()), Some(m1.flipped())]]);
        let row = &rows[0];
        let (first, second) = (row[0].as_ref().unwrap(), row[1].as_ref().unwrap());
        assert_eq!(first.source, "a");
        assert_eq!(first.drain, second.source);
        assert_eq!(second.drain, "b");
    }

    #[test]
    fn pmos_rows_keep_both_orientations() {
        let m0 = Transistor::new("m0", ChannelType::Pmos, "a", "g0", "x");
        let m1 = Transistor::new("m1", ChannelType::Pmos, "b", "g1", "x");
        let rows = row_candidates(&[m0, m1], false, &SearchBudget::unlimited())
            .found()
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn disconnected_rows_have_gaps() {
        let rows = row_candidates(
            &[nmos("m0", "a", "g", "b"), nmos("m1", "c", "h", "d")],
            true,
            &SearchBudget::unlimited(),
        )
        .found()
        .unwrap();
        assert!(rows.iter().all(|r| r.len() == 3 && r[1].is_none()));
    }

    #[test]
    fn disconnected_even_graph_is_exhausted() {
        let ts = [
            nmos("m0", "a", "g", "b"),
            nmos("m1", "b", "g", "a"),
            nmos("m2", "c", "g", "d"),
            nmos("m3", "d", "g", "c"),
        ];
        assert_eq!(
            orderings(&Multigraph::new(&ts), &SearchBudget::unlimited()),
            Search::Exhausted
        );
    }

    #[test]
    fn expired_budget_aborts() {
        let budget = SearchBudget::new(std::time::Duration::ZERO);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let graph = Multigraph::new(&[nmos("m0", "a", "g", "b")]);
        assert!(orderings(&graph, &budget).is_aborted());
    }

    #[test]
    fn ranking_prefers_gate_sharing_then_wiring() {
        let power = PowerNets::default();
        let nand = crate::tests::nand2();
        let Search::Found(cells) = EulerPlacer.candidates(&nand, false, &SearchBudget::unlimited())
        else {
            panic!("expected candidates");
        };
        let best = EulerPlacer
            .place(&nand, false, &SearchBudget::unlimited())
            .found()
            .unwrap();
        for c in cells.iter() {
            assert!(best.gate_sharing() >= c.gate_sharing());
            if best.gate_sharing() == c.gate_sharing() {
                assert!(best.wiring_length(&power) <= c.wiring_length(&power));
            }
        }
        assert_eq!(best.gate_sharing(), 2);
        assert!(best.is_consistent());
    }
}
