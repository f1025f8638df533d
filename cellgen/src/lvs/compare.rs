//! Circuit comparison.
//!
//! Two circuits match if some bijection between their nets maps every device
//! of one onto a device of the other with the same type, gate and (unordered)
//! source/drain pair. Ports with the same name must correspond.
//!
//! Candidates are narrowed by iterated colour refinement over the bipartite
//! device/net graph; remaining ambiguity is resolved by backtracking.

use std::hash::{Hash, Hasher};

use arcstr::ArcStr;
use indexmap::IndexSet;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHasher};

use crate::netlist::ChannelType;

use super::circuit::Circuit;

fn hash_of(value: impl Hash) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Role {
    Gate,
    Diffusion,
}

/// A device type and its number of fingers.
type Kind = (ChannelType, usize);

/// A circuit as a bipartite graph over net indices.
struct Bipartite {
    nets: IndexSet<ArcStr>,
    /// `(kind, gate, [source, drain])` per device, with sorted diffusion nets.
    devices: Vec<(Kind, usize, [usize; 2])>,
    incident: Vec<Vec<(usize, Role)>>,
}

impl Bipartite {
    fn new(circuit: &Circuit) -> Self {
        let mut nets: IndexSet<ArcStr> = circuit.ports.clone();
        for d in circuit.devices.iter() {
            nets.extend([d.g.clone(), d.s.clone(), d.d.clone()]);
        }
        let index = |net: &ArcStr| nets.get_index_of(net).unwrap_or_default();
        let devices: Vec<(Kind, usize, [usize; 2])> = circuit
            .devices
            .iter()
            .map(|d| {
                let (s, t) = (index(&d.s), index(&d.d));
                ((d.kind, d.fingers), index(&d.g), [s.min(t), s.max(t)])
            })
            .collect();
        let mut incident = vec![Vec::new(); nets.len()];
        for (i, (_, g, sd)) in devices.iter().enumerate() {
            incident[*g].push((i, Role::Gate));
            for n in sd {
                incident[*n].push((i, Role::Diffusion));
            }
        }
        Self {
            nets,
            devices,
            incident,
        }
    }

    /// One round of refinement.
    fn refine(&self, colors: &Colors) -> Colors {
        let devices: Vec<u64> = self
            .devices
            .iter()
            .enumerate()
            .map(|(i, (_, g, [s, d]))| {
                let (a, b) = (colors.nets[*s], colors.nets[*d]);
                hash_of((colors.devices[i], colors.nets[*g], a.min(b), a.max(b)))
            })
            .collect();
        let nets: Vec<u64> = self
            .incident
            .iter()
            .enumerate()
            .map(|(n, edges)| {
                let neighbors: Vec<(u64, Role)> = edges
                    .iter()
                    .map(|(i, role)| (devices[*i], *role))
                    .sorted()
                    .collect();
                hash_of((colors.nets[n], neighbors))
            })
            .collect();
        Colors { nets, devices }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Colors {
    nets: Vec<u64>,
    devices: Vec<u64>,
}

impl Colors {
    fn initial(graph: &Bipartite, shared_ports: &IndexSet<ArcStr>) -> Self {
        let nets = graph
            .nets
            .iter()
            .map(|net| match shared_ports.contains(net) {
                true => hash_of(("port", net)),
                false => hash_of("net"),
            })
            .collect();
        let devices = graph.devices.iter().map(|(kind, _, _)| hash_of(kind)).collect();
        Self { nets, devices }
    }

    fn classes(&self) -> usize {
        self.nets.iter().unique().count() + self.devices.iter().unique().count()
    }

    fn histogram(&self) -> (Vec<u64>, Vec<u64>) {
        (
            self.nets.iter().copied().sorted().collect(),
            self.devices.iter().copied().sorted().collect(),
        )
    }
}

/// The outcome of comparing two circuits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    /// Whether the circuits are equivalent.
    pub matched: bool,
    /// A description of the first difference found, or of the match.
    pub message: String,
}

impl Comparison {
    fn mismatch(message: impl Into<String>) -> Self {
        Self {
            matched: false,
            message: message.into(),
        }
    }
}

struct Matcher<'a> {
    a: &'a Bipartite,
    b: &'a Bipartite,
    fresh: u64,
}

impl Matcher<'_> {
    /// Refines both colorings in lockstep until neither splits further.
    fn stabilize(&self, mut ca: Colors, mut cb: Colors) -> Option<(Colors, Colors)> {
        loop {
            if ca.histogram() != cb.histogram() {
                return None;
            }
            let (na, nb) = (self.a.refine(&ca), self.b.refine(&cb));
            let split = na.classes() > ca.classes() || nb.classes() > cb.classes();
            ca = na;
            cb = nb;
            if !split {
                return (ca.histogram() == cb.histogram()).then_some((ca, cb));
            }
        }
    }

    /// Finds a net bijection from `a` to `b` consistent with the colorings.
    fn search(&mut self, ca: Colors, cb: Colors) -> Option<Vec<usize>> {
        let (ca, cb) = self.stabilize(ca, cb)?;
        let counts = ca.nets.iter().counts();
        let ambiguous = (0..ca.nets.len())
            .filter(|&n| counts[&ca.nets[n]] > 1)
            .min_by_key(|&n| (counts[&ca.nets[n]], n));
        let Some(x) = ambiguous else {
            let position: FxHashMap<u64, usize> =
                cb.nets.iter().enumerate().map(|(i, c)| (*c, i)).collect();
            let mapping: Vec<usize> = ca.nets.iter().map(|c| position[c]).collect();
            return self.verify(&mapping).then_some(mapping);
        };
        let candidates: Vec<usize> = (0..cb.nets.len())
            .filter(|&y| cb.nets[y] == ca.nets[x])
            .collect();
        for y in candidates {
            self.fresh += 1;
            let color = hash_of(("fixed", self.fresh));
            let (mut na, mut nb) = (ca.clone(), cb.clone());
            na.nets[x] = color;
            nb.nets[y] = color;
            if let Some(mapping) = self.search(na, nb) {
                return Some(mapping);
            }
        }
        None
    }

    fn verify(&self, mapping: &[usize]) -> bool {
        let mapped: Vec<(Kind, usize, [usize; 2])> = self
            .a
            .devices
            .iter()
            .map(|(kind, g, [s, d])| {
                let (s, d) = (mapping[*s], mapping[*d]);
                (*kind, mapping[*g], [s.min(d), s.max(d)])
            })
            .sorted()
            .collect();
        let target: Vec<(Kind, usize, [usize; 2])> =
            self.b.devices.iter().copied().sorted().collect();
        mapped == target
    }
}

/// Compares two circuits for equivalence irrespective of device and internal net names.
pub fn compare(a: &Circuit, b: &Circuit) -> Comparison {
    if a.ports != b.ports {
        return Comparison::mismatch(format!(
            "ports differ: {} vs {}",
            a.ports.iter().join(" "),
            b.ports.iter().join(" ")
        ));
    }
    for kind in [ChannelType::Nmos, ChannelType::Pmos] {
        let (x, y) = (a.count(kind), b.count(kind));
        if x != y {
            return Comparison::mismatch(format!("{x} {kind} devices vs {y}"));
        }
    }
    let (ga, gb) = (Bipartite::new(a), Bipartite::new(b));
    if ga.nets.len() != gb.nets.len() {
        return Comparison::mismatch(format!(
            "{} nets vs {}",
            ga.nets.len(),
            gb.nets.len()
        ));
    }

    let ports = a.ports.clone();
    let (ca, cb) = (Colors::initial(&ga, &ports), Colors::initial(&gb, &ports));
    let mut matcher = Matcher {
        a: &ga,
        b: &gb,
        fresh: 0,
    };
    match matcher.search(ca, cb) {
        Some(mapping) => {
            let pairs = mapping
                .iter()
                .enumerate()
                .filter(|(i, j)| ga.nets[*i] != gb.nets[**j])
                .map(|(i, j)| format!("{}={}", ga.nets[i], gb.nets[*j]))
                .join(", ");
            let message = if pairs.is_empty() {
                "circuits match".to_string()
            } else {
                format!("circuits match with {pairs}")
            };
            Comparison {
                matched: true,
                message,
            }
        }
        None => Comparison::mismatch("no net correspondence connects the devices alike"),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::lvs::circuit::Device;
    use crate::netlist::{CellNetlist, PowerNets, Transistor};
    use crate::tests::{inv, nand2};

    fn renamed(circuit: &Circuit, prefix: &str) -> Circuit {
        let rename = |net: &ArcStr| -> ArcStr {
            if circuit.ports.contains(net) {
                net.clone()
            } else {
                arcstr::format!("{prefix}{net}")
            }
        };
        let mut out = Circuit::new(circuit.name.clone());
        for p in circuit.ports.iter() {
            out.add_port(p.clone());
        }
        for d in circuit.devices.iter().rev() {
            out.add_device(Device {
                name: arcstr::format!("{prefix}{}", d.name),
                d: rename(&d.s),
                s: rename(&d.d),
                g: rename(&d.g),
                ..d.clone()
            });
        }
        out
    }

    #[test]
    fn circuits_match_themselves() {
        for netlist in [inv(), nand2()] {
            let c = Circuit::from_netlist(&netlist);
            let result = compare(&c, &c);
            assert!(result.matched, "{}", result.message);
            assert_eq!(result.message, "circuits match");
        }
    }

    #[test]
    fn names_and_orientation_do_not_matter() {
        let c = Circuit::from_netlist(&nand2());
        let r = renamed(&c, "z");
        assert!(compare(&c, &r).matched);
        assert!(compare(&r, &c).matched);
    }

    #[test]
    fn symmetric_internal_nets_are_resolved_by_search() {
        // Two identical chains hanging off one input, with nothing to tell them apart.
        let netlist = CellNetlist::new(
            "fanout",
            vec![
                Transistor::new("n0", ChannelType::Nmos, "vss", "a", "p"),
                Transistor::new("n1", ChannelType::Nmos, "vss", "a", "q"),
                Transistor::new("n2", ChannelType::Nmos, "vss", "p", "y"),
                Transistor::new("n3", ChannelType::Nmos, "vss", "q", "z"),
            ],
            ["a"],
            PowerNets::default(),
        );
        let c = Circuit::from_netlist(&netlist);
        let r = renamed(&c, "w");
        let result = compare(&c, &r);
        assert!(result.matched, "{}", result.message);

        // Cross the chains in one circuit only.
        let mut crossed = c.clone();
        crossed.devices[3].d = "y".into();
        assert!(!compare(&c, &crossed).matched);
    }

    #[test]
    fn missing_parallel_fingers_are_detected() {
        let finger = |name: &str| Transistor::new(name, ChannelType::Nmos, "vss", "a", "y");
        let pull_up = Transistor::new("p0", ChannelType::Pmos, "vdd", "a", "y");
        let inv = |fingers: Vec<Transistor>| {
            let netlist = CellNetlist::new("inv", fingers, ["a", "y"], PowerNets::default());
            Circuit::from_netlist(&netlist).simplified(true)
        };
        let one = inv(vec![finger("n0"), pull_up.clone()]);
        let two = inv(vec![finger("n0"), finger("n1"), pull_up.clone()]);
        assert_eq!(two.devices.len(), 2);
        let result = compare(&one, &two);
        assert!(!result.matched);
        assert_eq!(result.message, "1 nmos devices vs 2");
        assert!(compare(&two, &two).matched);

        // Same transistor count, grouped differently.
        let mut split = two.clone();
        split.devices[0].fingers = 1;
        split.add_device(Device {
            name: "n2".into(),
            g: "y".into(),
            ..split.devices[0].clone()
        });
        assert_eq!(split.count(ChannelType::Nmos), 2);
        assert!(!compare(&two, &split).matched);
    }

    #[test]
    fn miswired_circuits_do_not_match() {
        let good = Circuit::from_netlist(&nand2());
        let mut bad = good.clone();
        bad.devices[1].g = "a".into();
        assert!(!compare(&good, &bad).matched);
        assert!(!compare(&bad, &good).matched);

        let mut fewer = good.clone();
        fewer.devices.pop();
        let result = compare(&good, &fewer);
        assert!(!result.matched);
        assert!(result.message.contains("pmos"));

        let mut ports = good.clone();
        ports.ports.pop();
        assert!(compare(&good, &ports).message.starts_with("ports differ"));
    }
}
