mod common;

use cellgen::config::{PlacementStrategy, SynthConfig};
use cellgen::error::Error;
use cellgen::route::GridNode;
use cellgen::tech::{Layer, Technology};
use cellgen::{permutation_valid, synthesize};
use indexmap::IndexSet;
use test_log::test;

use common::*;

fn pins(names: &[&str]) -> IndexSet<arcstr::ArcStr> {
    names.iter().map(|&n| n.into()).collect()
}

#[test]
fn cfet_inverter_passes_lvs() {
    let netlist = cell("inv");
    let synthesis = synthesize(&netlist, &cfet(), &SynthConfig::default()).unwrap();

    assert_eq!(synthesis.cells.len(), 1);
    assert_eq!(synthesis.cells[0].width(), 1);
    assert_eq!(synthesis.routing.pins, pins(&["a", "y"]));
    assert!(!synthesis.shapes.shapes(Layer::ViaDeep).is_empty());
    assert!(synthesis.shapes.shapes(Layer::Metal2).is_empty());

    let report = synthesis.lvs.unwrap();
    assert!(report.matched, "{}\n{}\n{}", report.message, report.extracted, report.reference);
}

#[test]
fn gaa_inverter_passes_lvs() {
    let netlist = cell("inv");
    let synthesis = synthesize(&netlist, &gaa(), &SynthConfig::default()).unwrap();

    assert_eq!(synthesis.routing.pins, pins(&["a", "y"]));
    // The output joins its two contacts over metal 2.
    assert!(!synthesis.shapes.shapes(Layer::Metal2).is_empty());
    let report = synthesis.lvs.unwrap();
    assert!(report.matched, "{}\n{}\n{}", report.message, report.extracted, report.reference);
}

#[test]
fn gaa_nand2_passes_lvs() {
    let netlist = cell("nand2");
    for strategy in [PlacementStrategy::Partition, PlacementStrategy::Euler] {
        let mut config = SynthConfig::default();
        config.placement.strategy = strategy;
        let synthesis = synthesize(&netlist, &gaa(), &config).unwrap();

        assert_eq!(synthesis.cells[0].gate_sharing(), 2);
        assert_eq!(synthesis.routing.pins, pins(&["a", "b", "y"]));
        let report = synthesis.lvs.unwrap();
        assert!(report.matched, "{}\n{}\n{}", report.message, report.extracted, report.reference);
    }
}

#[test]
fn multiheight_cells_are_folded() {
    let netlist = cell("inv");
    let tech = planar("multiheight_gaa", "two_metal");
    let synthesis = synthesize(&netlist, &tech, &SynthConfig::default()).unwrap();
    assert_eq!(synthesis.cells.len(), 2);
    assert!(synthesis.cells[1].is_empty());
    assert_eq!(synthesis.routing.pins, pins(&["a", "y"]));
    // Both ground rails carry a label.
    let vss_labels = synthesis
        .shapes
        .labels()
        .iter()
        .filter(|l| l.text == "vss")
        .count();
    assert!(vss_labels >= 2);
    let report = synthesis.lvs.unwrap();
    assert!(report.matched, "{}\n{}\n{}", report.message, report.extracted, report.reference);
}

#[test]
fn multiheight_cells_fill_both_tiers() {
    let tech = planar("multiheight_gaa", "two_metal");
    for name in ["nand3", "aoi21"] {
        let netlist = cell(name);
        let synthesis = synthesize(&netlist, &tech, &SynthConfig::default()).unwrap();
        assert_eq!(synthesis.cells.len(), 2, "{name}");
        assert!(synthesis.cells.iter().all(|c| !c.is_empty()), "{name}");
        assert_eq!(synthesis.routing.pins, pins(&["a", "b", "c", "y"]), "{name}");
        let report = synthesis.lvs.unwrap();
        assert!(report.matched, "{name}: {}\n{}\n{}", report.message, report.extracted, report.reference);
    }
}

#[test]
fn cfet_buffer_passes_lvs() {
    let mut config = SynthConfig::default();
    config.placement.strategy = PlacementStrategy::Euler;
    let synthesis = synthesize(&cell("buf"), &cfet(), &config).unwrap();

    assert_eq!(synthesis.cells[0].width(), 2);
    assert_eq!(synthesis.cells[0].gate_sharing(), 2);
    assert_eq!(synthesis.routing.pins, pins(&["a", "y"]));
    // The internal net joins a drain to a gate on one metal 1 track.
    let x = synthesis.routing.net("x").unwrap();
    assert_eq!(x.wires().count(), 1);
    assert_eq!(x.vias().count(), 2);
    assert!(synthesis.shapes.shapes(Layer::Metal2).is_empty());

    let report = synthesis.lvs.unwrap();
    assert!(report.matched, "{}\n{}\n{}", report.message, report.extracted, report.reference);
}

#[test]
fn gaa_split_gates_recover_by_rerouting() {
    // Every gate contact covers a single track. The pin wire of `a` first covers
    // the only access to `c`, so `a` is ripped up and rerouted after `c`.
    let mut config = SynthConfig::default();
    config.placement.strategy = PlacementStrategy::Euler;
    let synthesis = synthesize(&cell("split2"), &gaa(), &config).unwrap();
    assert_eq!(synthesis.cells[0].gate_sharing(), 0);

    let m1 = |x, y| GridNode::new(Layer::Metal1, x, y);
    let wires = |net: &str| -> Vec<(GridNode, GridNode)> {
        synthesis.routing.net(net).unwrap().wires().copied().collect()
    };
    assert_eq!(wires("c"), vec![(m1(3, 3), m1(4, 3))]);
    assert_eq!(wires("a"), vec![(m1(1, 3), m1(0, 3))]);
    assert_eq!(wires("d"), vec![(m1(3, 4), m1(4, 4))]);
    assert_eq!(wires("b"), vec![(m1(1, 4), m1(0, 4))]);
    assert_eq!(synthesis.routing.pins, pins(&["a", "b", "c", "d", "y"]));

    let report = synthesis.lvs.unwrap();
    assert!(report.matched, "{}\n{}\n{}", report.message, report.extracted, report.reference);
}

#[test]
fn lvs_can_be_disabled() {
    let config = SynthConfig::from_toml_str("[lvs]\nenabled = false\n").unwrap();
    let synthesis = synthesize(&cell("inv"), &gaa(), &config).unwrap();
    assert!(synthesis.lvs.is_none());
}

#[test]
fn single_metal_planar_routing_is_recoverable() {
    let tech = planar("finfet", "single_metal");
    assert!(permutation_valid(&tech));
    let err = synthesize(&cell("inv"), &tech, &SynthConfig::default()).unwrap_err();
    assert!(matches!(err, Error::RoutingInfeasible { .. }));
    assert!(err.is_recoverable());
}

#[test]
fn invalid_technologies_are_rejected() {
    let src = GAA_8T.replace("    { layer = \"metal2\", width = 20 },\n", "");
    let tech = Technology::from_toml_str(&src).unwrap();
    assert!(!permutation_valid(&tech));

    let err = synthesize(&cell("inv"), &tech, &SynthConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Technology { ref name, .. } if name == "gaa_8t"));
    assert!(!err.is_recoverable());
}
