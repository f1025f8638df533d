//! Technologies and cells shared by the integration tests.
#![allow(dead_code)]

use cellgen::netlist::{CellNetlist, ModelMap};
use cellgen::tech::Technology;

pub const GAA_8T: &str = r#"
name = "gaa_8t"
kind = "gaa"
routing = "two_metal"
cpp = 100
m1_pitch = 40
tracks = 8
diffusion_tracks = 2

layers = [
    { layer = "ndiff", width = 20 },
    { layer = "pdiff", width = 20 },
    { layer = "poly", width = 16 },
    { layer = "diff_con", width = 20 },
    { layer = "gate_con", width = 20 },
    { layer = "metal1", width = 20 },
    { layer = "metal2", width = 20 },
]

vias = [
    { via = "via0", width = 12, height = 12, enclosure = 2 },
    { via = "via_gate", width = 12, height = 12, enclosure = 2 },
    { via = "via1", width = 12, height = 12, enclosure = 2 },
]

spacing = [
    { a = "metal1", b = "metal1", space = 20 },
]
"#;

pub const CFET_7T: &str = r#"
name = "cfet_7t"
kind = "cfet"
routing = "single_metal"
cpp = 100
m1_pitch = 40
tracks = 7

layers = [
    { layer = "ndiff", width = 20 },
    { layer = "pdiff", width = 20 },
    { layer = "poly", width = 16 },
    { layer = "diff_con", width = 20 },
    { layer = "diff_con_top", width = 20 },
    { layer = "gate_con", width = 20 },
    { layer = "metal1", width = 20 },
]

vias = [
    { via = "via0", width = 12, height = 12, enclosure = 2 },
    { via = "via_gate", width = 12, height = 12, enclosure = 2 },
    { via = "via_deep", width = 12, height = 12, enclosure = 2 },
]

hinder = [
    { upper = "diff_con_top", lower = "diff_con" },
]
"#;

pub const CELLS: &str = r#"
* Test cells
.subckt inv a y vdd vss
*.PININFO a:I y:O vdd:B vss:B
MN0 y a vss vss nch w=200n l=20n
MP0 y a vdd vdd pch w=200n l=20n
.ends

.subckt nand2 a b y vdd vss
*.PININFO a:I b:I y:O vdd:B vss:B
MN0 x a vss vss nch w=200n l=20n
MN1 y b x vss nch w=200n l=20n
MP0 y a vdd vdd pch w=200n l=20n
MP1 y b vdd vdd pch w=200n l=20n
.ends

.subckt nand3 a b c y vdd vss
*.PININFO a:I b:I c:I y:O vdd:B vss:B
MN0 x1 a vss vss nch w=200n l=20n
MN1 x2 b x1 vss nch w=200n l=20n
MN2 y c x2 vss nch w=200n l=20n
MP0 y a vdd vdd pch w=200n l=20n
MP1 y b vdd vdd pch w=200n l=20n
MP2 y c vdd vdd pch w=200n l=20n
.ends

.subckt aoi21 a b c y vdd vss
*.PININFO a:I b:I c:I y:O vdd:B vss:B
MN0 x a vss vss nch w=200n l=20n
MN1 y b x vss nch w=200n l=20n
MN2 y c vss vss nch w=200n l=20n
MP0 w a vdd vdd pch w=200n l=20n
MP1 w b vdd vdd pch w=200n l=20n
MP2 y c w vdd pch w=200n l=20n
.ends

.subckt buf a y vdd vss
*.PININFO a:I y:O vdd:B vss:B
MN0 x a vss vss nch w=200n l=20n
MN1 y x vss vss nch w=200n l=20n
MP0 x a vdd vdd pch w=200n l=20n
MP1 y x vdd vdd pch w=200n l=20n
.ends

* No gate is shared between the rows.
.subckt split2 a b c d y vdd vss
*.PININFO a:I b:I c:I d:I y:O vdd:B vss:B
MN0 y a vss vss nch w=200n l=20n
MN1 y c vss vss nch w=200n l=20n
MP0 y b vdd vdd pch w=200n l=20n
MP1 y d vdd vdd pch w=200n l=20n
.ends
"#;

pub fn gaa() -> Technology {
    Technology::from_toml_str(GAA_8T).unwrap()
}

pub fn cfet() -> Technology {
    Technology::from_toml_str(CFET_7T).unwrap()
}

/// A variant of [`gaa`] with the given kind and routing capability.
pub fn planar(kind: &str, routing: &str) -> Technology {
    let src = GAA_8T
        .replace("kind = \"gaa\"", &format!("kind = \"{kind}\""))
        .replace("routing = \"two_metal\"", &format!("routing = \"{routing}\""));
    Technology::from_toml_str(&src).unwrap()
}

pub fn cell(name: &str) -> CellNetlist {
    CellNetlist::from_spice(CELLS, name, &ModelMap::default()).unwrap()
}
