//! Standard cell layout synthesis.
//!
//! Given the transistor netlist of a cell and a set of technology rules,
//! `cellgen` places the transistors into rows, draws the devices, routes the
//! nets over one or two metal layers and checks the result against the netlist.
//!
//! # Examples
//!
//! ```no_run
//! # use cellgen::config::SynthConfig;
//! # use cellgen::netlist::{CellNetlist, ModelMap};
//! # use cellgen::tech::Technology;
//! # fn main() -> cellgen::error::Result<()> {
//! let tech = Technology::from_toml_str(&std::fs::read_to_string("gaa_8t.toml").unwrap())?;
//! let netlist = CellNetlist::from_spice(
//!     &std::fs::read_to_string("inv.spice").unwrap(),
//!     "inv",
//!     &ModelMap::default(),
//! )?;
//! let synthesis = cellgen::synth::synthesize(&netlist, &tech, &SynthConfig::default())?;
//! assert!(synthesis.lvs.is_some_and(|report| report.matched));
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]

pub mod cell;
pub mod config;
pub mod draw;
pub mod error;
pub mod graph;
pub mod lvs;
pub mod netlist;
pub mod place;
pub mod route;
pub mod shapes;
pub mod synth;
pub mod tech;


pub use synth::{permutation_valid, synthesize, Synthesis};
