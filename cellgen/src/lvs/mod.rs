//! Layout-vs-schematic verification.
//!
//! The drawn cell is extracted into a flat [`Circuit`] and compared with the
//! reference circuit of its netlist. A mismatch is a result, not an error.

use serde::{Deserialize, Serialize};

use crate::config::LvsConfig;
use crate::netlist::CellNetlist;
use crate::shapes::Shapes;
use crate::tech::Technology;

pub mod circuit;
pub mod compare;
pub mod extract;

pub use circuit::{Circuit, Device};
pub use compare::{compare, Comparison};
pub use extract::extract;

/// The outcome of an LVS run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LvsReport {
    /// Whether the layout matches the netlist.
    pub matched: bool,
    /// The simplified extracted circuit.
    pub extracted: String,
    /// The simplified reference circuit.
    pub reference: String,
    /// Details of the comparison.
    pub message: String,
}

/// Checks `shapes` against `netlist`.
pub fn run(shapes: &Shapes, tech: &Technology, netlist: &CellNetlist, config: &LvsConfig) -> LvsReport {
    let _guard = tracing::info_span!("lvs", cell = %netlist.name).entered();
    let extracted = extract(shapes, tech, &netlist.name, &netlist.power).simplified(config.merge_parallel);
    let reference = Circuit::from_netlist(netlist).simplified(config.merge_parallel);
    let Comparison { matched, message } = compare(&extracted, &reference);
    if matched {
        tracing::info!("{message}");
    } else {
        tracing::warn!(%message, "layout does not match netlist");
        tracing::debug!("extracted:\n{extracted}\nreference:\n{reference}");
    }
    LvsReport {
        matched,
        extracted: extracted.to_string(),
        reference: reference.to_string(),
        message,
    }
}
