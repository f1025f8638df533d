//! Transistor placement.
//!
//! A placer arranges the PMOS and NMOS transistors of a netlist into the two
//! rows of a [`Cell`], maximizing gate sharing between the rows and then
//! minimizing the horizontal extent of signal nets.

use crate::cell::Cell;
use crate::config::{PlacementConfig, PlacementStrategy};
use crate::error::{Error, Result};
use crate::netlist::CellNetlist;
use crate::tech::TechKind;

pub mod budget;
pub mod euler;
pub mod partition;

pub use budget::{Search, SearchBudget};
pub use euler::EulerPlacer;
pub use partition::PartitionPlacer;

/// A transistor placement algorithm.
pub trait Placer {
    /// Places `netlist`, or reports why no placement was found.
    ///
    /// With `stacked`, every slot holding two transistors must give both the same gate net.
    fn place(&self, netlist: &CellNetlist, stacked: bool, budget: &SearchBudget) -> Search<Cell>;
}

/// Places `netlist` for a technology of the given kind using the configured strategy.
pub fn place(netlist: &CellNetlist, kind: TechKind, config: &PlacementConfig) -> Result<Cell> {
    let span = tracing::info_span!("place", cell = %netlist.name, strategy = ?config.strategy);
    let _guard = span.enter();

    let budget = SearchBudget::new(config.timeout()).with_upper_limit(config.upper_limit);
    let stacked = kind.is_stacked();
    let result = match config.strategy {
        PlacementStrategy::Partition => PartitionPlacer {
            fallback_upper_limit: config.fallback_upper_limit,
        }
        .place(netlist, stacked, &budget),
        PlacementStrategy::Euler => EulerPlacer.place(netlist, stacked, &budget),
    };
    match result {
        Search::Found(cell) => {
            tracing::info!(
                width = cell.width(),
                gate_sharing = cell.gate_sharing(),
                wiring_length = cell.wiring_length(&netlist.power),
                elapsed = ?budget.elapsed(),
                "placed cell"
            );
            tracing::debug!("placement:\n{cell}");
            Ok(cell)
        }
        Search::Exhausted => {
            tracing::warn!("no valid placement exists");
            Err(Error::PlacementExhausted)
        }
        Search::Aborted => {
            tracing::warn!(timeout = ?config.timeout(), "placement timed out");
            Err(Error::PlacementTimeout)
        }
    }
}
