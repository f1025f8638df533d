//! The synthesis pipeline.

use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::config::SynthConfig;
use crate::draw::{columns, draw};
use crate::error::{Error, Result};
use crate::lvs::{self, LvsReport};
use crate::netlist::CellNetlist;
use crate::place::place;
use crate::route::{route, RoutingResult};
use crate::shapes::Shapes;
use crate::tech::Technology;

/// A synthesized cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    /// The placed cell, one entry per tier, bottom first.
    pub cells: Vec<Cell>,
    /// The drawn and routed layout.
    pub shapes: Shapes,
    /// The routes of the cell.
    pub routing: RoutingResult,
    /// The LVS report, if LVS was enabled.
    pub lvs: Option<LvsReport>,
}

/// Returns `true` if `tech` is consistent enough to synthesize cells with.
pub fn permutation_valid(tech: &Technology) -> bool {
    let issues = tech.validate();
    for issue in issues.iter() {
        tracing::debug!(tech = %tech.name, "{issue}");
    }
    !issues.has_error()
}

/// Places, draws, routes and optionally verifies one cell.
///
/// Placement and routing failures are returned as recoverable errors, in which
/// case no geometry is produced.
pub fn synthesize(netlist: &CellNetlist, tech: &Technology, config: &SynthConfig) -> Result<Synthesis> {
    let _guard = tracing::info_span!("synthesize", cell = %netlist.name, tech = %tech.name).entered();

    let issues = tech.validate();
    if issues.has_error() {
        tracing::warn!(issues = %issues.error_summary(), "technology is not valid");
        return Err(Error::Technology {
            name: tech.name.clone(),
            issues: issues.error_summary(),
        });
    }

    let cell = place(netlist, tech.kind, &config.placement)?;
    let cells: Vec<Cell> = match tech.kind.tiers() {
        1 => vec![cell],
        tiers => cell.fold(tiers),
    };
    let mut shapes = draw(&cells, tech, netlist)?;
    let routing = route(&mut shapes, tech, netlist, columns(&cells), &config.routing)?;
    let lvs = config
        .lvs
        .enabled
        .then(|| lvs::run(&shapes, tech, netlist, &config.lvs));

    tracing::info!(
        shapes = shapes.len(),
        lvs = ?lvs.as_ref().map(|r| r.matched),
        "synthesized cell"
    );
    Ok(Synthesis {
        cells,
        shapes,
        routing,
        lvs,
    })
}
