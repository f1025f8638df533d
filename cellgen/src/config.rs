//! Synthesis configuration.
//!
//! All fields have defaults, so an empty TOML document is a valid configuration:
//!
//! ```
//! # use cellgen::config::*;
//! let config = SynthConfig::from_toml_str(r#"
//! [placement]
//! strategy = "euler"
//! timeout_ms = 500
//!
//! [routing]
//! max_iterations = 50
//! "#).unwrap();
//! assert_eq!(config.placement.strategy, PlacementStrategy::Euler);
//! assert_eq!(config.routing.max_iterations, 50);
//! assert!(config.lvs.enabled);
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a synthesis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Placement settings.
    pub placement: PlacementConfig,
    /// Routing settings.
    pub routing: RoutingConfig,
    /// Layout-vs-schematic settings.
    pub lvs: LvsConfig,
}

impl SynthConfig {
    /// Parses a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reads a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|err| Error::Io {
            path: path.into(),
            err: Arc::new(err),
        })?;
        Self::from_toml_str(&s)
    }
}

/// The placement algorithm to use.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    /// Partition into connected components and search over child orderings.
    ///
    /// Falls back to [`PlacementStrategy::Euler`] with a bounded search on timeout.
    #[default]
    Partition,
    /// Exhaustive Eulerian path search over the whole netlist.
    Euler,
}

/// Placement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// The placement algorithm.
    pub strategy: PlacementStrategy,
    /// Wall-clock budget for a placement search, in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of Eulerian circuits to enumerate per balanced graph.
    pub upper_limit: Option<usize>,
    /// The circuit limit used when falling back from partition to Euler search.
    pub fallback_upper_limit: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            strategy: PlacementStrategy::default(),
            timeout_ms: 10_000,
            upper_limit: None,
            fallback_upper_limit: 32,
        }
    }
}

impl PlacementConfig {
    /// The placement timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Routing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Maximum number of iterations of the rip-up and reroute loop.
    pub max_iterations: usize,
    /// Cost per track of distance from the vertical center of the cell.
    pub center_bias: u64,
    /// Cost added to pin wires shorter than [`RoutingConfig::min_pin_span`].
    pub short_span_penalty: u64,
    /// Minimum horizontal span of a pin wire, in grid steps.
    pub min_pin_span: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            center_bias: 1,
            short_span_penalty: 1_000,
            min_pin_span: 0,
        }
    }
}

/// Layout-vs-schematic settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LvsConfig {
    /// Whether to run LVS after routing.
    pub enabled: bool,
    /// Whether to merge parallel devices before comparison.
    pub merge_parallel: bool,
}

impl Default for LvsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            merge_parallel: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = SynthConfig::from_toml_str("").unwrap();
        assert_eq!(config, SynthConfig::default());
        assert_eq!(config.placement.timeout(), Duration::from_secs(10));
        assert_eq!(config.placement.fallback_upper_limit, 32);
        assert_eq!(config.routing.short_span_penalty, 1_000);
    }

    #[test]
    fn unknown_strategy_is_a_config_error() {
        let err = SynthConfig::from_toml_str("[placement]\nstrategy = \"annealing\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = SynthConfig::default();
        config.placement.upper_limit = Some(8);
        config.lvs.merge_parallel = false;
        let s = toml::to_string(&config).unwrap();
        assert_eq!(SynthConfig::from_toml_str(&s).unwrap(), config);
    }
}
