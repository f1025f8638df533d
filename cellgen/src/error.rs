//! Error types and error handling utilities.

use std::path::PathBuf;
use std::sync::Arc;

use arcstr::ArcStr;

/// A result type returning cell synthesis errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for cell synthesis.
///
/// Placement and routing failures are expected outcomes for some technology
/// and netlist combinations; see [`Error::is_recoverable`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// No valid placement exists for the given netlist.
    #[error("no valid placement exists")]
    PlacementExhausted,
    /// Placement search ran out of time before completing.
    #[error("placement search timed out")]
    PlacementTimeout,
    /// A net could not be routed under the current restrictions.
    #[error("unable to route net `{net}`: {reason}")]
    RoutingInfeasible {
        /// The net that failed to route.
        net: ArcStr,
        /// Why routing failed.
        reason: String,
    },
    /// An internal invariant was violated.
    ///
    /// Indicates a bug or an inconsistent technology configuration.
    #[error("invariant violated: {0}")]
    Invariant(String),
    /// An error loading configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// An I/O error.
    #[error("failed to read `{path:?}`: {err}")]
    Io {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        err: Arc<std::io::Error>,
    },
    /// The input netlist is malformed or unsupported.
    #[error("netlist error: {0}")]
    Netlist(String),
    /// The technology failed validation.
    #[error("invalid technology `{name}`: {issues}")]
    Technology {
        /// The technology name.
        name: ArcStr,
        /// A summary of the errors found.
        issues: String,
    },
}

impl Error {
    /// Returns `true` if the caller may retry with a different strategy or parameter set.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PlacementExhausted | Self::PlacementTimeout | Self::RoutingInfeasible { .. }
        )
    }

    /// Creates an [`Error::Invariant`] and logs it.
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!("{msg}");
        Self::Invariant(msg)
    }

    pub(crate) fn infeasible(net: impl Into<ArcStr>, reason: impl Into<String>) -> Self {
        Self::RoutingInfeasible {
            net: net.into(),
            reason: reason.into(),
        }
    }
}

impl From<spice::ParserError> for Error {
    fn from(value: spice::ParserError) -> Self {
        Self::Netlist(value.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(value: toml::de::Error) -> Self {
        Self::Config(value.to_string())
    }
}
