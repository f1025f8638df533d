//! Technology validation.
//!
//! Validation backs the "permutation valid" pre-check: a technology that
//! produces any [`Severity::Error`] issue cannot be synthesized.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::Level;

use super::{Layer, RoutingCapability, TechKind, Technology};

/// An enumeration of possible severity levels.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    /// An informational message.
    Info,
    /// A warning.
    #[default]
    Warning,
    /// An error. Technologies with errors cannot be synthesized.
    Error,
}

/// An issue identified during validation of a technology.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize)]
pub struct TechIssue {
    cause: Cause,
    severity: Severity,
}

/// The cause of a [`TechIssue`].
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize)]
pub enum Cause {
    /// A pitch or track count is not positive.
    NonPositiveDimension {
        /// The name of the dimension.
        name: &'static str,
        /// The offending value.
        value: i64,
    },
    /// The contacted poly pitch is odd, so the horizontal grid step is not exact.
    OddPolyPitch {
        /// The contacted poly pitch.
        cpp: i64,
    },
    /// A layer required by the architecture has no width.
    MissingLayer {
        /// The layer.
        layer: Layer,
    },
    /// A layer width is not positive.
    NonPositiveWidth {
        /// The layer.
        layer: Layer,
        /// The declared width.
        width: i64,
    },
    /// A layer is at least as wide as its pitch, so adjacent stripes would merge.
    WidthExceedsPitch {
        /// The layer.
        layer: Layer,
        /// The declared width.
        width: i64,
        /// The pitch of stripes on the layer.
        pitch: i64,
    },
    /// A via used by the architecture has no size.
    MissingVia {
        /// The via layer.
        via: Layer,
    },
    /// A via, with its enclosure, is wider than the layer it lands on.
    ViaDoesNotFit {
        /// The via layer.
        via: Layer,
        /// The landing layer.
        landing: Layer,
        /// The footprint size required.
        required: i64,
        /// The size available.
        available: i64,
    },
    /// Via footprints on adjacent grid points would overlap.
    ViaExceedsPitch {
        /// The via layer.
        via: Layer,
        /// The footprint size along the pitch.
        size: i64,
        /// The grid pitch.
        pitch: i64,
    },
    /// The cell has too few tracks for its rails, diffusion rows and gate contacts.
    TooFewTracks {
        /// The declared number of tracks.
        tracks: usize,
        /// The minimum number of tracks required.
        required: usize,
    },
    /// A hindering rule refers to a layer the technology does not declare.
    HinderUndeclared {
        /// The undeclared layer.
        layer: Layer,
    },
    /// A hindering rule is declared for an architecture without stacked contacts.
    HinderUnused {
        /// The blocking layer.
        upper: Layer,
        /// The blocked layer.
        lower: Layer,
    },
    /// A two-metal technology does not declare a layer needed for metal 2 routing.
    MissingRoutingLayer {
        /// The missing layer.
        layer: Layer,
    },
    /// A layer is declared but never drawn by this architecture.
    UnusedLayer {
        /// The unused layer.
        layer: Layer,
    },
}

impl TechIssue {
    /// Creates a new issue and logs it immediately.
    ///
    /// The log level will be selected according to the given severity.
    pub(crate) fn new_and_log(cause: Cause, severity: Severity) -> Self {
        let result = Self { cause, severity };
        match severity {
            Severity::Info => tracing::event!(Level::INFO, issue = ?result.cause, "{}", result),
            Severity::Warning => tracing::event!(Level::WARN, issue = ?result.cause, "{}", result),
            Severity::Error => tracing::event!(Level::ERROR, issue = ?result.cause, "{}", result),
        }
        result
    }

    /// Gets the underlying cause of this issue.
    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// The severity of this issue.
    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }
}

impl Display for TechIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveDimension { name, value } => {
                write!(f, "{name} must be positive, found {value}")
            }
            Self::OddPolyPitch { cpp } => write!(
                f,
                "contacted poly pitch {cpp} is odd; the horizontal grid step must be an integer"
            ),
            Self::MissingLayer { layer } => write!(f, "missing width for required layer `{layer}`"),
            Self::NonPositiveWidth { layer, width } => {
                write!(f, "layer `{layer}` has non-positive width {width}")
            }
            Self::WidthExceedsPitch { layer, width, pitch } => write!(
                f,
                "layer `{layer}` is {width} wide, which does not fit its pitch of {pitch}"
            ),
            Self::MissingVia { via } => write!(f, "missing size for via `{via}`"),
            Self::ViaDoesNotFit {
                via,
                landing,
                required,
                available,
            } => write!(
                f,
                "via `{via}` needs {required} of `{landing}` including enclosure, but `{landing}` is only {available} wide"
            ),
            Self::ViaExceedsPitch { via, size, pitch } => write!(
                f,
                "via `{via}` is {size} across including enclosure, which does not fit the grid pitch of {pitch}"
            ),
            Self::TooFewTracks { tracks, required } => write!(
                f,
                "cell has {tracks} tracks, but at least {required} are required"
            ),
            Self::HinderUndeclared { layer } => write!(
                f,
                "hindering rule refers to undeclared layer `{layer}`"
            ),
            Self::HinderUnused { upper, lower } => write!(
                f,
                "hindering rule `{upper}` over `{lower}` has no effect on an unstacked architecture"
            ),
            Self::MissingRoutingLayer { layer } => write!(
                f,
                "two-metal routing requires layer `{layer}`"
            ),
            Self::UnusedLayer { layer } => write!(f, "layer `{layer}` is declared but never drawn"),
        }
    }
}

/// A collection of technology issues.
#[derive(Debug, Clone, Default)]
pub struct TechIssues {
    issues: Vec<TechIssue>,
    num_errors: usize,
    num_warnings: usize,
}

impl TechIssues {
    /// Creates a new, empty issue set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the given issue to the issue set.
    pub fn add(&mut self, issue: TechIssue) {
        match issue.severity {
            Severity::Error => self.num_errors += 1,
            Severity::Warning => self.num_warnings += 1,
            Severity::Info => (),
        };
        self.issues.push(issue);
    }

    fn report(&mut self, cause: Cause, severity: Severity) {
        self.add(TechIssue::new_and_log(cause, severity));
    }

    /// Returns an iterator over all issues in the set.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &TechIssue> {
        self.issues.iter()
    }

    /// The number of issues in this issue set.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if this issue set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns `true` if this issue set contains an error.
    #[inline]
    pub fn has_error(&self) -> bool {
        self.num_errors > 0
    }

    /// The number of errors in this issue set.
    #[inline]
    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    /// The number of warnings in this issue set.
    #[inline]
    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    /// A `; `-separated summary of all errors.
    pub fn error_summary(&self) -> String {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl IntoIterator for TechIssues {
    type Item = TechIssue;
    type IntoIter = std::vec::IntoIter<TechIssue>;
    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

/// The minimum number of tracks in a single-height cell.
fn min_tracks(tech: &Technology) -> usize {
    match tech.kind {
        // Rails, one lower tier access track and at least one upper tier track.
        TechKind::Cfet => 4,
        // Rails, two diffusion rows and two gate contact tracks.
        _ => 2 * tech.diffusion_tracks + 4,
    }
}

pub(super) fn validate(tech: &Technology) -> TechIssues {
    let _guard = tracing::span!(Level::INFO, "validate technology", name = %tech.name).entered();
    let mut issues = TechIssues::new();
    let map = tech.layer_map();

    for (name, value) in [
        ("cpp", tech.cpp),
        ("m1_pitch", tech.m1_pitch),
        ("tracks", tech.tracks as i64),
    ] {
        if value <= 0 {
            issues.report(Cause::NonPositiveDimension { name, value }, Severity::Error);
        }
    }
    if tech.kind != TechKind::Cfet && tech.diffusion_tracks == 0 {
        issues.report(
            Cause::NonPositiveDimension {
                name: "diffusion_tracks",
                value: 0,
            },
            Severity::Error,
        );
    }
    if tech.cpp % 2 != 0 {
        issues.report(Cause::OddPolyPitch { cpp: tech.cpp }, Severity::Error);
    }
    if tech.tracks < min_tracks(tech) {
        issues.report(
            Cause::TooFewTracks {
                tracks: tech.tracks,
                required: min_tracks(tech),
            },
            Severity::Error,
        );
    }

    for &layer in map.required_layers() {
        if !tech.has_layer(layer) {
            issues.report(Cause::MissingLayer { layer }, Severity::Error);
        }
    }
    for rule in tech.layers.iter() {
        if rule.width <= 0 {
            issues.report(
                Cause::NonPositiveWidth {
                    layer: rule.layer,
                    width: rule.width,
                },
                Severity::Error,
            );
        }
        let pitch = match rule.layer {
            Layer::Metal1 => Some(tech.m1_pitch),
            Layer::Poly
            | Layer::DiffCon
            | Layer::DiffConTop
            | Layer::GateCon
            | Layer::Metal2 => Some(tech.step_x()),
            _ => None,
        };
        if let Some(pitch) = pitch {
            if rule.width >= pitch {
                issues.report(
                    Cause::WidthExceedsPitch {
                        layer: rule.layer,
                        width: rule.width,
                        pitch,
                    },
                    Severity::Error,
                );
            }
        }
        let drawn = map.required_layers().contains(&rule.layer)
            || rule.layer.is_via()
            || rule.layer == Layer::Metal2;
        if !drawn {
            issues.report(Cause::UnusedLayer { layer: rule.layer }, Severity::Info);
        }
    }

    let metals = tech.routing.metals();
    for via in map.via_layers() {
        if via == Layer::Via1 && tech.routing == RoutingCapability::SingleMetal {
            continue;
        }
        let Some(rule) = tech.via(via) else {
            let cause = if via == Layer::Via1 {
                Cause::MissingRoutingLayer { layer: via }
            } else {
                Cause::MissingVia { via }
            };
            issues.report(cause, Severity::Error);
            continue;
        };
        let (width, height) = rule.footprint();
        for (size, pitch) in [(height, tech.m1_pitch), (width, tech.step_x())] {
            if size >= pitch {
                issues.report(Cause::ViaExceedsPitch { via, size, pitch }, Severity::Error);
            }
        }
        for &landing in map.access_layers().iter().chain(metals) {
            if !map.connects(via, landing) || !tech.has_layer(landing) {
                continue;
            }
            // Metal 1 is horizontal, so its landing size is its height.
            let available = tech.width(landing);
            let required = if landing == Layer::Metal1 { height } else { width };
            if required > available {
                issues.report(
                    Cause::ViaDoesNotFit {
                        via,
                        landing,
                        required,
                        available,
                    },
                    Severity::Error,
                );
            }
        }
    }

    if tech.routing == RoutingCapability::TwoMetal && !tech.has_layer(Layer::Metal2) {
        issues.report(
            Cause::MissingRoutingLayer {
                layer: Layer::Metal2,
            },
            Severity::Error,
        );
    }

    for rule in tech.hinder.iter() {
        for layer in [rule.upper, rule.lower] {
            if !tech.has_layer(layer) {
                issues.report(Cause::HinderUndeclared { layer }, Severity::Error);
            }
        }
        if !tech.kind.is_stacked() {
            issues.report(
                Cause::HinderUnused {
                    upper: rule.upper,
                    lower: rule.lower,
                },
                Severity::Warning,
            );
        }
    }

    tracing::debug!(
        errors = issues.num_errors(),
        warnings = issues.num_warnings(),
        "validated technology"
    );
    issues
}
