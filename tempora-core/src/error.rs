//! Structured error types for the dating engine.

use thiserror::Error;

/// Unified error type for all tempora operations.
///
/// Density evaluators never return this: an impossible node-age assignment
/// is an ordinary outcome and is reported as [`crate::LogDensity::unlikely`].
#[derive(Debug, Error)]
pub enum TemporaError {
    /// Propagated age bounds of a node collapsed (`prior_max < prior_min`).
    #[error("inconsistent calibration bounds at node {node}: min {prior_min} > max {prior_max}")]
    PriorInconsistency {
        node: usize,
        prior_min: f64,
        prior_max: f64,
    },

    /// No calibration anchors the past bound of the root.
    #[error(
        "no calibration provides a lower bound for the root (root min = {root_min}); \
         at least one calibration must bound the past"
    )]
    NoFeasibleRootBound { root_min: f64 },

    /// The least-squares system could not be inverted.
    #[error("singular {size}x{size} matrix (degenerate tree, e.g. zero branch lengths)")]
    SingularMatrix { size: usize },

    /// The constrained random-tree generator exhausted its attempts.
    #[error(
        "could not generate a random tree satisfying the calibrations after {attempts} attempts; \
         check that nested calibration intervals are compatible"
    )]
    NoFeasibleRandomTree { attempts: usize },

    /// A calibration names a taxon that is not in the tree.
    #[error("unknown taxon: {0}")]
    UnknownTaxon(String),

    /// Malformed calibration (bad interval, duplicate target node, ...).
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    /// The tree does not have the rooted binary shape the engine requires.
    #[error("invalid tree: {0}")]
    InvalidTree(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience alias used throughout tempora.
pub type Result<T> = std::result::Result<T, TemporaError>;
