//! Error types for structure search.

use thiserror::Error;

/// Errors that can occur while building inputs or running a search.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// Caller mistakes (bad matrices, malformed datasets, invalid configuration) surface as
/// [`GesError::ValidationError`]. The remaining variants describe graphs that break the
/// structural contracts of the algorithms; once a search is running they indicate a defect
/// and abort the run instead of being retried.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GesError {
    /// Rejected input (dataset shape, non-finite values, configuration, node range).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The PDAG admits no consistent DAG extension.
    #[error("no consistent extension: {0}")]
    NoConsistentExtension(String),

    /// A graph expected to be acyclic contains a directed cycle.
    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// Internal error (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}

impl GesError {
    /// Whether this error signals a broken invariant rather than bad input.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            GesError::NoConsistentExtension(_) | GesError::CycleDetected(_) | GesError::Internal(_)
        )
    }
}
