//! Error types for the transient solver.

use thiserror::Error;

/// Main error type for solver operations
#[derive(Error, Debug)]
pub enum SolverError {
    /// Invalid combination of step parameters. Raised before any stepping
    /// begins; the caller must change the configuration and restart.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The effective system (or the mass operator) could not be factorized.
    /// Fatal: the scheme is deterministic, so a retry would reproduce the
    /// same failure.
    #[error("effective system is singular or not positive-definite")]
    SingularSystem,
}

/// Result type for solver operations
pub type SolverResult<T> = Result<T, SolverError>;
