//! Error types for the explicit dynamics core.

use thiserror::Error;

/// Errors raised by precondition checks on the estimator, the integrator and
/// their configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// A vector or matrix does not have the number of degrees of freedom
    /// the system was built with.
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("matrix must be square, got {rows} x {cols}")]
    NotSquare { rows: usize, cols: usize },

    /// Lumped mass entries are divided by, so they must be strictly positive.
    #[error("mass at dof {dof} must be positive and finite, got {value}")]
    NonPositiveMass { dof: usize, value: f64 },

    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),

    #[error("duration must be non-negative and finite, got {0}")]
    InvalidDuration(f64),

    #[error(
        "max_iterations ({max_iterations}) is below the convergence check interval ({check_interval})"
    )]
    TooFewIterations {
        max_iterations: usize,
        check_interval: usize,
    },

    #[error("relative tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f64),

    #[error("invalid damping model: {0}")]
    InvalidDamping(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// State became non-finite, which happens when the time step exceeds the
    /// critical step.
    #[error("unstable time step: state became non-finite at step {step} (t = {time:.6e})")]
    UnstableTimeStep { step: usize, time: f64 },

    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
