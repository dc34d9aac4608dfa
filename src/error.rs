//! Provides the error type that will be eventually used
//! throughout this crate.

use thiserror::Error;

/// The error type used throughout this crate.
#[derive(Error, Debug)]
pub enum OptimError {
    // Precondition violations
    #[error("trajectory length mismatch: expected {expected} states, got {found}")]
    StateTrajectoryLength { expected: usize, found: usize },
    #[error("control trajectory length mismatch: expected {expected} controls, got {found}")]
    ControlTrajectoryLength { expected: usize, found: usize },
    #[error("vector has wrong size: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("cost `{0}` already registered")]
    DuplicateCost(String),
    #[error("cost `{0}` not found")]
    UnknownCost(String),
    #[error("weight for cost `{0}` must be strictly positive, got {1}")]
    NonPositiveWeight(String, f64),
    #[error("ABA dynamics does not support an armature term")]
    ArmatureWithAba,

    // Numerical
    #[error("Quu regularized is not positive-definite (mu = {mu})")]
    CholeskyFailed { mu: f64 },
    #[error("non-finite value encountered in `{where_}`")]
    NonFinite { where_: &'static str },

    // External collaborator
    #[error("external dynamics library error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, OptimError>;
