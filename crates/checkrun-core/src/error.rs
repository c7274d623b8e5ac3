//! Core domain errors.

use thiserror::Error;

/// Core domain errors for checkrun.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A step was configured without a program to run.
    #[error("Step '{0}' has an empty command")]
    EmptyCommand(String),

    /// Step name does not match any known step.
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// Steps are duplicated or out of order.
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}
