//! Error types for step execution.

use checkrun_core::CoreError;
use thiserror::Error;

/// Errors that can occur while running a pipeline.
///
/// A step that exits non-zero is not an error: it is a normal outcome
/// recorded in the report.
#[derive(Debug, Error)]
pub enum ExecError {
    /// I/O failure while waiting on or killing a step process.
    #[error("Step process I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The pipeline state machine was driven incorrectly.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Event channel receiver dropped.
    #[error("Channel closed")]
    ChannelClosed,
}
