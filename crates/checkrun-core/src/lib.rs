//! checkrun Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Process spawning
//! - Async runtime
//! - Configuration files
//!
//! All types here describe the check pipeline: which steps run, in which
//! order, and how their exit codes fold into the outcome of a run.

pub mod error;
pub mod exit;
pub mod ids;
pub mod report;
pub mod status;
pub mod step;

// Re-export commonly used types
pub use error::CoreError;
pub use exit::ExitCode;
pub use ids::RunId;
pub use report::{RunReport, StepRecord};
pub use status::{PipelineState, StepOutcome};
pub use step::{Pipeline, StepKind, StepSpec};
