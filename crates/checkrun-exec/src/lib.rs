//! Step execution for checkrun.
//!
//! This crate runs a [`Pipeline`](checkrun_core::Pipeline) one step at a time,
//! spawning each step's program as a subprocess and stopping at the first
//! non-zero exit code.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use checkrun_core::Pipeline;
//! use checkrun_exec::{PipelineRunner, ProcessExecutor};
//!
//! async fn check() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = ProcessExecutor::new().with_working_dir(".");
//!     let runner = PipelineRunner::new(Arc::new(executor));
//!
//!     let report = runner.run(&Pipeline::standard()).await?;
//!     println!("exit code: {}", report.exit_code());
//!     Ok(())
//! }
//! ```

mod error;
mod executor;
mod observer;
mod runner;

pub use error::ExecError;
pub use executor::{OutputMode, ProcessExecutor, StepExecutor, DEFAULT_DRAIN_GRACE};
pub use observer::{
    ChannelObserver, LoggingObserver, OutputLine, OutputStream, PipelineEvent, PipelineObserver,
};
pub use runner::PipelineRunner;
