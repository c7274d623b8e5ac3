//! Observers notified as a pipeline runs.
//!
//! This module provides the `PipelineObserver` trait and two ready-to-use
//! implementations: one that logs through `tracing` and one that forwards
//! events over a channel.

use async_trait::async_trait;
use checkrun_core::{RunId, RunReport, StepKind, StepOutcome, StepRecord, StepSpec};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::ExecError;

/// Which stream of the step process a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    /// Lowercase stream name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// One line of captured tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub step: StepKind,
    pub stream: OutputStream,
    pub line: String,
}

/// Callbacks invoked by the runner.
///
/// Implement this trait to report progress somewhere other than the log.
/// Errors returned by an observer are logged and never change the outcome
/// of the run.
#[async_trait]
pub trait PipelineObserver: Send + Sync {
    /// Called once before the first step starts.
    async fn on_pipeline_started(&self, run_id: &RunId, steps: &[StepSpec])
        -> Result<(), ExecError>;

    /// Called right before a step's process is spawned.
    async fn on_step_started(&self, run_id: &RunId, step: &StepSpec) -> Result<(), ExecError>;

    /// Called for each line of output when output is captured.
    async fn on_output(&self, line: OutputLine) -> Result<(), ExecError>;

    /// Called after a step's process has exited.
    async fn on_step_finished(&self, run_id: &RunId, record: &StepRecord)
        -> Result<(), ExecError>;

    /// Called once the run has reached `Done` or `Failed`.
    async fn on_pipeline_finished(&self, report: &RunReport) -> Result<(), ExecError>;
}

/// Observer that writes progress to the `tracing` log.
#[derive(Debug, Clone, Default)]
pub struct LoggingObserver;

#[async_trait]
impl PipelineObserver for LoggingObserver {
    async fn on_pipeline_started(
        &self,
        run_id: &RunId,
        steps: &[StepSpec],
    ) -> Result<(), ExecError> {
        info!(run_id = %run_id, steps = steps.len(), "Starting pipeline");
        Ok(())
    }

    async fn on_step_started(&self, run_id: &RunId, step: &StepSpec) -> Result<(), ExecError> {
        info!(run_id = %run_id, step = %step.kind, command = %step.command_line(), "Running step");
        Ok(())
    }

    async fn on_output(&self, line: OutputLine) -> Result<(), ExecError> {
        match line.stream {
            OutputStream::Stdout => info!(step = %line.step, "{}", line.line),
            OutputStream::Stderr => warn!(step = %line.step, "{}", line.line),
        }
        Ok(())
    }

    async fn on_step_finished(
        &self,
        run_id: &RunId,
        record: &StepRecord,
    ) -> Result<(), ExecError> {
        match record.outcome {
            StepOutcome::Failed { exit_code } => error!(
                run_id = %run_id,
                step = %record.kind,
                exit_code = exit_code.code(),
                duration_ms = ?record.duration_ms(),
                "Step failed"
            ),
            _ => info!(
                run_id = %run_id,
                step = %record.kind,
                duration_ms = ?record.duration_ms(),
                "Step succeeded"
            ),
        }
        Ok(())
    }

    async fn on_pipeline_finished(&self, report: &RunReport) -> Result<(), ExecError> {
        match report.first_failure() {
            Some(failed) => {
                let skipped = report.steps.iter().filter(|r| !r.outcome.ran()).count();
                error!(
                    run_id = %report.run_id,
                    step = %failed.kind,
                    exit_code = report.exit_code().code(),
                    skipped,
                    "Pipeline failed"
                );
            }
            None => info!(run_id = %report.run_id, "Pipeline passed"),
        }
        Ok(())
    }
}

/// Events emitted by `ChannelObserver`.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    PipelineStarted { run_id: RunId, steps: Vec<StepSpec> },
    StepStarted { run_id: RunId, step: StepSpec },
    Output(OutputLine),
    StepFinished { run_id: RunId, record: StepRecord },
    PipelineFinished { report: RunReport },
}

/// Observer that forwards every callback as a `PipelineEvent`.
///
/// # Example
///
/// ```rust,no_run
/// use checkrun_exec::ChannelObserver;
///
/// let (observer, mut rx) = ChannelObserver::new();
///
/// tokio::spawn(async move {
///     while let Some(event) = rx.recv().await {
///         println!("{:?}", event);
///     }
/// });
/// ```
pub struct ChannelObserver {
    event_tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelObserver {
    /// Create a new observer and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { event_tx: tx }, rx)
    }

    fn send(&self, event: PipelineEvent) -> Result<(), ExecError> {
        self.event_tx
            .send(event)
            .map_err(|_| ExecError::ChannelClosed)
    }
}

#[async_trait]
impl PipelineObserver for ChannelObserver {
    async fn on_pipeline_started(
        &self,
        run_id: &RunId,
        steps: &[StepSpec],
    ) -> Result<(), ExecError> {
        self.send(PipelineEvent::PipelineStarted {
            run_id: run_id.clone(),
            steps: steps.to_vec(),
        })
    }

    async fn on_step_started(&self, run_id: &RunId, step: &StepSpec) -> Result<(), ExecError> {
        self.send(PipelineEvent::StepStarted {
            run_id: run_id.clone(),
            step: step.clone(),
        })
    }

    async fn on_output(&self, line: OutputLine) -> Result<(), ExecError> {
        self.send(PipelineEvent::Output(line))
    }

    async fn on_step_finished(
        &self,
        run_id: &RunId,
        record: &StepRecord,
    ) -> Result<(), ExecError> {
        self.send(PipelineEvent::StepFinished {
            run_id: run_id.clone(),
            record: record.clone(),
        })
    }

    async fn on_pipeline_finished(&self, report: &RunReport) -> Result<(), ExecError> {
        self.send(PipelineEvent::PipelineFinished {
            report: report.clone(),
        })
    }
}
