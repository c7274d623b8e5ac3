//! JSON output for streaming pipeline events to stdout.

use std::io::{self, Write};

use async_trait::async_trait;
use checkrun_core::{RunId, RunReport, StepRecord, StepSpec};
use checkrun_exec::{ExecError, OutputLine, PipelineObserver};
use serde::Serialize;

/// JSON event types that can be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonEventType {
    PipelineStarted,
    StepStarted,
    OutputLine,
    StepFinished,
    PipelineFinished,
}

/// A JSON event to be output to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: JsonEventType,
    pub timestamp: String,
    pub data: serde_json::Value,
}

impl JsonEvent {
    /// Create a new JSON event with the current timestamp.
    pub fn new(event: JsonEventType, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Output this event as a JSON line to stdout.
    pub fn emit(&self) -> Result<(), ExecError> {
        let json = serde_json::to_string(self).map_err(io::Error::from)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", json)?;
        stdout.flush()?;
        Ok(())
    }
}

fn pipeline_started(run_id: &RunId, steps: &[StepSpec]) -> JsonEvent {
    JsonEvent::new(
        JsonEventType::PipelineStarted,
        serde_json::json!({
            "run_id": run_id,
            "steps": steps,
        }),
    )
}

fn step_started(run_id: &RunId, step: &StepSpec) -> JsonEvent {
    JsonEvent::new(
        JsonEventType::StepStarted,
        serde_json::json!({
            "run_id": run_id,
            "step": step.kind,
            "command": step.command_line(),
        }),
    )
}

fn output_line(run_id: &RunId, line: &OutputLine) -> JsonEvent {
    JsonEvent::new(
        JsonEventType::OutputLine,
        serde_json::json!({
            "run_id": run_id,
            "step": line.step,
            "stream": line.stream.as_str(),
            "line": line.line,
        }),
    )
}

fn step_finished(run_id: &RunId, record: &StepRecord) -> JsonEvent {
    JsonEvent::new(
        JsonEventType::StepFinished,
        serde_json::json!({
            "run_id": run_id,
            "record": record,
            "duration_ms": record.duration_ms(),
        }),
    )
}

fn pipeline_finished(report: &RunReport) -> JsonEvent {
    JsonEvent::new(
        JsonEventType::PipelineFinished,
        serde_json::json!({
            "run_id": report.run_id,
            "exit_code": report.exit_code(),
            "failed_step": report.first_failure().map(|r| r.kind),
            "steps": report.steps,
        }),
    )
}

/// Observer that prints every pipeline event as a JSON line.
///
/// Output lines carry no run id of their own, so the observer is bound to
/// the run it reports on.
pub struct JsonObserver {
    run_id: RunId,
}

impl JsonObserver {
    pub fn new(run_id: RunId) -> Self {
        Self { run_id }
    }
}

#[async_trait]
impl PipelineObserver for JsonObserver {
    async fn on_pipeline_started(
        &self,
        run_id: &RunId,
        steps: &[StepSpec],
    ) -> Result<(), ExecError> {
        pipeline_started(run_id, steps).emit()
    }

    async fn on_step_started(&self, run_id: &RunId, step: &StepSpec) -> Result<(), ExecError> {
        step_started(run_id, step).emit()
    }

    async fn on_output(&self, line: OutputLine) -> Result<(), ExecError> {
        output_line(&self.run_id, &line).emit()
    }

    async fn on_step_finished(
        &self,
        run_id: &RunId,
        record: &StepRecord,
    ) -> Result<(), ExecError> {
        step_finished(run_id, record).emit()
    }

    async fn on_pipeline_finished(&self, report: &RunReport) -> Result<(), ExecError> {
        pipeline_finished(report).emit()
    }
}
