//! Records of what a pipeline run did.

use crate::{ExitCode, Pipeline, RunId, StepKind, StepOutcome, StepSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one step within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Which step.
    pub kind: StepKind,

    /// Command line that was (or would have been) executed.
    pub command: String,

    /// Result of the step.
    #[serde(flatten)]
    pub outcome: StepOutcome,

    /// When the step started.
    pub started_at: Option<DateTime<Utc>>,

    /// When the step finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    /// Create a record for a step that has not run yet.
    pub fn new(spec: &StepSpec) -> Self {
        Self {
            kind: spec.kind,
            command: spec.command_line(),
            outcome: StepOutcome::NotRun,
            started_at: None,
            finished_at: None,
        }
    }

    /// Mark the step as started.
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    /// Mark the step as finished with the given exit code.
    pub fn finish(&mut self, code: ExitCode) {
        self.outcome = StepOutcome::from_exit(code);
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock time the step took, in milliseconds.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifier of the run.
    pub run_id: RunId,

    /// One record per pipeline step, in order.
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    /// Create a report with every step of `pipeline` marked as not run.
    pub fn new(run_id: RunId, pipeline: &Pipeline) -> Self {
        Self {
            run_id,
            steps: pipeline.steps().iter().map(StepRecord::new).collect(),
        }
    }

    /// Mutable access to the record of `kind`.
    pub fn record_mut(&mut self, kind: StepKind) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|r| r.kind == kind)
    }

    /// Record of `kind`.
    pub fn record(&self, kind: StepKind) -> Option<&StepRecord> {
        self.steps.iter().find(|r| r.kind == kind)
    }

    /// The first step that failed, if any.
    pub fn first_failure(&self) -> Option<&StepRecord> {
        self.steps
            .iter()
            .find(|r| matches!(r.outcome, StepOutcome::Failed { .. }))
    }

    /// Overall exit code: the first failing step's code, otherwise success.
    pub fn exit_code(&self) -> ExitCode {
        match self.first_failure().map(|r| r.outcome) {
            Some(StepOutcome::Failed { exit_code }) => exit_code,
            _ => ExitCode::SUCCESS,
        }
    }

    /// Returns true if every step ran and succeeded.
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|r| r.outcome == StepOutcome::Succeeded)
    }

    /// Steps that were actually started.
    pub fn executed(&self) -> impl Iterator<Item = StepKind> + '_ {
        self.steps.iter().filter(|r| r.outcome.ran()).map(|r| r.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        RunReport::new(RunId::new("run-test"), &Pipeline::standard())
    }

    #[test]
    fn test_new_report_has_nothing_run() {
        let report = report();
        assert_eq!(report.steps.len(), 4);
        assert_eq!(report.executed().count(), 0);
        assert!(report.first_failure().is_none());
        assert!(!report.is_success());
    }

    #[test]
    fn test_exit_code_is_first_failure() {
        let mut report = report();
        report.record_mut(StepKind::Install).unwrap().finish(ExitCode::SUCCESS);
        report.record_mut(StepKind::Test).unwrap().finish(ExitCode::new(5));

        assert_eq!(report.exit_code(), ExitCode::new(5));
        assert_eq!(report.first_failure().unwrap().kind, StepKind::Test);
        assert_eq!(
            report.executed().collect::<Vec<_>>(),
            vec![StepKind::Install, StepKind::Test]
        );
    }

    #[test]
    fn test_all_succeeded() {
        let mut report = report();
        for kind in StepKind::ALL {
            report.record_mut(kind).unwrap().finish(ExitCode::SUCCESS);
        }
        assert!(report.is_success());
        assert_eq!(report.exit_code(), ExitCode::SUCCESS);
    }

    #[test]
    fn test_duration_requires_both_timestamps() {
        let mut record = StepRecord::new(&StepSpec::default_for(StepKind::Lint));
        assert!(record.duration_ms().is_none());
        record.start();
        record.finish(ExitCode::SUCCESS);
        assert!(record.duration_ms().unwrap() >= 0);
    }

    #[test]
    fn test_record_serializes_outcome_inline() {
        let mut record = StepRecord::new(&StepSpec::default_for(StepKind::Lint));
        record.finish(ExitCode::new(1));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["kind"], "lint");
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["exit_code"], 1);
        assert_eq!(value["command"], "flake8 .");
    }
}
