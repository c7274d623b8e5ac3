//! Pipeline state machine and per-step outcomes.

use crate::{CoreError, ExitCode, StepKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a pipeline run.
///
/// `Installing -> Testing -> TypeChecking -> Linting -> Done`, with `Failed`
/// reachable from every running state. Skipped steps are jumped over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// Installing dependencies.
    Installing,
    /// Running the test suite.
    Testing,
    /// Running the type checker.
    TypeChecking,
    /// Running the linter.
    Linting,
    /// Every step succeeded.
    Done,
    /// A step failed; nothing else runs.
    Failed,
}

impl PipelineState {
    /// State while `kind` is running.
    pub fn running(kind: StepKind) -> Self {
        match kind {
            StepKind::Install => Self::Installing,
            StepKind::Test => Self::Testing,
            StepKind::TypeCheck => Self::TypeChecking,
            StepKind::Lint => Self::Linting,
        }
    }

    /// Initial state for a pipeline whose first step is `first`.
    pub fn initial(first: Option<StepKind>) -> Self {
        first.map(Self::running).unwrap_or(Self::Done)
    }

    /// The step running in this state, if any.
    pub fn step(&self) -> Option<StepKind> {
        match self {
            Self::Installing => Some(StepKind::Install),
            Self::Testing => Some(StepKind::Test),
            Self::TypeChecking => Some(StepKind::TypeCheck),
            Self::Linting => Some(StepKind::Lint),
            Self::Done | Self::Failed => None,
        }
    }

    /// Returns true if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// The current step succeeded; move to `next` (or `Done` when none is left).
    pub fn advance(self, next: Option<StepKind>) -> Result<Self, CoreError> {
        let current = self.step().ok_or_else(|| self.invalid("next step"))?;
        match next {
            None => Ok(Self::Done),
            Some(kind) if kind > current => Ok(Self::running(kind)),
            Some(kind) => Err(self.invalid(Self::running(kind))),
        }
    }

    /// The current step failed.
    pub fn fail(self) -> Result<Self, CoreError> {
        if self.is_terminal() {
            return Err(self.invalid(Self::Failed));
        }
        Ok(Self::Failed)
    }

    fn invalid(self, to: impl fmt::Display) -> CoreError {
        CoreError::InvalidStateTransition {
            from: self.to_string(),
            to: to.to_string(),
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Installing => "installing",
            Self::Testing => "testing",
            Self::TypeChecking => "type-checking",
            Self::Linting => "linting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happened to one step of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step was never started because an earlier step failed.
    #[default]
    NotRun,
    /// The step exited with code zero.
    Succeeded,
    /// The step exited non-zero.
    Failed { exit_code: ExitCode },
}

impl StepOutcome {
    /// Outcome for a finished step with the given exit code.
    pub fn from_exit(code: ExitCode) -> Self {
        if code.is_success() {
            Self::Succeeded
        } else {
            Self::Failed { exit_code: code }
        }
    }

    /// Returns true if the step ran.
    pub fn ran(&self) -> bool {
        !matches!(self, Self::NotRun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_chain() {
        let mut state = PipelineState::initial(Some(StepKind::Install));
        assert_eq!(state, PipelineState::Installing);
        state = state.advance(Some(StepKind::Test)).unwrap();
        state = state.advance(Some(StepKind::TypeCheck)).unwrap();
        state = state.advance(Some(StepKind::Lint)).unwrap();
        assert_eq!(state, PipelineState::Linting);
        state = state.advance(None).unwrap();
        assert_eq!(state, PipelineState::Done);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_skipping_steps() {
        let state = PipelineState::initial(Some(StepKind::Test))
            .advance(Some(StepKind::Lint))
            .unwrap();
        assert_eq!(state, PipelineState::Linting);
    }

    #[test]
    fn test_empty_pipeline_is_done() {
        assert_eq!(PipelineState::initial(None), PipelineState::Done);
    }

    #[test]
    fn test_failed_is_absorbing() {
        let failed = PipelineState::TypeChecking.fail().unwrap();
        assert_eq!(failed, PipelineState::Failed);
        assert!(failed.fail().is_err());
        assert!(failed.advance(Some(StepKind::Lint)).is_err());
        assert!(PipelineState::Done.fail().is_err());
    }

    #[test]
    fn test_backwards_transition_rejected() {
        let err = PipelineState::Linting.advance(Some(StepKind::Test)).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidStateTransition {
                from: "linting".to_string(),
                to: "testing".to_string(),
            }
        );
    }

    #[test]
    fn test_outcome_from_exit() {
        assert_eq!(StepOutcome::from_exit(ExitCode::SUCCESS), StepOutcome::Succeeded);
        assert_eq!(
            StepOutcome::from_exit(ExitCode::new(2)),
            StepOutcome::Failed { exit_code: ExitCode::new(2) }
        );
        assert!(!StepOutcome::NotRun.ran());
    }
}
