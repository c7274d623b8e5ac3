//! Fail-fast behavior of the pipeline runner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use checkrun_core::{ExitCode, Pipeline, RunId, StepKind, StepOutcome, StepSpec};
use checkrun_exec::{
    ChannelObserver, ExecError, PipelineEvent, PipelineObserver, PipelineRunner, StepExecutor,
};

/// Executor that returns scripted exit codes and records which steps ran.
#[derive(Default)]
struct ScriptedExecutor {
    codes: HashMap<StepKind, i32>,
    calls: Mutex<Vec<StepKind>>,
}

impl ScriptedExecutor {
    fn failing(kind: StepKind, code: i32) -> Self {
        let mut codes = HashMap::new();
        codes.insert(kind, code);
        Self {
            codes,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<StepKind> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn run_step(
        &self,
        step: &StepSpec,
        _observer: Arc<dyn PipelineObserver>,
    ) -> Result<ExitCode, ExecError> {
        self.calls.lock().unwrap().push(step.kind);
        Ok(ExitCode::new(self.codes.get(&step.kind).copied().unwrap_or(0)))
    }
}

async fn run(executor: Arc<ScriptedExecutor>) -> checkrun_core::RunReport {
    PipelineRunner::new(executor)
        .run(&Pipeline::standard())
        .await
        .unwrap()
}

#[tokio::test]
async fn all_steps_pass_gives_zero() {
    let executor = Arc::new(ScriptedExecutor::default());
    let report = run(executor.clone()).await;

    assert_eq!(report.exit_code(), ExitCode::SUCCESS);
    assert!(report.is_success());
    assert_eq!(executor.calls(), StepKind::ALL.to_vec());
}

#[tokio::test]
async fn install_failure_skips_everything_else() {
    let executor = Arc::new(ScriptedExecutor::failing(StepKind::Install, 1));
    let report = run(executor.clone()).await;

    assert_eq!(report.exit_code(), ExitCode::new(1));
    assert_eq!(executor.calls(), vec![StepKind::Install]);
    for kind in [StepKind::Test, StepKind::TypeCheck, StepKind::Lint] {
        assert_eq!(report.record(kind).unwrap().outcome, StepOutcome::NotRun);
    }
}

#[tokio::test]
async fn type_check_failure_skips_lint() {
    let executor = Arc::new(ScriptedExecutor::failing(StepKind::TypeCheck, 1));
    let report = run(executor.clone()).await;

    assert_eq!(report.exit_code(), ExitCode::new(1));
    assert_eq!(
        executor.calls(),
        vec![StepKind::Install, StepKind::Test, StepKind::TypeCheck]
    );
    assert_eq!(report.record(StepKind::Lint).unwrap().outcome, StepOutcome::NotRun);
}

#[tokio::test]
async fn lint_failure_is_reported() {
    let executor = Arc::new(ScriptedExecutor::failing(StepKind::Lint, 1));
    let report = run(executor.clone()).await;

    assert_eq!(report.exit_code(), ExitCode::new(1));
    assert_eq!(executor.calls(), StepKind::ALL.to_vec());
    assert_eq!(report.first_failure().unwrap().kind, StepKind::Lint);
}

#[tokio::test]
async fn failing_step_code_is_propagated_exactly() {
    for (idx, kind) in StepKind::ALL.into_iter().enumerate() {
        let executor = Arc::new(ScriptedExecutor::failing(kind, 42));
        let report = run(executor.clone()).await;

        assert_eq!(report.exit_code(), ExitCode::new(42));
        assert_eq!(executor.calls(), StepKind::ALL[..=idx].to_vec());
    }
}

#[tokio::test]
async fn repeated_runs_agree() {
    let executor = Arc::new(ScriptedExecutor::failing(StepKind::Test, 2));
    let first = run(executor.clone()).await;
    let second = run(executor.clone()).await;

    assert_eq!(first.exit_code(), second.exit_code());
    assert_eq!(
        first.executed().collect::<Vec<_>>(),
        second.executed().collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn skipped_steps_never_reach_the_executor() {
    let executor = Arc::new(ScriptedExecutor::default());
    let pipeline = Pipeline::standard().without(&[StepKind::Install]);
    let report = PipelineRunner::new(executor.clone())
        .run(&pipeline)
        .await
        .unwrap();

    assert_eq!(report.steps.len(), 3);
    assert_eq!(
        executor.calls(),
        vec![StepKind::Test, StepKind::TypeCheck, StepKind::Lint]
    );
}

#[tokio::test]
async fn observer_sees_events_in_order() {
    let executor = Arc::new(ScriptedExecutor::failing(StepKind::Test, 3));
    let (observer, mut rx) = ChannelObserver::new();
    let runner = PipelineRunner::new(executor).with_observer(Arc::new(observer));

    runner
        .run_with_id(RunId::new("run-events"), &Pipeline::standard())
        .await
        .unwrap();

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        let name = match event {
            PipelineEvent::PipelineStarted { .. } => "pipeline_started".to_string(),
            PipelineEvent::StepStarted { step, .. } => format!("started:{}", step.kind),
            PipelineEvent::Output(_) => "output".to_string(),
            PipelineEvent::StepFinished { record, .. } => format!("finished:{}", record.kind),
            PipelineEvent::PipelineFinished { report } => {
                assert_eq!(report.exit_code(), ExitCode::new(3));
                "pipeline_finished".to_string()
            }
        };
        names.push(name);
    }

    assert_eq!(
        names,
        vec![
            "pipeline_started",
            "started:install",
            "finished:install",
            "started:test",
            "finished:test",
            "pipeline_finished",
        ]
    );
}

#[tokio::test]
async fn dropped_observer_does_not_change_outcome() {
    let executor = Arc::new(ScriptedExecutor::default());
    let (observer, rx) = ChannelObserver::new();
    drop(rx);

    let report = PipelineRunner::new(executor)
        .with_observer(Arc::new(observer))
        .run(&Pipeline::standard())
        .await
        .unwrap();
    assert!(report.is_success());
}
