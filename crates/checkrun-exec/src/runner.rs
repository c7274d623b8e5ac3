//! Fail-fast pipeline runner.

use std::sync::Arc;

use checkrun_core::{Pipeline, PipelineState, RunId, RunReport};
use tracing::{debug, warn};

use crate::error::ExecError;
use crate::executor::StepExecutor;
use crate::observer::{LoggingObserver, PipelineObserver};

/// Runs the steps of a pipeline in order, stopping at the first failure.
#[derive(Clone)]
pub struct PipelineRunner {
    executor: Arc<dyn StepExecutor>,
    observer: Arc<dyn PipelineObserver>,
}

impl PipelineRunner {
    /// Create a runner that logs progress through `tracing`.
    pub fn new(executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            executor,
            observer: Arc::new(LoggingObserver),
        }
    }

    /// Replace the observer.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run `pipeline` under a freshly generated run id.
    pub async fn run(&self, pipeline: &Pipeline) -> Result<RunReport, ExecError> {
        self.run_with_id(RunId::generate(), pipeline).await
    }

    /// Run `pipeline` under the given run id.
    ///
    /// Step `i` runs only if every earlier step exited with code zero. The
    /// returned report carries the first non-zero exit code, if any.
    pub async fn run_with_id(
        &self,
        run_id: RunId,
        pipeline: &Pipeline,
    ) -> Result<RunReport, ExecError> {
        let steps = pipeline.steps();
        let mut report = RunReport::new(run_id.clone(), pipeline);
        let mut state = PipelineState::initial(steps.first().map(|s| s.kind));

        if let Err(e) = self.observer.on_pipeline_started(&run_id, steps).await {
            warn!(error = %e, "Observer error on pipeline start");
        }

        for (idx, step) in steps.iter().enumerate() {
            debug!(state = %state, step = %step.kind, "Entering step");

            report.steps[idx].start();
            if let Err(e) = self.observer.on_step_started(&run_id, step).await {
                warn!(error = %e, "Observer error on step start");
            }

            let code = self
                .executor
                .run_step(step, self.observer.clone())
                .await?;

            report.steps[idx].finish(code);
            if let Err(e) = self
                .observer
                .on_step_finished(&run_id, &report.steps[idx])
                .await
            {
                warn!(error = %e, "Observer error on step finish");
            }

            if code.is_success() {
                state = state.advance(steps.get(idx + 1).map(|s| s.kind))?;
            } else {
                state = state.fail()?;
                break;
            }
        }

        debug!(state = %state, exit_code = report.exit_code().code(), "Pipeline finished");

        if let Err(e) = self.observer.on_pipeline_finished(&report).await {
            warn!(error = %e, "Observer error on pipeline finish");
        }

        Ok(report)
    }
}
