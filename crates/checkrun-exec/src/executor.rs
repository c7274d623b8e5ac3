//! Subprocess execution of pipeline steps.
//!
//! This module provides the `StepExecutor` trait and `ProcessExecutor`, which
//! runs a step's program with `tokio::process` and turns however it ended into
//! an `ExitCode`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use checkrun_core::{ExitCode, StepKind, StepSpec};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::ExecError;
use crate::observer::{OutputLine, OutputStream, PipelineObserver};

/// Runs a single step and reports its exit code.
///
/// A step that exits non-zero returns `Ok` with that code. `Err` is reserved
/// for failures of the executor itself.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn run_step(
        &self,
        step: &StepSpec,
        observer: Arc<dyn PipelineObserver>,
    ) -> Result<ExitCode, ExecError>;
}

/// Where a step's stdout and stderr go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Tool output goes straight to this process's terminal.
    #[default]
    Inherit,
    /// Tool output is read line by line and handed to the observer.
    Capture,
}

/// Executor that spawns each step as a child process.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use checkrun_exec::{OutputMode, ProcessExecutor};
///
/// let executor = ProcessExecutor::new()
///     .with_working_dir("/srv/project")
///     .with_timeout(Duration::from_secs(600))
///     .with_output_mode(OutputMode::Capture)
///     .with_env("PIP_DISABLE_PIP_VERSION_CHECK", "1");
/// ```
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    /// Directory the steps run in (current directory if unset).
    working_dir: Option<PathBuf>,

    /// Environment variables applied to every step.
    env_vars: Vec<(String, String)>,

    /// Per-step time limit.
    timeout: Option<Duration>,

    /// Where tool output goes.
    output_mode: OutputMode,

    /// How long captured output may stay open after the step exits.
    drain_grace: Duration,
}

/// Default time captured output may stay open after the step exits.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(2);

impl ProcessExecutor {
    /// Create an executor that inherits stdio and has no timeout.
    pub fn new() -> Self {
        Self {
            working_dir: None,
            env_vars: Vec::new(),
            timeout: None,
            output_mode: OutputMode::Inherit,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    /// Set the working directory for all steps.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable for all steps.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Kill any step that runs longer than `timeout`.
    ///
    /// Only the step's own process is killed. Processes it started in the
    /// background keep running; in `Capture` mode their output is dropped.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the output mode.
    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    /// Set how long captured output is still read after the step exits.
    ///
    /// Processes the step left running in the background are not waited for;
    /// once the grace period ends their output is no longer forwarded.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Working directory, if one was set.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    fn build_command(&self, step: &StepSpec) -> Command {
        let mut cmd = Command::new(&step.program);
        cmd.args(&step.args);

        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        for (key, value) in &step.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        match self.output_mode {
            OutputMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
        }

        cmd.kill_on_drop(true);
        cmd
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepExecutor for ProcessExecutor {
    async fn run_step(
        &self,
        step: &StepSpec,
        observer: Arc<dyn PipelineObserver>,
    ) -> Result<ExitCode, ExecError> {
        let mut cmd = self.build_command(step);
        debug!("Full command: {:?}", cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(step = %step.kind, program = %step.program, error = %e, "Failed to spawn step");
                return Ok(spawn_failure_code(&e));
            }
        };

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, step.kind, OutputStream::Stdout, observer.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, step.kind, OutputStream::Stderr, observer.clone()));
        }

        let status = match self.timeout {
            None => Some(child.wait().await?),
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => Some(status?),
                    Err(_) => {
                        warn!(step = %step.kind, timeout_secs = limit.as_secs(), "Step timed out, killing it");
                        child.kill().await?;
                        None
                    }
                }
            }
        };

        let code = match status {
            Some(status) => {
                // Background processes started by the step may keep the pipes
                // open after it exits; stop reading once the grace period ends.
                let deadline = Instant::now() + self.drain_grace;
                for mut reader in readers {
                    match tokio::time::timeout_at(deadline, &mut reader).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(step = %step.kind, error = %e, "Output reader task failed");
                        }
                        Err(_) => {
                            warn!(step = %step.kind, "Step output still open after exit, detaching");
                            reader.abort();
                        }
                    }
                }
                exit_code_from_status(status)
            }
            None => {
                // Grandchildren may still hold the pipes open.
                for reader in readers {
                    reader.abort();
                }
                ExitCode::TIMED_OUT
            }
        };

        info!(step = %step.kind, exit_code = code.code(), "Step process exited");
        Ok(code)
    }
}

/// Spawn a task that forwards each line of `stream` to the observer.
fn forward_lines<R>(
    stream: R,
    step: StepKind,
    which: OutputStream,
    observer: Arc<dyn PipelineObserver>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let output = OutputLine {
                        step,
                        stream: which,
                        line: text.trim_end_matches(['\r', '\n']).to_string(),
                    };
                    if let Err(e) = observer.on_output(output).await {
                        warn!(error = %e, "Observer error processing output line");
                    }
                }
                Err(e) => {
                    error!(step = %step, stream = which.as_str(), error = %e, "Error reading step output");
                    // Keep the pipe drained so the step never blocks or gets SIGPIPE.
                    if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                        error!(step = %step, stream = which.as_str(), error = %e, "Error draining step output");
                    }
                    break;
                }
            }
        }
    })
}

/// Map a spawn failure to the code a POSIX shell would report.
fn spawn_failure_code(err: &std::io::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::PermissionDenied => ExitCode::NOT_EXECUTABLE,
        _ => ExitCode::NOT_FOUND,
    }
}

/// Map a process termination to an exit code.
fn exit_code_from_status(status: ExitStatus) -> ExitCode {
    if let Some(code) = status.code() {
        return ExitCode::new(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitCode::from_signal(signal);
        }
    }
    ExitCode::FAILURE
}
