//! checkrun - install dependencies, run tests, type-check and lint.
//!
//! Steps run in order and the first one that exits non-zero stops the run.
//! Its exit code becomes the exit code of `checkrun`.

mod config;
mod json_output;

use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;

use checkrun_core::{CoreError, RunId, StepKind};
use checkrun_exec::{OutputMode, PipelineRunner, ProcessExecutor};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use json_output::JsonObserver;

/// Exit code for configuration and usage errors, matching clap's.
const USAGE_ERROR: u8 = 2;

/// Run install, test, type-check and lint, stopping at the first failure.
#[derive(Parser, Debug)]
#[command(name = "checkrun", version, about, long_about = None)]
pub struct Args {
    /// Directory the steps run in
    #[arg(short = 'C', long, default_value = ".")]
    dir: PathBuf,

    /// Pipeline file (defaults to checkrun.toml in --dir, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip a step (install, test, type-check, lint); repeatable
    #[arg(long, value_name = "STEP", value_parser = parse_step)]
    skip: Vec<StepKind>,

    /// Kill any step running longer than this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Emit newline-delimited JSON events on stdout
    #[arg(long)]
    json: bool,

    /// Print the steps that would run and exit
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_step(s: &str) -> Result<StepKind, CoreError> {
    s.parse()
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "checkrun=debug,checkrun_exec=debug,checkrun_core=debug"
    } else {
        "checkrun=info,checkrun_exec=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Logs go to stderr so stdout stays clean for --json.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_plan(config: &Config) -> Result<(), serde_json::Error> {
    if config.json {
        println!("{}", serde_json::to_string(config.pipeline.steps())?);
        return Ok(());
    }
    println!("Working directory: {}", config.working_dir.display());
    if let Some(timeout) = config.timeout {
        println!("Step timeout: {}s", timeout.as_secs());
    }
    for (idx, step) in config.pipeline.steps().iter().enumerate() {
        println!("{}. {:<10} {}", idx + 1, step.kind, step.command_line());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ProcessExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match Config::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ProcessExitCode::from(USAGE_ERROR);
        }
    };

    if config.dry_run {
        return match print_plan(&config) {
            Ok(()) => ProcessExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "Failed to print plan");
                ProcessExitCode::FAILURE
            }
        };
    }

    let run_id = RunId::generate();
    info!(
        run_id = %run_id,
        dir = %config.working_dir.display(),
        steps = config.pipeline.len(),
        "Starting checkrun"
    );

    let mut executor = ProcessExecutor::new().with_working_dir(&config.working_dir);
    if let Some(timeout) = config.timeout {
        executor = executor.with_timeout(timeout);
    }

    let runner = if config.json {
        let executor = executor.with_output_mode(OutputMode::Capture);
        PipelineRunner::new(Arc::new(executor))
            .with_observer(Arc::new(JsonObserver::new(run_id.clone())))
    } else {
        PipelineRunner::new(Arc::new(executor))
    };

    match runner.run_with_id(run_id, &config.pipeline).await {
        Ok(report) => ProcessExitCode::from(report.exit_code().to_process_byte()),
        Err(e) => {
            error!(error = %e, "Pipeline aborted");
            ProcessExitCode::FAILURE
        }
    }
}
