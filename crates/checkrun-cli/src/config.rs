//! Run configuration.
//!
//! Built-in defaults are overridden by `checkrun.toml`, which is in turn
//! overridden by command-line flags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use checkrun_core::{CoreError, Pipeline, StepKind, StepSpec};
use serde::Deserialize;
use thiserror::Error;

use crate::Args;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "checkrun.toml";

/// Configuration errors. All of them are reported before any step runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Timeout must be at least one second")]
    ZeroTimeout,

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Contents of `checkrun.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    /// Per-step timeout in seconds.
    timeout_secs: Option<u64>,

    /// Steps to leave out.
    #[serde(default)]
    skip: Vec<String>,

    /// Command overrides keyed by step name.
    #[serde(default)]
    steps: BTreeMap<String, StepOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepOverride {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

/// Fully resolved configuration for one invocation.
#[derive(Debug)]
pub struct Config {
    /// Directory every step runs in.
    pub working_dir: PathBuf,

    /// Steps to run, in order.
    pub pipeline: Pipeline,

    /// Per-step timeout.
    pub timeout: Option<Duration>,

    /// Emit JSON events on stdout.
    pub json: bool,

    /// Print the plan instead of running it.
    pub dry_run: bool,
}

impl Config {
    /// Resolve the configuration from defaults, the config file and flags.
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => Some(load_file(path)?),
            None => {
                let path = args.dir.join(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Some(load_file(&path)?)
                } else {
                    None
                }
            }
        }
        .unwrap_or_default();

        let mut pipeline = Pipeline::standard();
        for (name, step) in file.steps {
            let kind: StepKind = name.parse()?;
            let mut spec = StepSpec::new(kind, step.program, step.args)?;
            spec.env = step.env;
            pipeline = pipeline.with_step(spec);
        }

        let mut skipped = file
            .skip
            .iter()
            .map(|name| name.parse::<StepKind>())
            .collect::<Result<Vec<_>, _>>()?;
        skipped.extend(args.skip.iter().copied());
        let pipeline = pipeline.without(&skipped);

        let timeout = match args.timeout.or(file.timeout_secs) {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(Self {
            working_dir: args.dir.clone(),
            pipeline,
            timeout,
            json: args.json,
            dry_run: args.dry_run,
        })
    }
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
