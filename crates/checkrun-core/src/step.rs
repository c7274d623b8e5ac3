//! Steps and the ordered pipeline that runs them.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One of the four checks, in the order they must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// Install declared dependencies from the manifest.
    Install,
    /// Run the automated test suite.
    Test,
    /// Strict static type check.
    TypeCheck,
    /// Code style check over the whole tree.
    Lint,
}

impl StepKind {
    /// All steps in execution order.
    pub const ALL: [StepKind; 4] = [Self::Install, Self::Test, Self::TypeCheck, Self::Lint];

    /// Canonical name used in config files, flags and events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Test => "test",
            Self::TypeCheck => "type-check",
            Self::Lint => "lint",
        }
    }

    /// Zero-based position in the pipeline.
    pub fn position(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for StepKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(Self::Install),
            "test" => Ok(Self::Test),
            "type-check" | "typecheck" | "type_check" => Ok(Self::TypeCheck),
            "lint" => Ok(Self::Lint),
            other => Err(CoreError::UnknownStep(other.to_string())),
        }
    }
}

/// A single external-tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Which step this is.
    pub kind: StepKind,

    /// Program to execute, resolved through PATH.
    pub program: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Extra environment variables for this step only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl StepSpec {
    /// Create a new step, rejecting an empty program.
    pub fn new<I, S>(kind: StepKind, program: impl Into<String>, args: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(CoreError::EmptyCommand(kind.name().to_string()));
        }
        Ok(Self {
            kind,
            program,
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
        })
    }

    /// Builder method to add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The built-in command for a step.
    pub fn default_for(kind: StepKind) -> Self {
        let (program, args): (&str, &[&str]) = match kind {
            StepKind::Install => ("pip", &["install", "-r", "requirements-dev.txt"]),
            StepKind::Test => ("python", &["-m", "pytest"]),
            StepKind::TypeCheck => ("mypy", &["--strict", "--ignore-missing-imports", "."]),
            StepKind::Lint => ("flake8", &["."]),
        };
        Self {
            kind,
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
        }
    }

    /// Render the command line for display.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Ordered list of steps run with fail-fast semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    steps: Vec<StepSpec>,
}

impl Pipeline {
    /// Build a pipeline, checking that steps follow the canonical order
    /// without repeats. Steps may be left out.
    pub fn new(steps: Vec<StepSpec>) -> Result<Self, CoreError> {
        for pair in steps.windows(2) {
            if pair[0].kind >= pair[1].kind {
                return Err(CoreError::InvalidPipeline(format!(
                    "step '{}' cannot run after '{}'",
                    pair[1].kind, pair[0].kind
                )));
            }
        }
        if let Some(step) = steps.iter().find(|s| s.program.trim().is_empty()) {
            return Err(CoreError::EmptyCommand(step.kind.name().to_string()));
        }
        Ok(Self { steps })
    }

    /// Install, test, type-check and lint with the built-in commands.
    pub fn standard() -> Self {
        Self {
            steps: StepKind::ALL.iter().map(|k| StepSpec::default_for(*k)).collect(),
        }
    }

    /// Replace the step of the same kind, or insert it at its position.
    pub fn with_step(mut self, spec: StepSpec) -> Self {
        match self.steps.binary_search_by_key(&spec.kind, |s| s.kind) {
            Ok(idx) => self.steps[idx] = spec,
            Err(idx) => self.steps.insert(idx, spec),
        }
        self
    }

    /// Drop the given steps.
    pub fn without(mut self, skipped: &[StepKind]) -> Self {
        self.steps.retain(|s| !skipped.contains(&s.kind));
        self
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    /// Look up a step by kind.
    pub fn step(&self, kind: StepKind) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.kind == kind)
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if every step was skipped.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}
