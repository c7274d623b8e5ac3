//! Exit codes produced by steps and by the pipeline as a whole.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit code of a step or of a whole run. Zero means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Every step and the run succeeded.
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Generic failure.
    pub const FAILURE: ExitCode = ExitCode(1);

    /// Step exceeded its timeout and was killed.
    pub const TIMED_OUT: ExitCode = ExitCode(124);

    /// Step program exists but could not be executed.
    pub const NOT_EXECUTABLE: ExitCode = ExitCode(126);

    /// Step program could not be found or spawned.
    pub const NOT_FOUND: ExitCode = ExitCode(127);

    /// Base added to a signal number when a step is killed by a signal.
    pub const SIGNAL_BASE: i32 = 128;

    /// Wrap a raw exit code.
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Exit code for a process terminated by `signal`.
    pub const fn from_signal(signal: i32) -> Self {
        Self(Self::SIGNAL_BASE + signal)
    }

    /// The raw integer value.
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Returns true for exit code zero.
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Byte suitable for `std::process::exit`-style reporting.
    ///
    /// Codes are truncated to their low byte like a POSIX shell does, except
    /// that a non-zero code whose low byte is zero maps to 1.
    pub fn to_process_byte(self) -> u8 {
        let byte = (self.0 & 0xff) as u8;
        if byte == 0 && self.0 != 0 {
            1
        } else {
            byte
        }
    }
}

impl Default for ExitCode {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
