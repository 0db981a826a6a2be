//! Structured diagnostics captured from a subprocess run.

use crate::error::ExecutionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything a subprocess kernel observed about one command execution.
///
/// Returned as an ordinary value when a kernel declares the `DEBUGINFO`
/// output, whatever the exit status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub command: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl DebugInfo {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The error this run raises when diagnostics are not captured as a value.
    pub fn to_error(&self) -> ExecutionError {
        ExecutionError::Command {
            command: self.command.clone(),
            exit_code: self.exit_code,
            stderr: self.stderr.clone(),
        }
    }
}

impl std::fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "`{}` exited {} after {}ms", self.command, code, self.elapsed_ms),
            None => write!(f, "`{}` killed by signal after {}ms", self.command, self.elapsed_ms),
        }
    }
}
