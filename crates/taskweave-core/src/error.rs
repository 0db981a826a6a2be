//! Error types for Taskweave
//!
//! Every variant is `Clone` so one failed future can be observed by all of
//! its dependants.

use taskweave_staging::StagingError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("arity error in {context}: {detail}")]
    Arity { context: String, detail: String },

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("command `{command}` {}: {}", describe_exit(.exit_code), .stderr.trim())]
    Command {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to spawn `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("kernel {kernel} failed: {message}")]
    Function { kernel: String, message: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn arity(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Arity {
            context: context.into(),
            detail: detail.into(),
        }
    }

    /// Arity error for a count mismatch, e.g. "expected 2 arguments, got 3".
    pub fn count_mismatch(context: impl Into<String>, what: &str, expected: usize, got: usize) -> Self {
        Self::arity(context, format!("expected {} {}, got {}", expected, what, got))
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// The exit code carried by a failed command, if this is one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Execution(ExecutionError::Command { exit_code, .. }) => *exit_code,
            _ => None,
        }
    }
}
