//! Taskweave Core - values, result shapes, errors, and configuration

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod value;

pub use config::{BackendConfig, KernelConfig, StagingConfig, TaskweaveConfig};
pub use diagnostic::DebugInfo;
pub use error::{Error, ExecutionError, Result};
pub use value::{Outcome, Value};
