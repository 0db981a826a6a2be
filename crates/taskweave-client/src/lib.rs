//! Taskweave Client: kernel-aware submission over a task-execution backend
//!
//! The [`Backend`] trait is the contract with whatever actually runs work.
//! [`LocalBackend`] runs tasks on the current tokio runtime. The
//! [`ExecutionClient`] adds kernel arity checks, batch broadcasting, and
//! fan-out of multi-output results into one future per output.

pub mod backend;
pub mod client;
pub mod local;

pub use backend::{kernel_task, task_fn, Arg, Backend, FutureHandle, TaskFn};
pub use client::{BatchSubmission, ExecutionClient, MapArg, Submission, Target};
pub use local::LocalBackend;
