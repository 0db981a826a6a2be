//! Taskweave: wrap commands and callables as kernels with declared inputs
//! and outputs, run them through a task backend, and stage their files.
//!
//! The library surface is split across the workspace crates and re-exported
//! here; [`prelude`] pulls in the common types.

pub mod deliver;

pub use taskweave_client as client;
pub use taskweave_core as core;
pub use taskweave_kernels as kernels;
pub use taskweave_staging as staging;

pub mod prelude {
    pub use crate::deliver::{deliver_outputs, Delivered};
    pub use taskweave_client::{
        Arg, Backend, BatchSubmission, ExecutionClient, FutureHandle, LocalBackend, MapArg,
        Submission, Target,
    };
    pub use taskweave_core::{
        DebugInfo, Error, ExecutionError, Outcome, Result, TaskweaveConfig, Value,
    };
    pub use taskweave_kernels::{FunctionKernel, Kernel, SubprocessKernel, DEBUGINFO, STDOUT};
    pub use taskweave_staging::{
        Destination, FileStore, Source, StagePoint, StagedArtifact, StagingError,
    };
}
