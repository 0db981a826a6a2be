//! Taskweave Kernels: named, arity-declared units of work
//!
//! Two kernel forms share the [`Kernel`] contract:
//! - [`FunctionKernel`] wraps a Rust callable.
//! - [`SubprocessKernel`] wraps a shell command template run in a private
//!   working directory, with inputs staged in and outputs staged out.

pub mod kernel;
pub mod kernels;
pub mod names;

pub use kernel::Kernel;
pub use kernels::function::{FunctionKernel, KernelFn};
pub use kernels::subprocess::SubprocessKernel;
pub use names::{
    check_input_name, expand_glob_name, index_width, is_glob, OutputSlot, DEBUGINFO, STDOUT,
};
