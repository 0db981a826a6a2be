//! The runnable, arity-declared kernel contract.

use taskweave_core::{Error, Outcome, Result, Value};

/// A named unit of work with ordered input and output names.
///
/// The number of declared outputs fixes the shape of every [`Outcome`] that
/// `run` produces. Kernels are immutable once built and may be run any number
/// of times, concurrently.
#[async_trait::async_trait]
pub trait Kernel: Send + Sync {
    /// Name used in logs, task labels and error context.
    fn name(&self) -> &str;

    /// Declared input names, in argument order.
    fn inputs(&self) -> &[String];

    /// Declared output names, in result order.
    fn outputs(&self) -> &[String];

    fn output_count(&self) -> usize {
        self.outputs().len()
    }

    /// Whether results come back as `Outcome::Multiple`.
    fn is_multi_output(&self) -> bool {
        self.output_count() != 1
    }

    /// Reject input names this kernel cannot stage. Checked with the
    /// argument count, before anything is scheduled.
    fn check_inputs(&self) -> Result<()> {
        Ok(())
    }

    /// Fail unless the declared inputs are usable and `got` matches their number.
    fn check_arity(&self, got: usize) -> Result<()> {
        self.check_inputs()?;
        let expected = self.inputs().len();
        if got != expected {
            return Err(Error::count_mismatch(self.name(), "arguments", expected, got));
        }
        Ok(())
    }

    /// Execute once. Takes ownership of the arguments; staged artifacts among
    /// them are released when the run no longer needs them.
    async fn run(&self, args: Vec<Value>) -> Result<Outcome>;
}
