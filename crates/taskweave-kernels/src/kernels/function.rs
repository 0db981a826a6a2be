//! Function kernel: wraps a Rust callable.

use crate::kernel::Kernel;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use taskweave_core::{Error, ExecutionError, Outcome, Result, Value};
use tracing::{debug, warn};

/// Callable wrapped by a [`FunctionKernel`]. Receives the arguments
/// positionally, with staged artifacts coerced to their local paths.
pub type KernelFn = dyn Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync;

#[derive(Clone)]
pub struct FunctionKernel {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    func: Arc<KernelFn>,
}

impl FunctionKernel {
    /// A kernel with no declared inputs and a single output named after the kernel.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            outputs: vec![name.clone()],
            name,
            inputs: Vec::new(),
            func: Arc::new(func),
        }
    }

    pub fn with_inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = names.into_iter().map(Into::into).collect();
        self
    }

    fn failure(&self, message: String) -> Error {
        ExecutionError::Function {
            kernel: self.name.clone(),
            message,
        }
        .into()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[async_trait]
impl Kernel for FunctionKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn outputs(&self) -> &[String] {
        &self.outputs
    }

    async fn run(&self, args: Vec<Value>) -> Result<Outcome> {
        self.check_arity(args.len())?;
        debug!("kernel {}: calling with {} args", self.name, args.len());

        // `args` stays alive across the call so coerced paths remain valid.
        let coerced: Vec<Value> = args.iter().map(Value::coerce_path).collect();
        let func = Arc::clone(&self.func);
        let joined = tokio::task::spawn_blocking(move || func(coerced)).await;
        drop(args);

        let returned = match joined {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => return Err(self.failure(format!("{:#}", e))),
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                warn!("kernel {}: callable panicked: {}", self.name, message);
                return Err(self.failure(format!("panicked: {}", message)));
            }
            Err(_) => return Err(Error::Cancelled),
        };

        Outcome::from_return(returned, self.outputs.len(), &self.name)
    }
}

impl std::fmt::Debug for FunctionKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionKernel")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}
