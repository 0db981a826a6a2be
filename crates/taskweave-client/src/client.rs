//! Execution client: kernel-aware submission with per-output fan-out.

use crate::backend::{kernel_task, task_fn, Arg, Backend, FutureHandle, TaskFn};
use crate::local::LocalBackend;
use futures::future::try_join_all;
use std::sync::Arc;
use taskweave_core::{BackendConfig, Error, Outcome, Result, TaskweaveConfig, Value};
use taskweave_kernels::{FunctionKernel, Kernel, SubprocessKernel};
use tracing::debug;

/// What to run: a kernel, whose results are shaped by its declared outputs,
/// or a bare task whose single future is returned unchanged.
#[derive(Clone)]
pub enum Target {
    Kernel(Arc<dyn Kernel>),
    Task { label: String, task: TaskFn },
}

impl Target {
    pub fn task<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Task {
            label: label.into(),
            task: task_fn(f),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Kernel(k) => k.name(),
            Self::Task { label, .. } => label,
        }
    }
}

impl From<Arc<dyn Kernel>> for Target {
    fn from(k: Arc<dyn Kernel>) -> Self {
        Self::Kernel(k)
    }
}

impl From<FunctionKernel> for Target {
    fn from(k: FunctionKernel) -> Self {
        Self::Kernel(Arc::new(k))
    }
}

impl From<SubprocessKernel> for Target {
    fn from(k: SubprocessKernel) -> Self {
        Self::Kernel(Arc::new(k))
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kernel(k) => write!(f, "Target::Kernel({})", k.name()),
            Self::Task { label, .. } => write!(f, "Target::Task({})", label),
        }
    }
}

/// Futures for one submission: one per declared output of a multi-output kernel.
#[derive(Clone, Debug)]
pub enum Submission {
    Single(FutureHandle),
    Multiple(Vec<FutureHandle>),
}

impl Submission {
    pub fn single(&self) -> Option<&FutureHandle> {
        match self {
            Self::Single(f) => Some(f),
            Self::Multiple(_) => None,
        }
    }

    pub fn handles(&self) -> Vec<&FutureHandle> {
        match self {
            Self::Single(f) => vec![f],
            Self::Multiple(fs) => fs.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multiple(fs) => fs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Futures for a batch: one list across the batch, or one list per declared
/// output of a multi-output kernel.
#[derive(Clone, Debug)]
pub enum BatchSubmission {
    Single(Vec<FutureHandle>),
    Multiple(Vec<Vec<FutureHandle>>),
}

impl BatchSubmission {
    pub fn single(&self) -> Option<&[FutureHandle]> {
        match self {
            Self::Single(fs) => Some(fs),
            Self::Multiple(_) => None,
        }
    }

    pub fn outputs(&self) -> Option<&[Vec<FutureHandle>]> {
        match self {
            Self::Single(_) => None,
            Self::Multiple(lists) => Some(lists),
        }
    }
}

/// One argument of a batch: a list consumed element-wise, or a value
/// repeated for every element.
#[derive(Clone, Debug)]
pub enum MapArg {
    Each(Vec<Arg>),
    Broadcast(Arg),
}

impl MapArg {
    pub fn each<I, A>(items: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Self::Each(items.into_iter().map(Into::into).collect())
    }

    pub fn broadcast(arg: impl Into<Arg>) -> Self {
        Self::Broadcast(arg.into())
    }
}

/// Expand mapped arguments into per-element argument lists. Every `Each`
/// list must share one length; `Broadcast` values repeat to that length.
fn broadcast_batches(context: &str, args: Vec<MapArg>) -> Result<Vec<Vec<Arg>>> {
    let lengths: Vec<usize> = args
        .iter()
        .filter_map(|a| match a {
            MapArg::Each(items) => Some(items.len()),
            MapArg::Broadcast(_) => None,
        })
        .collect();
    let Some(&n) = lengths.iter().max() else {
        return Ok(Vec::new());
    };
    if lengths.iter().any(|&len| len != n) {
        return Err(Error::arity(
            context,
            format!("mapped lists differ in length: {:?}", lengths),
        ));
    }

    Ok((0..n)
        .map(|j| {
            args.iter()
                .map(|a| match a {
                    MapArg::Each(items) => items[j].clone(),
                    MapArg::Broadcast(arg) => arg.clone(),
                })
                .collect()
        })
        .collect())
}

/// Task returning element `index` of its single argument's tuple.
fn element_task(index: usize) -> TaskFn {
    task_fn(move |args| {
        args.into_iter()
            .next()
            .unwrap_or_default()
            .into_element(index)
    })
}

pub struct ExecutionClient {
    backend: Arc<dyn Backend>,
}

impl ExecutionClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// A client over an in-process backend with default settings.
    pub fn local() -> Result<Self> {
        Self::from_backend_config(&BackendConfig::default())
    }

    pub fn from_config(config: &TaskweaveConfig) -> Result<Self> {
        Self::from_backend_config(&config.backend)
    }

    fn from_backend_config(config: &BackendConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(LocalBackend::from_config(config)?)))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Schedule one run of `target`. For a kernel the argument count is
    /// checked first and the result is fanned out per output.
    pub fn submit(&self, target: impl Into<Target>, args: Vec<Arg>) -> Result<Submission> {
        match target.into() {
            Target::Kernel(kernel) => {
                kernel.check_arity(args.len())?;
                let future = self
                    .backend
                    .submit(kernel.name(), kernel_task(Arc::clone(&kernel)), args)?;
                self.unpack(kernel.as_ref(), future)
            }
            Target::Task { label, task } => {
                Ok(Submission::Single(self.backend.submit(&label, task, args)?))
            }
        }
    }

    /// Split `future`, produced by `kernel`, into one future per declared
    /// output. Each derived future depends only on `future`.
    ///
    /// For a multi-output kernel `future` is released once the derived tasks
    /// are scheduled: they are its only consumers, and each keeps just its
    /// own element, so releasing every derived future frees the whole result.
    pub fn unpack(&self, kernel: &dyn Kernel, future: FutureHandle) -> Result<Submission> {
        if !kernel.is_multi_output() {
            return Ok(Submission::Single(future));
        }
        let derived = kernel
            .outputs()
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let label = format!("{}[{}]", future.key(), name);
                self.backend
                    .submit(&label, element_task(index), vec![Arg::Future(future.clone())])
            })
            .collect::<Result<Vec<_>>>();
        self.backend.release(&future);
        let derived = derived?;
        debug!("unpacked {} into {} futures", future, derived.len());
        Ok(Submission::Multiple(derived))
    }

    /// Run `target` element-wise over `args`. Lengths are checked before
    /// anything is scheduled. A multi-output kernel's results come back as
    /// one list of futures per output.
    pub fn map(&self, target: impl Into<Target>, args: Vec<MapArg>) -> Result<BatchSubmission> {
        let target = target.into();
        if let Target::Kernel(kernel) = &target {
            kernel.check_arity(args.len())?;
        }
        let batches = broadcast_batches(target.label(), args)?;
        debug!("mapping {} over {} elements", target.label(), batches.len());

        match target {
            Target::Task { label, task } => {
                Ok(BatchSubmission::Single(self.backend.map(&label, task, batches)?))
            }
            Target::Kernel(kernel) => {
                let futures =
                    self.backend
                        .map(kernel.name(), kernel_task(Arc::clone(&kernel)), batches)?;
                if !kernel.is_multi_output() {
                    return Ok(BatchSubmission::Single(futures));
                }
                let mut per_output: Vec<Vec<FutureHandle>> =
                    vec![Vec::with_capacity(futures.len()); kernel.output_count()];
                for future in futures {
                    if let Submission::Multiple(derived) = self.unpack(kernel.as_ref(), future)? {
                        for (list, f) in per_output.iter_mut().zip(derived) {
                            list.push(f);
                        }
                    }
                }
                Ok(BatchSubmission::Multiple(per_output))
            }
        }
    }

    /// Place `value` with the backend once and return a future usable as an
    /// argument to any number of submissions.
    pub fn upload(&self, value: impl Into<Value>) -> Result<FutureHandle> {
        self.backend.broadcast(value.into())
    }

    pub async fn resolve(&self, future: &FutureHandle) -> Result<Value> {
        self.backend.resolve(future).await
    }

    /// Resolve every future of a submission into an outcome of the same shape.
    pub async fn gather(&self, submission: &Submission) -> Result<Outcome> {
        match submission {
            Submission::Single(f) => Ok(Outcome::Single(self.resolve(f).await?)),
            Submission::Multiple(fs) => Ok(Outcome::Multiple(self.gather_all(fs).await?)),
        }
    }

    pub async fn gather_all(&self, futures: &[FutureHandle]) -> Result<Vec<Value>> {
        try_join_all(futures.iter().map(|f| self.resolve(f))).await
    }

    pub fn release(&self, future: &FutureHandle) {
        self.backend.release(future);
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }
}
