//! Backend contract: the task-execution service the client submits to.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::path::PathBuf;
use std::sync::Arc;
use taskweave_core::{Result, Value};
use taskweave_kernels::Kernel;
use taskweave_staging::StagedArtifact;

/// A unit of work a backend can schedule: positional values in, one value out.
pub type TaskFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wrap a synchronous callable as a backend task.
pub fn task_fn<F>(f: F) -> TaskFn
where
    F: Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(move |args| futures::future::ready(f(args)).boxed())
}

/// A task running `kernel` once. Multi-output results travel as one tuple value.
pub fn kernel_task(kernel: Arc<dyn Kernel>) -> TaskFn {
    Arc::new(move |args| {
        let kernel = Arc::clone(&kernel);
        async move { kernel.run(args).await.map(|outcome| outcome.into_value()) }.boxed()
    })
}

/// Opaque reference to a value a backend is computing or holds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FutureHandle {
    id: u64,
    key: Arc<str>,
}

impl FutureHandle {
    pub fn new(id: u64, key: impl Into<Arc<str>>) -> Self {
        Self { id, key: key.into() }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Human-readable task key: the submitting label and the id, e.g. `cat-3`.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for FutureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

/// One task argument: a concrete value, or the eventual value of another future.
#[derive(Clone, Debug)]
pub enum Arg {
    Value(Value),
    Future(FutureHandle),
}

impl Arg {
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<FutureHandle> for Arg {
    fn from(f: FutureHandle) -> Self {
        Self::Future(f)
    }
}

impl From<&FutureHandle> for Arg {
    fn from(f: &FutureHandle) -> Self {
        Self::Future(f.clone())
    }
}

impl From<StagedArtifact> for Arg {
    fn from(a: StagedArtifact) -> Self {
        Self::Value(Value::Artifact(a))
    }
}

impl From<PathBuf> for Arg {
    fn from(p: PathBuf) -> Self {
        Self::Value(Value::Path(p))
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Self::Value(Value::Int(i))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Self::Value(Value::Text(s))
    }
}

/// A task-execution service.
///
/// Scheduling, placement and retries belong to the implementation. A task
/// runs only after every `Arg::Future` it was given has resolved, and a failed
/// dependency fails the dependant with the same error.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Schedule `task` with `args`. `label` names the task in keys and logs.
    fn submit(&self, label: &str, task: TaskFn, args: Vec<Arg>) -> Result<FutureHandle>;

    /// Schedule `task` once per batch of arguments, returning futures in batch order.
    fn map(&self, label: &str, task: TaskFn, batches: Vec<Vec<Arg>>) -> Result<Vec<FutureHandle>> {
        batches
            .into_iter()
            .map(|args| self.submit(label, Arc::clone(&task), args))
            .collect()
    }

    /// Make `value` available to every task as a future argument.
    fn broadcast(&self, value: Value) -> Result<FutureHandle>;

    /// Wait for `future` and return its value or its failure.
    async fn resolve(&self, future: &FutureHandle) -> Result<Value>;

    /// Drop the backend's hold on a future's result. Running work is unaffected.
    fn release(&self, _future: &FutureHandle) {}

    /// Cancel outstanding work and drop every held result.
    async fn close(&self);
}
