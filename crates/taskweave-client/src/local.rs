//! In-process backend: runs tasks on the current tokio runtime.
//!
//! Tasks are spawned as soon as they are submitted. A task first waits for its
//! future arguments, then for one of `workers` permits, then runs. Results are
//! memoized in shared futures so any number of dependants and callers can
//! observe them.

use crate::backend::{Arg, Backend, FutureHandle, TaskFn};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use taskweave_core::{BackendConfig, Error, Result, Value};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type SharedResult = Shared<BoxFuture<'static, Result<Value>>>;

pub struct LocalBackend {
    runtime: Handle,
    results: DashMap<u64, SharedResult>,
    next_id: AtomicU64,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    workers: usize,
}

enum Pending {
    Ready(Value),
    Waiting(SharedResult),
}

impl LocalBackend {
    /// A backend running at most `workers` tasks at once. Must be created
    /// inside a tokio runtime.
    pub fn new(workers: usize) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|_| Error::backend("local backend needs a running tokio runtime"))?;
        let workers = workers.max(1);
        info!("local backend started with {} workers", workers);
        Ok(Self {
            runtime,
            results: DashMap::new(),
            next_id: AtomicU64::new(0),
            permits: Arc::new(Semaphore::new(workers)),
            shutdown: CancellationToken::new(),
            workers,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(config.workers)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of results currently held.
    pub fn held(&self) -> usize {
        self.results.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::backend("local backend is closed"));
        }
        Ok(())
    }

    fn allocate(&self, label: &str) -> FutureHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        FutureHandle::new(id, format!("{}-{}", label, id))
    }

    fn lookup(&self, future: &FutureHandle) -> Result<SharedResult> {
        self.results
            .get(&future.id())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::backend(format!("unknown or released future {}", future)))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn submit(&self, label: &str, task: TaskFn, args: Vec<Arg>) -> Result<FutureHandle> {
        self.ensure_open()?;
        let pending = args
            .into_iter()
            .map(|arg| match arg {
                Arg::Value(v) => Ok(Pending::Ready(v)),
                Arg::Future(f) => self.lookup(&f).map(Pending::Waiting),
            })
            .collect::<Result<Vec<_>>>()?;

        let handle = self.allocate(label);
        let key = handle.key().to_string();
        let token = self.shutdown.clone();
        let permits = Arc::clone(&self.permits);

        let work_key = key.clone();
        let work = async move {
            let mut values = Vec::with_capacity(pending.len());
            for arg in pending {
                values.push(match arg {
                    Pending::Ready(v) => v,
                    Pending::Waiting(dep) => dep.await?,
                });
            }
            let _permit = permits.acquire_owned().await.map_err(|_| Error::Cancelled)?;
            debug!("task {} running", work_key);
            let result = task(values).await;
            if let Err(e) = &result {
                debug!("task {} failed: {}", work_key, e);
            }
            result
        };

        let join = self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => Err(Error::Cancelled),
                result = work => result,
            }
        });

        let join_key = key.clone();
        let shared = async move {
            match join.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => {
                    warn!("task {} panicked", join_key);
                    Err(Error::backend(format!("task {} panicked", join_key)))
                }
                Err(_) => Err(Error::Cancelled),
            }
        }
        .boxed()
        .shared();

        self.results.insert(handle.id(), shared);
        debug!("submitted {}", key);
        Ok(handle)
    }

    fn broadcast(&self, value: Value) -> Result<FutureHandle> {
        self.ensure_open()?;
        let handle = self.allocate("upload");
        let ready: BoxFuture<'static, Result<Value>> = futures::future::ready(Ok(value)).boxed();
        self.results.insert(handle.id(), ready.shared());
        debug!("broadcast {}", handle);
        Ok(handle)
    }

    async fn resolve(&self, future: &FutureHandle) -> Result<Value> {
        let shared = self.lookup(future)?;
        shared.await
    }

    fn release(&self, future: &FutureHandle) {
        if self.results.remove(&future.id()).is_some() {
            debug!("released {}", future);
        }
    }

    async fn close(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.permits.close();
        let dropped = self.results.len();
        self.results.clear();
        info!("local backend closed, dropped {} results", dropped);
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("workers", &self.workers)
            .field("held", &self.results.len())
            .field("closed", &self.shutdown.is_cancelled())
            .finish()
    }
}
