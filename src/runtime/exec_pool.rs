//! Named execution pools backed by owned tokio runtimes.

use std::future::Future;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::core::SchedulerError;

/// A named multi-thread tokio runtime owned by the scheduler.
///
/// Worker threads are named `{name}-worker` so logs and thread dumps show
/// which pool ran a task. Shutdown uses `shutdown_background`, which never
/// blocks and is therefore safe to trigger from a completion callback
/// running inside one of the pools being torn down.
pub struct ExecPool {
    name: String,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
}

impl ExecPool {
    /// Start a pool named `name` with `worker_threads` workers.
    pub fn new(name: impl Into<String>, worker_threads: usize) -> Result<Self, SchedulerError> {
        let name = name.into();
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name(format!("{name}-worker"))
            .enable_all()
            .build()
            .map_err(|e| SchedulerError::PoolBuild(format!("pool `{name}`: {e}")))?;
        let handle = runtime.handle().clone();
        debug!(pool = %name, worker_threads, "execution pool started");
        Ok(Self {
            name,
            handle,
            runtime: Mutex::new(Some(runtime)),
        })
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle for spawning onto this pool.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Spawn a future onto this pool.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(fut)
    }

    /// Stop the pool without waiting for outstanding tasks; they are
    /// abandoned. Idempotent.
    pub fn shutdown(&self) {
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
            debug!(pool = %self.name, "execution pool shut down");
        }
    }
}

impl Drop for ExecPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
            trace!(pool = %self.name, "execution pool dropped without explicit shutdown");
        }
    }
}

/// Where outcome notifications run: a pool the scheduler owns, or a runtime
/// borrowed from the embedding application.
pub enum ObserverPool {
    /// Scheduler-owned pool, torn down with the scheduler.
    Owned(ExecPool),
    /// Borrowed runtime handle; never shut down here.
    External(Handle),
}

impl ObserverPool {
    /// Handle for spawning observation work.
    pub fn handle(&self) -> Handle {
        match self {
            Self::Owned(pool) => pool.handle(),
            Self::External(handle) => handle.clone(),
        }
    }

    /// Shut down the owned pool; a borrowed handle is left alone.
    pub fn shutdown(&self) {
        if let Self::Owned(pool) = self {
            pool.shutdown();
        }
    }
}
