//! Task scheduling facade with recyclable identifiers.
//!
//! `Scheduler` runs one-shot and fixed-rate work on dedicated execution
//! pools and keys every scheduled operation by an integer identifier from
//! an [`IdPool`]. The identifier doubles as the cancellation key: it is
//! live from the moment a `schedule_*` call returns until the operation
//! completes, errors, or is cancelled, and is then recycled for reuse.
//!
//! Work runs on the compute pool, or on the blocking pool when the caller
//! flags it as blocking. All outcomes (per-item values, errors, panics,
//! completion) are observed on a separate observation pool, so slow
//! logging or event sinks never stall the execution pools.
//!
//! # Example
//!
//! ```rust,ignore
//! use chronopool::config::SchedulerConfig;
//! use chronopool::core::Scheduler;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new(SchedulerConfig::new("app"))?;
//!
//! let id = scheduler.schedule_once_call(Duration::from_millis(100), false, || {
//!     Ok::<_, anyhow::Error>(6 * 7)
//! })?;
//!
//! // The id cancels the task until it fires.
//! scheduler.cancel(id);
//! scheduler.shutdown();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval_at, sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::builders::SchedulerBuilder;
use crate::config::SchedulerConfig;
use crate::core::events::{build_task_event, EventSink, TaskEventKind};
use crate::core::id_pool::{IdPool, TaskId};
use crate::core::registry::{HandleRegistry, TaskHandle, TaskKind};
use crate::core::{AppResult, SchedulerError};
use crate::runtime::{ExecPool, ObserverPool};

/// Type-erased one-shot work item. Callable values arrive rendered through
/// `Debug`; runnables produce no detail.
type OnceWork = Box<dyn FnOnce() -> AppResult<Option<String>> + Send + 'static>;

/// Type-erased repeating work item, shared across firings.
type RateWork = Arc<dyn Fn() -> AppResult<Option<String>> + Send + Sync + 'static>;

type SharedSink = Arc<Mutex<Box<dyn EventSink>>>;

/// Join result of one fired unit of a repeating series.
type FiredResult = (u64, Result<AppResult<Option<String>>, JoinError>);

/// Task scheduling facade.
///
/// Owns a compute pool, a blocking pool, an observation pool (unless an
/// external runtime was supplied at build time), the identifier allocator,
/// and the registry of live cancellation handles. All operations take
/// `&self` and are safe to call from any thread.
pub struct Scheduler {
    name: String,
    ids: Arc<IdPool>,
    registry: Arc<HandleRegistry>,
    compute: ExecPool,
    blocking: ExecPool,
    observer: ObserverPool,
    events: Option<SharedSink>,
    shut_down: AtomicBool,
}

impl Scheduler {
    /// Build a scheduler from `config` with an owned observation pool and
    /// no event sink. Use [`SchedulerBuilder`] for overrides.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new(config).build()
    }

    pub(crate) fn from_parts(
        name: String,
        ids: IdPool,
        compute: ExecPool,
        blocking: ExecPool,
        observer: ObserverPool,
        events: Option<Box<dyn EventSink>>,
    ) -> Self {
        Self {
            name,
            ids: Arc::new(ids),
            registry: Arc::new(HandleRegistry::new()),
            compute,
            blocking,
            observer,
            events: events.map(|sink| Arc::new(Mutex::new(sink))),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Run `work` once after `delay` and trace its value.
    ///
    /// `blocking` routes the work to the blocking pool instead of the
    /// compute pool. The returned identifier cancels the task until it
    /// fires. Fails with [`SchedulerError::IdsExhausted`] under id
    /// pressure, leaving no trace of the attempt.
    pub fn schedule_once_call<F, T>(
        &self,
        delay: Duration,
        blocking: bool,
        work: F,
    ) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce() -> AppResult<T> + Send + 'static,
        T: fmt::Debug,
    {
        self.schedule_once(
            delay,
            blocking,
            Box::new(move || work().map(|value| Some(format!("{value:?}")))),
        )
    }

    /// Run `work` once after `delay`, producing no value.
    pub fn schedule_once_run<F>(
        &self,
        delay: Duration,
        blocking: bool,
        work: F,
    ) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_once(
            delay,
            blocking,
            Box::new(move || {
                work();
                Ok(None)
            }),
        )
    }

    /// Run `work` every `period`, first after `initial_delay`, tracing each
    /// value.
    ///
    /// Ticks are never skipped or coalesced; a slow firing does not delay
    /// the next one, so firings of one series may overlap. Per-item
    /// outcomes are still observed in fire order. The series ends when a
    /// firing errors or panics, or when the caller cancels the returned
    /// identifier.
    pub fn schedule_fixed_rate_call<F, T>(
        &self,
        initial_delay: Duration,
        period: Duration,
        blocking: bool,
        work: F,
    ) -> Result<TaskId, SchedulerError>
    where
        F: Fn() -> AppResult<T> + Send + Sync + 'static,
        T: fmt::Debug,
    {
        self.schedule_fixed_rate(
            initial_delay,
            period,
            blocking,
            Arc::new(move || work().map(|value| Some(format!("{value:?}")))),
        )
    }

    /// Run `work` every `period`, first after `initial_delay`, producing
    /// no values.
    pub fn schedule_fixed_rate_run<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        blocking: bool,
        work: F,
    ) -> Result<TaskId, SchedulerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.schedule_fixed_rate(
            initial_delay,
            period,
            blocking,
            Arc::new(move || {
                work();
                Ok(None)
            }),
        )
    }

    fn schedule_once(
        &self,
        delay: Duration,
        blocking: bool,
        work: OnceWork,
    ) -> Result<TaskId, SchedulerError> {
        self.ensure_running()?;
        let id = self.ids.acquire()?;
        let fire_at = Instant::now() + delay;
        let finalized = Arc::new(AtomicBool::new(false));
        let ctx = self.task_ctx(id, Arc::clone(&finalized));
        let (ready_tx, ready_rx) = oneshot::channel::<()>();

        let driver = async move {
            // Hold until the handle is registered; a cancel racing with
            // registration aborts us right here.
            if ready_rx.await.is_err() {
                return;
            }
            sleep_until(fire_at).await;
            let joined = tokio::spawn(async move { work() }).await;
            match joined {
                Ok(Ok(detail)) => ctx.spawn_final(0, ItemOutcome::Success(detail)),
                Ok(Err(err)) => ctx.spawn_final(0, ItemOutcome::Error(format!("{err:#}"))),
                Err(join_err) => ctx.spawn_final(0, ItemOutcome::Error(panic_detail(join_err))),
            }
        };

        let join = self.pool_for(blocking).spawn(driver);
        self.registry
            .insert(id, TaskHandle::new(join.abort_handle(), finalized, TaskKind::Once));
        self.record_event(id, TaskEventKind::Scheduled, 0, None);
        debug!(
            "scheduler `{}` scheduled once task {} (delay {:?}, blocking {})",
            self.name, id, delay, blocking
        );
        let _ = ready_tx.send(());
        Ok(id)
    }

    fn schedule_fixed_rate(
        &self,
        initial_delay: Duration,
        period: Duration,
        blocking: bool,
        work: RateWork,
    ) -> Result<TaskId, SchedulerError> {
        self.ensure_running()?;
        // tokio intervals reject a zero period; treat it as "as fast as
        // the timer allows".
        let period = if period.is_zero() {
            warn!("scheduler `{}` clamping zero period to 1ms", self.name);
            Duration::from_millis(1)
        } else {
            period
        };
        let id = self.ids.acquire()?;
        let start = Instant::now() + initial_delay;
        let finalized = Arc::new(AtomicBool::new(false));
        let ctx = self.task_ctx(id, Arc::clone(&finalized));
        let (ready_tx, ready_rx) = oneshot::channel::<()>();

        let driver = async move {
            if ready_rx.await.is_err() {
                return;
            }
            let mut ticker = interval_at(start, period);
            let mut inflight: JoinSet<FiredResult> = JoinSet::new();
            let mut seq: u64 = 0;
            // Firings complete in any order, but outcomes must reach the
            // observer in fire order: a result is held here until every
            // earlier firing has been delivered.
            let mut held: BTreeMap<u64, Result<AppResult<Option<String>>, JoinError>> =
                BTreeMap::new();
            let mut next_delivery: u64 = 0;
            'driver: loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let work = Arc::clone(&work);
                        let fired = seq;
                        seq += 1;
                        // Each firing runs as its own task so a slow one
                        // cannot hold up the ticker.
                        inflight.spawn(async move {
                            (fired, tokio::spawn(async move { work() }).await)
                        });
                    }
                    Some(joined) = inflight.join_next() => {
                        // collector tasks are never aborted while we poll
                        let Ok((fired, result)) = joined else {
                            continue 'driver;
                        };
                        held.insert(fired, result);
                        while let Some(result) = held.remove(&next_delivery) {
                            let fired = next_delivery;
                            next_delivery += 1;
                            match result {
                                Ok(Ok(detail)) => ctx.spawn_item(fired, detail),
                                Ok(Err(err)) => {
                                    ctx.spawn_final(
                                        fired,
                                        ItemOutcome::Error(format!("{err:#}")),
                                    );
                                    break 'driver;
                                }
                                Err(join_err) => {
                                    ctx.spawn_final(
                                        fired,
                                        ItemOutcome::Error(panic_detail(join_err)),
                                    );
                                    break 'driver;
                                }
                            }
                        }
                    }
                }
            }
            // leaving the loop drops the join set, aborting firings still
            // in flight
        };

        let join = self.pool_for(blocking).spawn(driver);
        self.registry.insert(
            id,
            TaskHandle::new(join.abort_handle(), finalized, TaskKind::FixedRate),
        );
        self.record_event(id, TaskEventKind::Scheduled, 0, None);
        debug!(
            "scheduler `{}` scheduled fixed-rate task {} (initial {:?}, period {:?}, blocking {})",
            self.name, id, initial_delay, period, blocking
        );
        let _ = ready_tx.send(());
        Ok(id)
    }

    /// Cancel the operation registered under `id`.
    ///
    /// Returns `true` when this call stopped the operation and recycled
    /// its identifier. Returns `false` for unknown or already finalized
    /// ids; completion races make that a normal outcome, not an error.
    pub fn cancel(&self, id: TaskId) -> bool {
        let Some(handle) = self.registry.remove(id) else {
            trace!("scheduler `{}` cancel {}: no live handle", self.name, id);
            return false;
        };
        if handle.finalized().swap(true, Ordering::AcqRel) {
            // the completion path won the finalize between our remove and
            // here; it releases the id
            return false;
        }
        handle.dispose();
        self.ids.release(id);
        self.record_event(id, TaskEventKind::Cancelled, 0, None);
        info!(
            "scheduler `{}` task {} cancelled ({:?})",
            self.name,
            id,
            handle.kind()
        );
        true
    }

    /// Stop all owned pools and stop accepting work.
    ///
    /// Outstanding operations are abandoned along with their identifiers;
    /// process teardown reclaims them. Subsequent `schedule_*` calls fail
    /// with [`SchedulerError::ShutDown`]. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(
            "scheduler `{}` shutting down, abandoning {} live handles",
            self.name,
            self.registry.len()
        );
        self.compute.shutdown();
        self.blocking.shutdown();
        self.observer.shutdown();
    }

    /// Scheduler name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live cancellation handles.
    pub fn live_handle_count(&self) -> usize {
        self.registry.len()
    }

    /// Identifiers sitting unused in the allocator.
    pub fn pool_size(&self) -> usize {
        self.ids.pool_size()
    }

    /// Identifiers currently issued.
    pub fn in_use_count(&self) -> usize {
        self.ids.in_use_count()
    }

    /// Handle onto the compute pool.
    pub fn compute_handle(&self) -> Handle {
        self.compute.handle()
    }

    /// Handle onto the blocking pool.
    pub fn blocking_handle(&self) -> Handle {
        self.blocking.handle()
    }

    /// Handle onto the observation pool.
    pub fn observer_handle(&self) -> Handle {
        self.observer.handle()
    }

    fn ensure_running(&self) -> Result<(), SchedulerError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(SchedulerError::ShutDown(self.name.clone()));
        }
        Ok(())
    }

    fn pool_for(&self, blocking: bool) -> &ExecPool {
        if blocking {
            &self.blocking
        } else {
            &self.compute
        }
    }

    fn task_ctx(&self, id: TaskId, finalized: Arc<AtomicBool>) -> TaskCtx {
        TaskCtx {
            id,
            scheduler: self.name.clone(),
            ids: Arc::clone(&self.ids),
            registry: Arc::clone(&self.registry),
            finalized,
            observer: self.observer.handle(),
            events: self.events.clone(),
        }
    }

    fn record_event(&self, id: TaskId, kind: TaskEventKind, seq: u64, detail: Option<String>) {
        if let Some(sink) = &self.events {
            sink.lock().record(build_task_event(id, kind, seq, detail));
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.name)
            .field("live_handles", &self.registry.len())
            .field("ids_in_use", &self.ids.in_use_count())
            .field("ids_pooled", &self.ids.pool_size())
            .field("shut_down", &self.shut_down.load(Ordering::Acquire))
            .finish()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            debug!("scheduler `{}` dropped without explicit shutdown", self.name);
            self.compute.shutdown();
            self.blocking.shutdown();
            self.observer.shutdown();
        }
    }
}

/// Outcome of one fired unit of work.
enum ItemOutcome {
    /// The work produced a value rendering, or ran to completion.
    Success(Option<String>),
    /// The work errored or panicked; the rendering explains it.
    Error(String),
}

/// Per-task context shared between a driver and its observation hand-offs.
#[derive(Clone)]
struct TaskCtx {
    id: TaskId,
    scheduler: String,
    ids: Arc<IdPool>,
    registry: Arc<HandleRegistry>,
    finalized: Arc<AtomicBool>,
    observer: Handle,
    events: Option<SharedSink>,
}

impl TaskCtx {
    /// Deliver one success item of a repeating series on the observation
    /// pool; the series continues.
    fn spawn_item(&self, seq: u64, detail: Option<String>) {
        let ctx = self.clone();
        self.observer.spawn(async move {
            ctx.observe_item(seq, detail);
        });
    }

    /// Deliver a terminal outcome on the observation pool.
    fn spawn_final(&self, seq: u64, outcome: ItemOutcome) {
        let ctx = self.clone();
        self.observer.spawn(async move {
            ctx.observe_final(seq, outcome);
        });
    }

    fn observe_item(&self, seq: u64, detail: Option<String>) {
        if let Some(value) = &detail {
            info!(
                "scheduler `{}` task {} fired #{}: {}",
                self.scheduler, self.id, seq, value
            );
        } else {
            trace!(
                "scheduler `{}` task {} fired #{}",
                self.scheduler,
                self.id,
                seq
            );
        }
        self.record(TaskEventKind::Succeeded, seq, detail);
    }

    fn observe_final(&self, seq: u64, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Success(detail) => {
                if let Some(value) = &detail {
                    info!(
                        "scheduler `{}` task {} produced {}",
                        self.scheduler, self.id, value
                    );
                } else {
                    info!("scheduler `{}` task {} ran", self.scheduler, self.id);
                }
                self.record(TaskEventKind::Succeeded, seq, detail);
                self.record(TaskEventKind::Completed, seq, None);
            }
            ItemOutcome::Error(detail) => {
                error!(
                    "scheduler `{}` task {} failed: {}",
                    self.scheduler, self.id, detail
                );
                self.record(TaskEventKind::Failed, seq, Some(detail));
            }
        }
        if self.finalize() {
            trace!("scheduler `{}` task {} finalized", self.scheduler, self.id);
        }
    }

    /// Drop the live handle and return the id to the pool.
    ///
    /// The shared flag arbitrates between this path and `cancel`: only the
    /// side that swaps it first proceeds, so the release happens exactly
    /// once. The registry removal is token-checked, so a late callback
    /// cannot evict a successor operation that reacquired the id.
    fn finalize(&self) -> bool {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(handle) = self.registry.remove_matching(self.id, &self.finalized) {
            handle.dispose();
        }
        self.ids.release(self.id);
        true
    }

    fn record(&self, kind: TaskEventKind, seq: u64, detail: Option<String>) {
        if let Some(sink) = &self.events {
            sink.lock().record(build_task_event(self.id, kind, seq, detail));
        }
    }
}

/// Render a join failure: panics carry their payload message when it is a
/// string, cancellations fall back to the join error itself.
fn panic_detail(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "opaque panic payload".into());
            format!("work panicked: {msg}")
        }
        Err(err) => format!("work not completed: {err}"),
    }
}
