//! # Chronopool
//!
//! Pooled task scheduling with recyclable task identifiers.
//!
//! This library provides a scheduling facade for services that fire delayed
//! and repeating jobs at high churn. Every scheduled operation is keyed by a
//! small integer identifier drawn from a bounded, recyclable pool; the
//! identifier is the cancellation key while the operation is live, and is
//! reissued to later operations once it completes, errors, or is cancelled.
//!
//! ## Core Problem Solved
//!
//! Long-lived agent services schedule and cancel thousands of small jobs,
//! and naive approaches erode under that churn:
//!
//! - **Unbounded Keys**: UUID-style task keys grow cancellation maps without bound
//! - **Executor Bleed**: blocking jobs scheduled next to compute jobs starve the async runtime
//! - **Stalled Workers**: logging and outcome bookkeeping on worker threads delays the next job
//! - **Orphaned Handles**: completed tasks that are never pruned pin memory for the process lifetime
//!
//! ## Key Features
//!
//! - **Recyclable Identifiers**: bounded id space, minted lazily in batches, reissued oldest-first after release
//! - **Dedicated Pools**: separate compute and blocking runtimes, selected per call with a flag
//! - **Observed Outcomes**: values, errors, panics, and completions delivered on a separate observation pool
//! - **Exactly-Once Finalize**: cancellation and completion race safely; each id is released exactly once
//! - **Event Sink**: optional per-task lifecycle records for inspection by tests and tooling
//!
//! ```rust,ignore
//! use chronopool::config::SchedulerConfig;
//! use chronopool::core::Scheduler;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new(
//!     SchedulerConfig::new("app")
//!         .with_id_pool(1_000, 50_000)
//!         .with_compute_threads(4),
//! )?;
//!
//! // Delayed value-producing work on the compute pool.
//! let report = scheduler.schedule_once_call(Duration::from_millis(250), false, || {
//!     Ok::<_, anyhow::Error>("report generated")
//! })?;
//!
//! // Repeating work routed to the blocking pool.
//! let heartbeat = scheduler.schedule_fixed_rate_run(
//!     Duration::ZERO,
//!     Duration::from_secs(5),
//!     true,
//!     || probe_database(),
//! )?;
//!
//! scheduler.cancel(heartbeat);
//! scheduler.cancel(report);
//! scheduler.shutdown();
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - Full integration tests
//! - `README.md` - Comprehensive documentation

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and identifier accounting.
pub mod core;
/// Configuration models for the scheduler and its pools.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Execution pool runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;
