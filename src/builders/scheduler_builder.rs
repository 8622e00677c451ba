//! Builders to construct schedulers from configuration.

use tokio::runtime::Handle;
use tracing::info;

use crate::config::SchedulerConfig;
use crate::core::events::EventSink;
use crate::core::id_pool::IdPool;
use crate::core::{Scheduler, SchedulerError};
use crate::runtime::{ExecPool, ObserverPool};

/// Assembles a [`Scheduler`] from configuration plus optional overrides.
///
/// By default the scheduler owns all three pools and records no events.
/// Overrides exist for observing outcomes on an external runtime instead
/// of an owned pool, and for attaching an event sink.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    event_sink: Option<Box<dyn EventSink>>,
    observe_on: Option<Handle>,
}

impl SchedulerBuilder {
    /// Start a builder over `config`.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            event_sink: None,
            observe_on: None,
        }
    }

    /// Record every task lifecycle event into `sink`.
    #[must_use]
    pub fn event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Observe task outcomes on `handle` instead of an owned pool.
    ///
    /// The scheduler will not shut the external runtime down; its owner
    /// keeps that responsibility.
    #[must_use]
    pub fn observe_on(mut self, handle: Handle) -> Self {
        self.observe_on = Some(handle);
        self
    }

    /// Validate the configuration and assemble the scheduler.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        let cfg = self.config;
        cfg.validate().map_err(SchedulerError::InvalidConfig)?;

        let ids = IdPool::new(cfg.name.clone(), cfg.id_pool.increment, cfg.id_pool.max_id);
        let compute = ExecPool::new(format!("{}-compute", cfg.name), cfg.compute_threads)?;
        let blocking = ExecPool::new(format!("{}-blocking", cfg.name), cfg.blocking_threads)?;
        let observer = match self.observe_on {
            Some(handle) => {
                info!(
                    "scheduler `{}` ready: {} compute / {} blocking threads, external observer",
                    cfg.name, cfg.compute_threads, cfg.blocking_threads
                );
                ObserverPool::External(handle)
            }
            None => {
                info!(
                    "scheduler `{}` ready: {} compute / {} blocking / {} observer threads",
                    cfg.name, cfg.compute_threads, cfg.blocking_threads, cfg.observer_threads
                );
                ObserverPool::Owned(ExecPool::new(
                    format!("{}-observer", cfg.name),
                    cfg.observer_threads,
                )?)
            }
        };

        Ok(Scheduler::from_parts(
            cfg.name,
            ids,
            compute,
            blocking,
            observer,
            self.event_sink,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_invalid_config() {
        let cfg = SchedulerConfig::new("   ");
        let err = SchedulerBuilder::new(cfg).build().unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfig(_)));
    }
}
