//! Task lifecycle event sinks.
//!
//! Every scheduled operation reports its lifecycle (scheduled, per-item
//! success, failure, completion, cancellation) to an optional sink. The
//! in-memory sink covers tests and dev tooling; applications wanting the
//! stream elsewhere implement [`EventSink`] themselves.

use std::collections::VecDeque;

use crate::core::TaskId;
use crate::util::clock::now_ms;

/// Lifecycle stages a scheduled operation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEventKind {
    /// Handle registered and work submitted to a pool.
    Scheduled,
    /// One unit of work produced its value (or ran to completion).
    Succeeded,
    /// One unit of work errored or panicked; terminal for its operation.
    Failed,
    /// The operation delivered everything it will ever deliver.
    Completed,
    /// The operation was cancelled by the caller.
    Cancelled,
}

/// One recorded lifecycle event.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    /// Identifier of the operation.
    pub id: TaskId,
    /// Lifecycle stage.
    pub kind: TaskEventKind,
    /// Firing index within a repeating series; 0 for one-shot work.
    pub seq: u64,
    /// Rendered value, error chain, or other context.
    pub detail: Option<String>,
    /// Wall-clock milliseconds when the event was recorded.
    pub at_ms: u128,
}

/// Event sink abstraction.
pub trait EventSink: Send {
    /// Record one lifecycle event.
    fn record(&mut self, event: TaskEvent);
}

/// In-memory event sink for testing and dev, oldest events evicted first.
pub struct InMemoryEventSink {
    events: VecDeque<TaskEvent>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a sink keeping at most `max_events`.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.iter().cloned().collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&mut self, event: TaskEvent) {
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Build an event stamped with the current wall clock.
pub fn build_task_event(
    id: TaskId,
    kind: TaskEventKind,
    seq: u64,
    detail: Option<String>,
) -> TaskEvent {
    TaskEvent {
        id,
        kind,
        seq,
        detail,
        at_ms: now_ms(),
    }
}
