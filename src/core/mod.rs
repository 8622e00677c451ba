//! Core scheduling abstractions and identifier accounting.

pub mod error;
pub mod events;
pub mod id_pool;
pub mod registry;
pub mod scheduler;

pub use error::{AppResult, SchedulerError};
pub use events::{build_task_event, EventSink, InMemoryEventSink, TaskEvent, TaskEventKind};
pub use id_pool::{IdPool, TaskId, DEFAULT_INCREMENT, DEFAULT_MAX_ID};
pub use registry::{HandleRegistry, TaskHandle, TaskKind};
pub use scheduler::Scheduler;
