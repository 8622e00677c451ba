//! Configuration models for the scheduler and its pools.

pub mod scheduler;

pub use scheduler::{IdPoolConfig, SchedulerConfig};
