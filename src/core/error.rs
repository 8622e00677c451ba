//! Error types for scheduler and allocator operations.

use thiserror::Error;

/// Errors produced by the scheduling facade and its identifier allocator.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The identifier space is fully saturated; no id can be produced.
    #[error("no ids available in `{name}`: {in_use} in use, {available} pooled, max {max_id}")]
    IdsExhausted {
        /// Allocator name.
        name: String,
        /// Identifiers currently issued.
        in_use: usize,
        /// Identifiers sitting unused in the pool.
        available: usize,
        /// Upper bound of the identifier space.
        max_id: u32,
    },
    /// The facade has been shut down and accepts no further work.
    #[error("scheduler `{0}` is shut down")]
    ShutDown(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An execution pool could not be started.
    #[error("pool build failed: {0}")]
    PoolBuild(String),
}

/// Application-facing result using anyhow for scheduled work items.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_display_carries_counts() {
        let err = SchedulerError::IdsExhausted {
            name: "sched".into(),
            in_use: 10,
            available: 0,
            max_id: 10,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("no ids available in `sched`"));
        assert!(rendered.contains("10 in use"));
        assert!(rendered.contains("0 pooled"));
        assert!(rendered.contains("max 10"));
    }

    #[test]
    fn test_shutdown_display_names_scheduler() {
        let err = SchedulerError::ShutDown("sched".into());
        assert_eq!(err.to_string(), "scheduler `sched` is shut down");
    }
}
