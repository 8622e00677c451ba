//! Execution pool runtime adapters.

pub mod exec_pool;

pub use exec_pool::{ExecPool, ObserverPool};
