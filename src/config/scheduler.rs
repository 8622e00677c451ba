//! Scheduler and allocator configuration structures.

use serde::{Deserialize, Serialize};

use crate::core::id_pool::{DEFAULT_INCREMENT, DEFAULT_MAX_ID};

/// Identifier allocator sizing.
///
/// A pair the allocator rejects (zero on either side, or
/// `increment * 2 > max_id`) is not a validation error here; the allocator
/// substitutes its defaults at construction and logs the substitution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdPoolConfig {
    /// Identifiers minted per refill.
    pub increment: u32,
    /// Upper bound of the identifier space.
    pub max_id: u32,
}

impl Default for IdPoolConfig {
    fn default() -> Self {
        Self {
            increment: DEFAULT_INCREMENT,
            max_id: DEFAULT_MAX_ID,
        }
    }
}

fn default_compute_threads() -> usize {
    num_cpus::get()
}

fn default_blocking_threads() -> usize {
    num_cpus::get() * 2
}

fn default_observer_threads() -> usize {
    1
}

/// Root scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scheduler name; prefixes pool and worker thread names.
    pub name: String,
    /// Identifier allocator sizing.
    #[serde(default)]
    pub id_pool: IdPoolConfig,
    /// Workers on the non-blocking compute pool.
    #[serde(default = "default_compute_threads")]
    pub compute_threads: usize,
    /// Workers on the blocking/IO pool.
    #[serde(default = "default_blocking_threads")]
    pub blocking_threads: usize,
    /// Workers on the observation pool. The default of one keeps outcome
    /// notifications serialized.
    #[serde(default = "default_observer_threads")]
    pub observer_threads: usize,
}

impl SchedulerConfig {
    /// Configuration named `name` with default sizing: compute workers per
    /// CPU, twice that for blocking work, one observer worker.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_pool: IdPoolConfig::default(),
            compute_threads: default_compute_threads(),
            blocking_threads: default_blocking_threads(),
            observer_threads: default_observer_threads(),
        }
    }

    /// Set allocator increment and max id.
    pub fn with_id_pool(mut self, increment: u32, max_id: u32) -> Self {
        self.id_pool = IdPoolConfig { increment, max_id };
        self
    }

    /// Set the compute pool worker count.
    pub fn with_compute_threads(mut self, count: usize) -> Self {
        self.compute_threads = count;
        self
    }

    /// Set the blocking pool worker count.
    pub fn with_blocking_threads(mut self, count: usize) -> Self {
        self.blocking_threads = count;
        self
    }

    /// Set the observation pool worker count.
    pub fn with_observer_threads(mut self, count: usize) -> Self {
        self.observer_threads = count;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.compute_threads == 0 {
            return Err("compute_threads must be greater than 0".into());
        }
        if self.blocking_threads == 0 {
            return Err("blocking_threads must be greater than 0".into());
        }
        if self.observer_threads == 0 {
            return Err("observer_threads must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment, reading `.env` if present.
    ///
    /// Recognized variables: `CHRONOPOOL_NAME`, `CHRONOPOOL_ID_INCREMENT`,
    /// `CHRONOPOOL_ID_MAX`, `CHRONOPOOL_COMPUTE_THREADS`,
    /// `CHRONOPOOL_BLOCKING_THREADS`, `CHRONOPOOL_OBSERVER_THREADS`.
    /// Unset variables keep their defaults; unparsable values are rejected.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        let name = std::env::var("CHRONOPOOL_NAME").unwrap_or_else(|_| "chronopool".into());
        let mut cfg = Self::new(name);
        if let Some(v) = read_env("CHRONOPOOL_ID_INCREMENT")? {
            cfg.id_pool.increment = v;
        }
        if let Some(v) = read_env("CHRONOPOOL_ID_MAX")? {
            cfg.id_pool.max_id = v;
        }
        if let Some(v) = read_env("CHRONOPOOL_COMPUTE_THREADS")? {
            cfg.compute_threads = v;
        }
        if let Some(v) = read_env("CHRONOPOOL_BLOCKING_THREADS")? {
            cfg.blocking_threads = v;
        }
        if let Some(v) = read_env("CHRONOPOOL_OBSERVER_THREADS")? {
            cfg.observer_threads = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Read and parse one environment variable; absent is `None`, unparsable
/// is an error naming the variable.
fn read_env<T>(key: &str) -> Result<Option<T>, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("{key}: {e}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_cpu_defaults() {
        let cfg = SchedulerConfig::new("sched");
        assert_eq!(cfg.name, "sched");
        assert_eq!(cfg.id_pool.increment, DEFAULT_INCREMENT);
        assert_eq!(cfg.id_pool.max_id, DEFAULT_MAX_ID);
        assert!(cfg.compute_threads >= 1);
        assert_eq!(cfg.blocking_threads, cfg.compute_threads * 2);
        assert_eq!(cfg.observer_threads, 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_fluent_setters() {
        let cfg = SchedulerConfig::new("sched")
            .with_id_pool(10, 200)
            .with_compute_threads(3)
            .with_blocking_threads(6)
            .with_observer_threads(2);
        assert_eq!(cfg.id_pool.increment, 10);
        assert_eq!(cfg.id_pool.max_id, 200);
        assert_eq!(cfg.compute_threads, 3);
        assert_eq!(cfg.blocking_threads, 6);
        assert_eq!(cfg.observer_threads, 2);
    }

    #[test]
    fn test_validate_rejects_empty_name_and_zero_threads() {
        assert!(SchedulerConfig::new("  ").validate().is_err());
        assert!(SchedulerConfig::new("s")
            .with_compute_threads(0)
            .validate()
            .is_err());
        assert!(SchedulerConfig::new("s")
            .with_blocking_threads(0)
            .validate()
            .is_err());
        assert!(SchedulerConfig::new("s")
            .with_observer_threads(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let cfg = SchedulerConfig::from_json_str(r#"{"name":"json-sched"}"#).unwrap();
        assert_eq!(cfg.name, "json-sched");
        assert_eq!(cfg.id_pool.increment, DEFAULT_INCREMENT);
        assert_eq!(cfg.observer_threads, 1);

        let cfg = SchedulerConfig::from_json_str(
            r#"{"name":"json-sched","id_pool":{"increment":5,"max_id":10},"observer_threads":2}"#,
        )
        .unwrap();
        assert_eq!(cfg.id_pool.increment, 5);
        assert_eq!(cfg.id_pool.max_id, 10);
        assert_eq!(cfg.observer_threads, 2);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(SchedulerConfig::from_json_str("not json").is_err());
        assert!(SchedulerConfig::from_json_str(r#"{"name":""}"#).is_err());
    }

    #[test]
    fn test_from_env_reads_overrides() {
        std::env::set_var("CHRONOPOOL_NAME", "env-sched");
        std::env::set_var("CHRONOPOOL_ID_INCREMENT", "7");
        std::env::set_var("CHRONOPOOL_ID_MAX", "14");
        let cfg = SchedulerConfig::from_env().unwrap();
        assert_eq!(cfg.name, "env-sched");
        assert_eq!(cfg.id_pool.increment, 7);
        assert_eq!(cfg.id_pool.max_id, 14);

        std::env::set_var("CHRONOPOOL_ID_INCREMENT", "not-a-number");
        assert!(SchedulerConfig::from_env().is_err());

        std::env::remove_var("CHRONOPOOL_NAME");
        std::env::remove_var("CHRONOPOOL_ID_INCREMENT");
        std::env::remove_var("CHRONOPOOL_ID_MAX");
    }
}
