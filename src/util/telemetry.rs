//! Tracing bootstrap for embedding applications and tests.

use tracing_subscriber::EnvFilter;

/// Install an env-filtered fmt subscriber for the scheduler.
///
/// Respects `RUST_LOG`, defaulting to `info` when unset. Does nothing when
/// a global subscriber is already installed, so embedding applications keep
/// their own telemetry and repeated calls from tests are harmless.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
