//! Wall-clock helpers for event timestamping.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// A clock set before the epoch yields 0 rather than failing; timestamps
/// here are diagnostic, never load-bearing.
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        // Sanity: later than 2020-01-01.
        assert!(a > 1_577_836_800_000);
    }
}
