//! Time utilities for Sandloop

use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in milliseconds.
///
/// # Panics
/// Panics if the system time is before the Unix epoch, which would indicate
/// a severely misconfigured system.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX epoch")
        .as_millis() as u64
}

/// Elapsed seconds since a millisecond timestamp.
///
/// Returns 0.0 if the given time is in the future.
pub fn elapsed_secs(since_millis: u64) -> f64 {
    now_millis().saturating_sub(since_millis) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_positive() {
        assert!(now_millis() > 0);
    }

    #[test]
    fn test_elapsed_secs_future_time() {
        let future = now_millis() + 1_000_000;
        assert_eq!(elapsed_secs(future), 0.0);
    }
}
