//! Time utilities for probe and command durations

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in milliseconds.
///
/// Returns 0 on a clock set before the Unix epoch.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Milliseconds elapsed since `start`, saturating at `u64::MAX`.
pub fn elapsed_millis(start: Instant) -> u64 {
    duration_millis(start.elapsed())
}

/// Whole milliseconds in a duration, saturating at `u64::MAX`.
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
