//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. Returns 0 if the system clock is set
/// before the epoch.
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Milliseconds elapsed between `since_ms` and `now_ms`, saturating at zero
/// when the clock went backwards.
pub fn elapsed_ms(since_ms: u128, now_ms: u128) -> u128 {
    now_ms.saturating_sub(since_ms)
}
