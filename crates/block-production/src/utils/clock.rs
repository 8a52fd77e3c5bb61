//! Wall-clock helpers

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch. A clock before the epoch reads as zero.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
