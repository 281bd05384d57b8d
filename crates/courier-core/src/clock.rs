//! Wall-clock helper shared by status records and outbound messages.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in seconds.
#[must_use]
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
