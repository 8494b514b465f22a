//! Millisecond timestamps and the time windows used throughout the system.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. Every timestamp that crosses a crate
/// boundary in this workspace uses this representation.
pub type Timestamp = u64;

/// One second, in milliseconds.
pub const MS_SECOND: u64 = 1000;
/// One minute, in milliseconds.
pub const MS_MINUTE: u64 = 60 * MS_SECOND;
/// One hour, in milliseconds.
pub const MS_HOUR: u64 = 60 * MS_MINUTE;
/// One day, in milliseconds.
pub const MS_DAY: u64 = 24 * MS_HOUR;
/// One week, in milliseconds.
pub const MS_WEEK: u64 = 7 * MS_DAY;
/// One month (30 days), in milliseconds.
pub const MS_MONTH: u64 = 30 * MS_DAY;
/// One year (365 days), in milliseconds.
pub const MS_YEAR: u64 = 365 * MS_DAY;

/// The longest window any limit may cover; events older than this are
/// eligible for pruning from a signer's ledger.
pub const MAX_WINDOW_MS: u64 = MS_YEAR;

/// The widest acceptable gap between a message's embedded timestamp and the
/// receiver's clock. Messages outside this window are rejected outright,
/// which also bounds how long a captured message stays replayable.
pub const MAX_TIMESTAMP_SKEW_MS: u64 = 5 * MS_MINUTE;

/// Returns the current time as a [`Timestamp`].
pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock predates the Unix epoch")
        .as_millis() as u64
}

/// Check that `timestamp` is within [`MAX_TIMESTAMP_SKEW_MS`] of `now`, in
/// either direction.
pub fn is_fresh(timestamp: Timestamp, now: Timestamp) -> bool {
    now.abs_diff(timestamp) <= MAX_TIMESTAMP_SKEW_MS
}
