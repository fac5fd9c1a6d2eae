//! Windows FILETIME conversion.
//!
//! A FILETIME counts 100-nanosecond ticks since 1601-01-01T00:00:00Z.

use chrono::{DateTime, Datelike, TimeZone, Utc};

/// Seconds between the FILETIME epoch (1601) and the Unix epoch (1970)
pub const FILETIME_UNIX_EPOCH_DIFF: i64 = 11_644_473_600;

/// FILETIME ticks per second
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Returned in place of a timestamp that is unset or cannot be rendered
pub const INVALID_TIMESTAMP: &str = "";

/// Converts a FILETIME to a UTC datetime.
///
/// Returns `None` for zero (the "unset" value) and for anything past year 9999,
/// which ISO-8601 cannot express without an extended year.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    if filetime == 0 {
        return None;
    }
    let secs = (filetime / TICKS_PER_SECOND) as i64 - FILETIME_UNIX_EPOCH_DIFF;
    let nanos = ((filetime % TICKS_PER_SECOND) * 100) as u32;
    let datetime = Utc.timestamp_opt(secs, nanos).single()?;
    (datetime.year() <= 9999).then_some(datetime)
}

/// Converts a FILETIME to an ISO-8601 string such as `2024-01-01T00:00:00Z`.
///
/// Sub-second ticks are dropped. Unrepresentable input yields [`INVALID_TIMESTAMP`].
pub fn filetime_to_iso8601(filetime: u64) -> String {
    match filetime_to_datetime(filetime) {
        Some(datetime) => datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => INVALID_TIMESTAMP.to_string(),
    }
}
