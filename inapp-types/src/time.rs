//! Millisecond timestamps and ISO 8601 parsing.
//!
//! Schedules and remote payloads carry times as milliseconds since the Unix
//! epoch. `UNSET_TIME` marks an absent start or end.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Sentinel for "no start" / "no end" / "not yet initialized".
pub const UNSET_TIME: i64 = -1;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses an ISO 8601 timestamp into epoch milliseconds.
///
/// Timestamps without an offset are interpreted as UTC. A bare date
/// (`2024-01-31`) resolves to midnight UTC.
pub fn parse_iso8601(value: &str) -> Result<i64> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp_millis());
    }

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| Error::InvalidTimestamp(value.to_string()))
}

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
