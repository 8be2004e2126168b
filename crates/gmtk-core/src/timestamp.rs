//! ISO 8601 timestamp helpers.
//!
//! Timestamps are kept as the strings found in the payload so exports
//! reproduce them byte for byte; they are only parsed for comparison.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// The current time in the `2024-01-02T03:04:05.678Z` form.
pub fn now_iso() -> String { Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true) }

/// Milliseconds since the Unix epoch for an RFC 3339 timestamp or a bare
/// `YYYY-MM-DD` date (taken as UTC midnight). `None` if unparseable.
pub fn parse_millis(s: &str) -> Option<i64> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.timestamp_millis());
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc().timestamp_millis())
}
