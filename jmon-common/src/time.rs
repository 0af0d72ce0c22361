//! Timestamp and registry date utilities

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a registry date field into a calendar date.
///
/// Accepted shapes, tried in order:
/// 1. `YYYY-MM-DD`
/// 2. anything with a `T` separator, parsed from the date portion before the first `T`
///    (`2024-03-15T00:00:00`, `2024-03-15T10:30:00Z`, ...)
/// 3. a full ISO-8601 timestamp (RFC 3339, or `YYYY-MM-DD HH:MM:SS[.f]`)
///
/// Empty or unparseable input yields `None` and a warning; a malformed date never
/// fails ingestion.
pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }

    if let Some((date_part, _)) = raw.split_once('T') {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            return Some(date);
        }
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }

    if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(timestamp.date());
    }

    warn!(value = %raw, "Could not parse registry date, leaving field unset");
    None
}
