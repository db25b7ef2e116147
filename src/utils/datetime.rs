//! Timestamp parsing and formatting helpers.
//!
//! Storage columns hold ISO-8601 text. The parser is lenient on the read path:
//! offset-aware values (including the trailing `Z`) are normalized to naive
//! UTC, and a couple of legacy layouts are accepted as fallbacks. Unparsable
//! values become `None` with a logged warning instead of failing the row.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse an ISO-8601-ish timestamp string into naive UTC.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }

    None
}

/// Read-path wrapper that logs the field name when a value cannot be parsed.
pub fn parse_db_datetime(field: &str, value: &str) -> Option<NaiveDateTime> {
    let parsed = parse_datetime(value);
    if parsed.is_none() && !value.trim().is_empty() {
        tracing::warn!("Unparsable {} value '{}', replacing with None", field, value);
    }
    parsed
}

/// Serialize a naive UTC timestamp for storage.
pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Current time as naive UTC, the single timestamp discipline of the crate.
pub fn now_naive() -> NaiveDateTime {
    Utc::now().naive_utc()
}
