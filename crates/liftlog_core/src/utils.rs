//! Utility functions for date parsing, name normalization and rounding.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

/// Parse the `Date` cell of an export into a calendar date and, when
/// present, a time of day.
///
/// Accepts:
/// - YYYY-MM-DD HH:MM:SS (Strong's native format)
/// - YYYY-MM-DD HH:MM
/// - YYYY-MM-DDTHH:MM:SS
/// - RFC3339 datetime (offset is dropped, local wall time is kept)
/// - YYYY-MM-DD
/// - DD/MM/YYYY
pub fn parse_export_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parse a user supplied `YYYY-MM-DD` date (filters, tool parameters).
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Lowercase, trim and collapse runs of whitespace to a single space.
///
/// This is the lookup key for exercise names everywhere in the crate.
pub fn normalize_exercise_key(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

static DURATION_PART: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(min|h|m|s)").ok());

/// Parse a workout duration cell: plain seconds (`3900`, `3900.0`) or the
/// textual form used by Strong, spaced or compact (`1h 5m`, `1h5m`, `45m`,
/// `30s`). Anything besides number/unit pairs and whitespace is rejected.
pub fn parse_duration_secs(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }
    let pattern = DURATION_PART.as_ref()?;
    let mut total = 0.0;
    let mut matched = false;
    let mut cursor = 0;
    for caps in pattern.captures_iter(s) {
        let whole = caps.get(0)?;
        if !s[cursor..whole.start()].trim().is_empty() {
            return None;
        }
        cursor = whole.end();
        let value: f64 = caps[1].parse().ok()?;
        let factor = match caps[2].to_ascii_lowercase().as_str() {
            "h" => 3600.0,
            "m" | "min" => 60.0,
            _ => 1.0,
        };
        total += value * factor;
        matched = true;
    }
    (matched && s[cursor..].trim().is_empty()).then_some(total)
}

/// Round to two decimals for presentation-facing numbers.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
