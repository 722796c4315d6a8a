//! Timestamp parsing and formatting helpers.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Outcome of reading a timestamp supplied by seed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTime {
    Missing,
    Valid(DateTime<Utc>),
    Malformed,
}

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Reads RFC 3339, zone-less ISO 8601 (taken as UTC), or epoch seconds.
///
/// Blank input counts as missing, not malformed.
pub fn parse_seed_time(raw: &str) -> ParsedTime {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedTime::Missing;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return ParsedTime::Valid(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return ParsedTime::Valid(naive.and_utc());
        }
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        if let Some(at) = trimmed
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        {
            return ParsedTime::Valid(at);
        }
    }
    ParsedTime::Malformed
}

/// `2025-01-01T09:30:00Z`
pub fn iso_seconds(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn unix_seconds(at: DateTime<Utc>) -> i64 {
    at.timestamp()
}

/// `2025-01-01`
pub fn date_only(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}
