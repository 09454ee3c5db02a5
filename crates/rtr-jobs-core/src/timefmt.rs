//! Timestamp layouts shared by stored records.

use chrono::{DateTime, Duration, Utc};

use crate::error::CoreError;

/// Second-precision UTC layout used by execution records and FQL bounds.
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn format_iso(t: DateTime<Utc>) -> String {
    t.format(ISO_FORMAT).to_string()
}

/// Parse an RFC 3339 timestamp (`Z` or `±hh:mm` offset) into UTC.
pub fn parse_iso(value: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoreError::timestamp(value, e.to_string()))
}

/// Parse an optional bound; blank means unset.
pub fn parse_optional(value: &str) -> Result<Option<DateTime<Utc>>, CoreError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse_iso(value).map(Some)
}

/// Render an elapsed time as `HH:MM:SS`, folding whole days into the hours.
/// Negative spans render as zero.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
