//! Timestamp utilities

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Timestamp shapes accepted as ISO-8601 in published files
static ISO8601_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$",
        r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$",
        r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[+-]\d{2}:\d{2}$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a UTC timestamp as ISO-8601 with second precision (`YYYY-MM-DDTHH:MM:SSZ`)
pub fn to_iso_seconds(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a calendar date as midnight UTC (`YYYY-MM-DDT00:00:00Z`)
pub fn date_to_iso_midnight(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

/// True when `value` matches one of the accepted ISO-8601 timestamp shapes
pub fn is_iso8601(value: &str) -> bool {
    ISO8601_PATTERNS.iter().any(|re| re.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_to_iso_seconds_drops_subseconds() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 1, 13, 5, 9).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(to_iso_seconds(&ts), "2024-12-01T13:05:09Z");
    }

    #[test]
    fn test_date_to_iso_midnight() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(date_to_iso_midnight(date), "2024-02-29T00:00:00Z");
    }

    #[test]
    fn test_is_iso8601_shapes() {
        assert!(is_iso8601("2024-12-01T00:00:00Z"));
        assert!(is_iso8601("2024-12-01T00:00:00.123Z"));
        assert!(is_iso8601("2024-12-01T00:00:00+02:00"));
        assert!(!is_iso8601("2024-12-01"));
        assert!(!is_iso8601("12/01/2024"));
        assert!(!is_iso8601("2024-12-01T00:00:00"));
    }
}
