//! Value parsers for raw tabular cells
//!
//! Every parser accepts arbitrary input (empty cells, `"N/A"`, free text) and
//! resolves it to a typed value or a documented fallback. None of them return
//! errors; a fallback that replaces a non-empty value is logged at warn level.
//!
//! | Parser             | Fallback                                   |
//! |--------------------|--------------------------------------------|
//! | `parse_currency`   | `Some(0.0)`; `None` for the word "Unknown" |
//! | `parse_percentage` | `0.0`                                      |
//! | `parse_date`       | caller-supplied default timestamp          |
//! | `parse_boolean`    | `None`                                     |

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::time::{date_to_iso_midnight, to_iso_seconds};

/// Default `createdAt` used when a pipeline has no better value
pub const DEFAULT_CREATED_AT: &str = "2024-01-01T00:00:00Z";

/// Cell contents treated as "no value" (compared case-insensitively)
const NULL_LIKE: &[&str] = &["n/a", "na", "null", "none", "nan"];

/// Sentinel that must never be coerced into a number
const UNKNOWN: &str = "unknown";

/// Candidate calendar formats, tried in order.
///
/// Each entry pairs a shape check with the chrono pattern. The shape check
/// keeps `%Y` from accepting two-digit years (chrono would read `24` as year 24).
static DATE_FORMATS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").unwrap(), "%m/%d/%Y"),
        (Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").unwrap(), "%Y-%m-%d"),
        (Regex::new(r"^\d{1,2}/\d{1,2}/\d{2}$").unwrap(), "%m/%d/%y"),
        (Regex::new(r"^[A-Za-z]+\.? \d{1,2}, \d{4}$").unwrap(), "%B %d, %Y"),
    ]
});

/// Trim a raw cell and map placeholder content to `None`
///
/// # Examples
///
/// ```
/// use daoip_common::values::clean_value;
///
/// assert_eq!(clean_value("  Acme  "), Some("Acme"));
/// assert_eq!(clean_value("N/A"), None);
/// assert_eq!(clean_value("   "), None);
/// ```
pub fn clean_value(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NULL_LIKE.contains(&trimmed.to_ascii_lowercase().as_str()) {
        None
    } else {
        Some(trimmed)
    }
}

/// Parse a currency amount such as `"$25,000.00"`.
///
/// Everything except digits, `.` and `-` is stripped. An empty or non-numeric
/// residue resolves to `Some(0.0)`. The literal word `"Unknown"` resolves to
/// `None` so that it is written as null, never as a number.
///
/// # Examples
///
/// ```
/// use daoip_common::values::parse_currency;
///
/// assert_eq!(parse_currency("$25,000.00"), Some(25000.0));
/// assert_eq!(parse_currency(""), Some(0.0));
/// assert_eq!(parse_currency("Unknown"), None);
/// ```
pub fn parse_currency(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case(UNKNOWN) {
        return None;
    }

    let residue: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    match residue.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Some(amount),
        _ => {
            if clean_value(trimmed).is_some() {
                warn!(raw = trimmed, "Unparseable currency value, using 0.0");
            }
            Some(0.0)
        }
    }
}

/// Parse a percentage such as `"75%"` or `"12.5"`; `0.0` on failure
pub fn parse_percentage(raw: &str) -> f64 {
    let trimmed = raw.trim();
    match trimmed.trim_end_matches('%').trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            if clean_value(trimmed).is_some() {
                warn!(raw = trimmed, "Unparseable percentage, using 0.0");
            }
            0.0
        }
    }
}

/// Parse a yes/no cell.
///
/// `yes, true, 1, y` map to `true`; `no, false, 0, n` map to `false`
/// (case-insensitive). Anything else is `None`.
pub fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "y" => Some(true),
        "no" | "false" | "0" | "n" => Some(false),
        _ => None,
    }
}

/// Try to normalise a date or timestamp to `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Accepted inputs, in order:
/// 1. RFC 3339 timestamps (any offset, converted to UTC, sub-seconds dropped)
/// 2. Zone-less `YYYY-MM-DDTHH:MM:SS` (assumed UTC)
/// 3. `MM/DD/YYYY`, `YYYY-MM-DD`, `MM/DD/YY`, `Month DD, YYYY` (midnight UTC)
/// 4. The part before the first comma, for exports like `"10/10/24, 1:18 PM"`
pub fn try_parse_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(to_iso_seconds(&ts.with_timezone(&Utc)));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(to_iso_seconds(&naive.and_utc()));
    }

    if let Some(date) = parse_calendar_date(trimmed) {
        return Some(date_to_iso_midnight(date));
    }

    // Spreadsheet exports often append a wall-clock time after a comma
    let (head, _) = trimmed.split_once(',')?;
    parse_calendar_date(head.trim()).map(date_to_iso_midnight)
}

/// Normalise a date, falling back to `default` when no format matches
///
/// # Examples
///
/// ```
/// use daoip_common::values::parse_date;
///
/// assert_eq!(parse_date("12/01/2024", "2024-01-01T00:00:00Z"), "2024-12-01T00:00:00Z");
/// assert_eq!(parse_date("soon", "2024-01-01T00:00:00Z"), "2024-01-01T00:00:00Z");
/// ```
pub fn parse_date(raw: &str, default: &str) -> String {
    match try_parse_date(raw) {
        Some(iso) => iso,
        None => {
            if clean_value(raw).is_some() {
                warn!(raw = raw.trim(), default, "Unparseable date, using default");
            }
            default.to_string()
        }
    }
}

fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .filter(|(shape, _)| shape.is_match(s))
        .find_map(|(_, pattern)| NaiveDate::parse_from_str(&s.replace('.', ""), pattern).ok())
}
