//! Credential date parsing and comparison.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

const DATE_PATTERN: &str = r"(?i)^(\d{4})-(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])T([01][0-9]|2[0-3]):([0-5][0-9]):([0-5][0-9]|60)(\.[0-9]+)?(Z|(\+|-)([01][0-9]|2[0-3]):([0-5][0-9]))$";

fn date_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DATE_PATTERN).ok()).as_ref()
}

/// Whether `value` is an RFC 3339 date-time with an explicit offset.
pub fn is_valid_date(value: &str) -> bool {
    date_regex().is_some_and(|re| re.is_match(value))
}

/// Parse a credential date. Dates without an offset are read as UTC.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// True when `value` lies more than `tolerance_ms` after `now`.
/// Unparsable dates are never in the future.
pub fn is_future(value: &str, tolerance_ms: i64, now: DateTime<Utc>) -> bool {
    parse_date(value).is_some_and(|date| date > now + Duration::milliseconds(tolerance_ms))
}

/// An expiry date has passed once it is no longer in the future.
pub fn is_expired(value: &str, tolerance_ms: i64, now: DateTime<Utc>) -> bool {
    !value.is_empty() && !is_future(value, tolerance_ms, now)
}
