//! Timestamp parsing.
//!
//! Jira is inconsistent about timestamp formats: the platform REST API
//! returns `2024-01-31T09:30:00.000+0000` (offset without a colon), the agile
//! API returns RFC 3339, and date-only custom fields return `2024-01-31`.
//! Every accepted form is normalized to UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const JIRA_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse any supported timestamp form into UTC.
///
/// Naive date-times (no offset) are taken as UTC. Bare dates map to
/// midnight UTC.
#[must_use]
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, JIRA_FORMAT) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, NAIVE_FORMAT) {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
