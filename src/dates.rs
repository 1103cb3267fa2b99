//! Due-date parsing and display.
//!
//! Due dates are stored as UTC instants. Text coming from the model or the CLI is read in the
//! user's zone (a fixed offset) unless it carries its own offset.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Accepted wall-clock layouts after normalization (`/` → `-`, single spaces).
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Offset of the host's local time right now.
pub fn local_zone() -> FixedOffset {
    *chrono::Local::now().offset()
}

/// Parse a due date such as `2025-01-01 10:00`, `2025/01/01`, or an RFC 3339 timestamp.
/// Returns None for anything that is not a valid absolute time.
pub fn parse_due_date(raw: &str, zone: &FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = raw
        .replace('/', "-")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return in_zone(naive, zone);
        }
    }
    // Bare date means midnight in the user's zone.
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| in_zone(naive, zone))
}

fn in_zone(naive: NaiveDateTime, zone: &FixedOffset) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Zone label in the `UTC+8` / `UTC-5:30` / `UTC` style.
pub fn zone_label(zone: &FixedOffset) -> String {
    let secs = zone.local_minus_utc();
    if secs == 0 {
        return "UTC".to_string();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.abs();
    let hours = abs / 3600;
    let minutes = (abs % 3600) / 60;
    if minutes == 0 {
        format!("UTC{}{}", sign, hours)
    } else {
        format!("UTC{}{}:{:02}", sign, hours, minutes)
    }
}

/// Display form used in result lines and prompt context: `2025/01/01 10:00 UTC+8`.
pub fn format_due_date(ts: &DateTime<Utc>, zone: &FixedOffset) -> String {
    format!(
        "{} {}",
        ts.with_timezone(zone).format("%Y/%m/%d %H:%M"),
        zone_label(zone)
    )
}
