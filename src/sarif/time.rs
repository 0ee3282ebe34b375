use chrono::{DateTime, Utc};
use tracing::warn;

/// SARIF `date-time` rendering: UTC with millisecond precision.
pub fn sarif_timestamp(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Convert a summary timestamp (epoch seconds with optional fraction, or
/// RFC 3339) to SARIF form. Anything else is passed through unchanged.
pub fn normalize_timestamp(raw: &str) -> String {
    let text = raw.trim();
    if let Some(time) = parse_epoch(text) {
        return sarif_timestamp(&time);
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return sarif_timestamp(&time.with_timezone(&Utc));
    }
    warn!(timestamp = raw, "unrecognized timestamp, copying it verbatim");
    raw.to_string()
}

fn parse_epoch(text: &str) -> Option<DateTime<Utc>> {
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) {
        return None;
    }
    let seconds: i64 = whole.parse().ok()?;
    let mut nanos: String = fraction.chars().take(9).collect();
    while nanos.len() < 9 {
        nanos.push('0');
    }
    DateTime::from_timestamp(seconds, nanos.parse().ok()?)
}
