use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a stored session-expiration string into a UTC instant.
///
/// The backend hands out ISO-ish strings, so this accepts full RFC 3339
/// (`2024-01-01T00:00:00Z`, `2024-01-01T02:00:00+02:00`), a naive datetime
/// with optional fractional seconds (interpreted as UTC), and a bare date
/// (midnight UTC). Returns `None` for anything else.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
