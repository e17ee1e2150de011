//! Timestamp normalization into the service timezone.

use crate::forest::Timestamp;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};

/// Parse a fixed UTC offset such as `+02:00`, `-0530`, `Z` or `UTC`.
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Date-only values become the last second of that day.
pub fn end_of_day(date: NaiveDate, tz: FixedOffset) -> Option<Timestamp> {
    let local = date.and_hms_opt(23, 59, 59)?;
    tz.from_local_datetime(&local).single()
}

/// Parse a provider timestamp into `tz`.
///
/// Accepts RFC 3339 instants (converted), floating date-times (interpreted in
/// `tz`) and plain dates (end of day in `tz`). Returns `None` for anything else.
pub fn parse_timestamp(raw: &str, tz: FixedOffset) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&tz));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(local) = NaiveDateTime::parse_from_str(raw, format) {
            return tz.from_local_datetime(&local).single();
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| end_of_day(date, tz))
}

/// Unix seconds into `tz`.
pub fn from_unix_seconds(secs: i64, tz: FixedOffset) -> Option<Timestamp> {
    DateTime::from_timestamp(secs, 0).map(|utc| utc.with_timezone(&tz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn plus_two() -> FixedOffset {
        FixedOffset::east_opt(2 * 3600).unwrap()
    }

    #[test]
    fn offsets() {
        assert_eq!(parse_offset("+02:00"), Some(plus_two()));
        assert_eq!(parse_offset("+0200"), Some(plus_two()));
        assert_eq!(parse_offset("UTC"), FixedOffset::east_opt(0));
        assert_eq!(
            parse_offset("-05:30"),
            FixedOffset::west_opt(5 * 3600 + 30 * 60)
        );
        assert_eq!(parse_offset("02:00"), None);
        assert_eq!(parse_offset("+2:0"), None);
        assert_eq!(parse_offset("+01:75"), None);
    }

    #[test]
    fn date_only_is_end_of_day_in_service_timezone() {
        let ts = parse_timestamp("2024-05-01", plus_two()).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T23:59:59+02:00");
    }

    #[test]
    fn instants_are_converted() {
        let ts = parse_timestamp("2024-05-01T10:00:00Z", plus_two()).unwrap();
        assert_eq!(ts.hour(), 12);
        assert_eq!(ts.offset(), &plus_two());

        let ts = parse_timestamp("2024-05-01T10:00:00.000Z", plus_two()).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:00:00+02:00");
    }

    #[test]
    fn floating_times_are_local_to_service_timezone() {
        let ts = parse_timestamp("2024-05-01T10:00:00", plus_two()).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:00:00+02:00");
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_timestamp("", plus_two()).is_none());
        assert!(parse_timestamp("next tuesday", plus_two()).is_none());
    }

    #[test]
    fn unix_seconds() {
        let ts = from_unix_seconds(0, plus_two()).unwrap();
        assert_eq!(ts.to_rfc3339(), "1970-01-01T02:00:00+02:00");
    }
}
