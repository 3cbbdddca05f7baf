//! Timestamp handling for text cells.
//!
//! Cells hold whatever the store returned: RFC 3339 stamps written by this
//! system, bare dates typed by users, or spreadsheet-formatted date-times.
//! Naive values are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];

/// Parse a cell into a UTC instant. Blank or unrecognized text yields `None`.
pub fn parse_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    let text = cell.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

/// First parseable cell among `cells`, in order (e.g. updated time, then created time).
pub fn first_timestamp(cells: &[&str]) -> Option<DateTime<Utc>> {
    cells
        .iter()
        .find(|c| !c.trim().is_empty())
        .and_then(|c| parse_timestamp(c))
}

/// Canonical text form written to the store (`2024-01-01T08:30:00.000Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Whole days between two instants, rounded up, regardless of order.
pub fn days_between_ceil(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    let millis = (b - a).num_milliseconds().abs();
    (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn parses_the_formats_found_in_cells() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-11"), Some(midnight));
        assert_eq!(parse_timestamp("2024/01/11"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-11T00:00:00.000Z"), Some(midnight));
        assert_eq!(parse_timestamp("2024-01-11T08:00:00+08:00"), Some(midnight));
        assert_eq!(
            parse_timestamp("2024/01/11 13:45"),
            Some(Utc.with_ymd_and_hms(2024, 1, 11, 13, 45, 0).unwrap())
        );
    }

    #[test]
    fn blank_and_garbage_cells_are_none() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("next tuesday"), None);
    }

    #[test]
    fn first_timestamp_skips_blank_cells_only() {
        let at = first_timestamp(&["", "2024-03-01"]);
        assert_eq!(at, Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));

        // A non-blank but unparseable first cell wins over later cells.
        assert_eq!(first_timestamp(&["garbage", "2024-03-01"]), None);
    }

    #[test]
    fn format_round_trips_through_parse() {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(at), "2024-05-06T07:08:09.000Z");
        assert_eq!(parse_timestamp(&format_timestamp(at)), Some(at));
    }

    #[test]
    fn ten_calendar_days_is_ten() {
        let created = parse_timestamp("2024-01-01").unwrap();
        let closed = parse_timestamp("2024-01-11").unwrap();
        assert_eq!(days_between_ceil(created, closed), 10);
        assert_eq!(days_between_ceil(closed, created), 10);
    }

    #[test]
    fn partial_days_round_up() {
        let created = parse_timestamp("2024-01-01T12:00:00Z").unwrap();
        let closed = parse_timestamp("2024-01-03").unwrap();
        assert_eq!(days_between_ceil(created, closed), 2);
        assert_eq!(days_between_ceil(created, created), 0);
    }

    proptest! {
        #[test]
        fn day_count_is_symmetric_and_rounds_up(start in 0i64..4_000_000_000, offset in 0i64..400 * MILLIS_PER_DAY) {
            let a = Utc.timestamp_millis_opt(start * 1000).unwrap();
            let b = a + chrono::Duration::milliseconds(offset);
            let days = days_between_ceil(a, b);
            prop_assert_eq!(days, days_between_ceil(b, a));
            prop_assert!(days * MILLIS_PER_DAY >= offset);
            prop_assert!((days - 1) * MILLIS_PER_DAY < offset || offset == 0);
        }
    }
}
