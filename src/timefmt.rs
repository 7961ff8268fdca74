// Timestamp normalization for instance-formatted date/time strings.
// Slices raw values at the offsets of the configured format's letter groups.

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::error::{NowSyncError, Result};

/// Date pattern used when the configured format cannot be trusted.
pub const ISO_DATE_FORMAT: &str = "yyyy-MM-dd";

/// Time pattern assumed when the instance reports none.
pub const ISO_TIME_FORMAT: &str = "HH:mm:ss";

/// Display formats of the connected instance, taken from the
/// `glide.sys.date_format` and `glide.sys.time_format` system properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFormats {
    pub date_format: String,
    pub time_format: String,
}

impl Default for DisplayFormats {
    fn default() -> Self {
        Self {
            date_format: ISO_DATE_FORMAT.to_string(),
            time_format: ISO_TIME_FORMAT.to_string(),
        }
    }
}

impl DisplayFormats {
    pub fn new(date_format: impl Into<String>, time_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
            time_format: time_format.into(),
        }
    }
}

/// Parse a remote `"<date> <time>"` value using the instance display formats.
///
/// The configured patterns drive an index-sliced parse; if that yields no
/// valid calendar date, or a year drifting more than 100 years from the
/// current one, the value is re-parsed with the fixed `yyyy-MM-dd` date
/// pattern and the same time pattern. Malformed input never panics; only the
/// fallback's own failure surfaces as an error.
pub fn parse_datetime(value: &str, formats: &DisplayFormats) -> Result<DateTime<Utc>> {
    let (date, time) = value.split_once(' ').unwrap_or((value, ""));

    if let Some(parsed) = slice_parse(date, &formats.date_format, time, &formats.time_format) {
        if year_plausible(parsed.year()) {
            return Ok(parsed);
        }
    }

    slice_parse(date, ISO_DATE_FORMAT, time, &formats.time_format)
        .ok_or_else(|| NowSyncError::InvalidTimestamp(value.to_string()))
}

/// A parsed year further than 100 years from today signals a stale or
/// misconfigured display format.
fn year_plausible(year: i32) -> bool {
    let current = Utc::now().year();
    year >= current - 100 && year <= current + 100
}

/// Slice each component out of the raw parts at the offsets its letter group
/// occupies in the pattern, then build a UTC timestamp.
fn slice_parse(date: &str, date_format: &str, time: &str, time_format: &str) -> Option<DateTime<Utc>> {
    let year = component(date, date_format, 'y')? as i32;
    let month = component(date, date_format, 'M')?;
    let day = component(date, date_format, 'd')?;

    // 12-hour patterns mark the hour group with 'h', 24-hour ones with 'H'.
    let hour_span = span(time_format, 'h').or_else(|| span(time_format, 'H'))?;
    let hour = parse_span(time, hour_span)?;
    let minute = component(time, time_format, 'm')?;
    let second = component(time, time_format, 's')?;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}

/// First/last occurrence span of a format letter. Repeated or non-contiguous
/// groups are undefined and take whatever lies between the two ends.
fn span(format: &str, letter: char) -> Option<(usize, usize)> {
    let first = format.find(letter)?;
    let last = format.rfind(letter).unwrap_or(first) + letter.len_utf8();
    Some((first, last))
}

fn parse_span(value: &str, (start, end): (usize, usize)) -> Option<u32> {
    value.get(start..end)?.parse().ok()
}

fn component(value: &str, format: &str, letter: char) -> Option<u32> {
    parse_span(value, span(format, letter)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_iso_parse() {
        let ts = parse_datetime("2023-04-05 13:14:15", &DisplayFormats::default()).unwrap();
        assert_eq!(
            (ts.year(), ts.month(), ts.day()),
            (2023, 4, 5),
        );
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (13, 14, 15));
    }

    #[test]
    fn test_day_first_format() {
        let formats = DisplayFormats::new("dd/MM/yyyy", "HH:mm:ss");
        let ts = parse_datetime("05/04/2023 13:14:15", &formats).unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2023, 4, 5));
    }

    #[test]
    fn test_twelve_hour_marker() {
        let formats = DisplayFormats::new("yyyy-MM-dd", "hh:mm:ss");
        let ts = parse_datetime("2023-04-05 09:30:00", &formats).unwrap();
        assert_eq!((ts.hour(), ts.minute()), (9, 30));
    }

    #[test]
    fn test_wrong_format_falls_back_to_iso() {
        // A day-first pattern applied to an ISO value slices garbage; the
        // fallback must recover the real date.
        let formats = DisplayFormats::new("dd/MM/yyyy", "HH:mm:ss");
        let ts = parse_datetime("2023-04-05 13:14:15", &formats).unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2023, 4, 5));
    }

    #[test]
    fn test_implausible_year_falls_back_to_iso() {
        // This pattern slices an ISO value into a *valid* date in year 15,
        // which trips the 100-year drift check rather than the parse itself.
        let formats = DisplayFormats::new("dd...MM.yy", "HH:mm:ss");
        let ts = parse_datetime("2026-01-15 10:20:30", &formats).unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2026, 1, 15));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (10, 20, 30));
    }

    #[test]
    fn test_fallback_failure_is_an_error() {
        let err = parse_datetime("garbage", &DisplayFormats::default()).unwrap_err();
        assert!(matches!(err, NowSyncError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_invalid_calendar_date_without_recovery() {
        // Month 13 is rejected by the sliced parse and the fallback alike.
        let err = parse_datetime("2023-13-05 10:00:00", &DisplayFormats::default()).unwrap_err();
        assert!(matches!(err, NowSyncError::InvalidTimestamp(_)));
    }
}
