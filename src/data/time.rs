use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{NewsQuantError, NewsQuantResult, ParseError};

/// Offset-carrying layouts beyond strict RFC 3339.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimestampIssue {
    Unrecognized,
    NonexistentLocalTime,
}

/// Parses a textual timestamp into UTC.
///
/// Values with an explicit offset keep their instant. Naive values (with or without a
/// time of day) are interpreted as wall-clock time in `tz`.
pub(crate) fn parse_utc(raw: &str, tz: Tz) -> Result<DateTime<Utc>, TimestampIssue> {
    let value = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    let naive = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .ok_or(TimestampIssue::Unrecognized)?;

    localize(&naive, tz)
}

/// Interprets a wall-clock time in `tz`. An ambiguous time resolves to the earliest instant.
fn localize(naive: &NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, TimestampIssue> {
    tz.from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(TimestampIssue::NonexistentLocalTime)
}

/// Same as [`parse_utc`], attributing failures to a cell.
pub(crate) fn parse_utc_cell(
    raw: &str,
    tz: Tz,
    column: &str,
    row: usize,
) -> NewsQuantResult<DateTime<Utc>> {
    parse_utc(raw, tz).map_err(|issue| {
        let err = match issue {
            TimestampIssue::Unrecognized => ParseError::InvalidDate {
                column: column.to_string(),
                row,
                value: raw.to_string(),
            },
            TimestampIssue::NonexistentLocalTime => ParseError::NonexistentLocalTime {
                value: raw.to_string(),
                timezone: tz.name().to_string(),
            },
        };
        NewsQuantError::from(err)
    })
}

/// Reads zone-less epoch microseconds as wall-clock time in `tz`, returning UTC micros.
pub(crate) fn localize_naive_micros(
    micros: i64,
    tz: Tz,
    column: &str,
    row: usize,
) -> NewsQuantResult<i64> {
    let naive = DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| ParseError::InvalidDate {
            column: column.to_string(),
            row,
            value: micros.to_string(),
        })?
        .naive_utc();

    localize(&naive, tz)
        .map(|dt| dt.timestamp_micros())
        .map_err(|_| {
            ParseError::NonexistentLocalTime {
                value: naive.to_string(),
                timezone: tz.name().to_string(),
            }
            .into()
        })
}

pub(crate) fn day_to_micros(day: NaiveDate) -> i64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp_micros()
}

pub(crate) fn micros_to_utc(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros)
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn plain_dates_land_on_midnight_utc() {
        let dt = parse_utc("2020-05-22", chrono_tz::Etc::GMT).expect("parse");
        assert_eq!(dt.date_naive(), ymd(2020, 5, 22));
        assert_eq!(dt.hour(), 0);

        let slashed = parse_utc("2020/05/22", chrono_tz::Etc::GMT).expect("parse");
        assert_eq!(slashed, dt);
    }

    #[test]
    fn offsets_are_converted_to_utc() {
        let dt = parse_utc("2020-06-05 22:30:54-04:00", chrono_tz::Etc::GMT).expect("parse");
        assert_eq!(dt.date_naive(), ymd(2020, 6, 6));
        assert_eq!(dt.hour(), 2);

        let rfc = parse_utc("2020-06-05T10:30:54Z", chrono_tz::Etc::GMT).expect("parse");
        assert_eq!(rfc.hour(), 10);
    }

    #[test]
    fn naive_timestamps_use_source_timezone() {
        let dt = parse_utc("2020-06-05 21:00:00", chrono_tz::America::New_York).expect("parse");
        // EDT is UTC-4 in June
        assert_eq!(dt.date_naive(), ymd(2020, 6, 6));
        assert_eq!(dt.hour(), 1);

        let frac = parse_utc("2020-06-05T09:15:00.250", chrono_tz::Etc::GMT).expect("parse");
        assert_eq!(frac.minute(), 15);
        assert_eq!(frac.nanosecond(), 250_000_000);
    }

    #[test]
    fn rejects_garbage_and_gaps() {
        assert_eq!(
            parse_utc("next tuesday", chrono_tz::Etc::GMT),
            Err(TimestampIssue::Unrecognized)
        );
        assert_eq!(
            parse_utc("2020-13-40", chrono_tz::Etc::GMT),
            Err(TimestampIssue::Unrecognized)
        );
        // Clocks jump from 02:00 to 03:00 on 2020-03-08 in New York
        assert_eq!(
            parse_utc("2020-03-08 02:30:00", chrono_tz::America::New_York),
            Err(TimestampIssue::NonexistentLocalTime)
        );
    }

    #[test]
    fn cell_errors_carry_position() {
        let err = parse_utc_cell("22/05/2020x", chrono_tz::Etc::GMT, "Date", 3).unwrap_err();
        match err {
            NewsQuantError::Parse(ParseError::InvalidDate { column, row, value }) => {
                assert_eq!(column, "Date");
                assert_eq!(row, 3);
                assert_eq!(value, "22/05/2020x");
            }
            other => panic!("Expected InvalidDate, got {other:?}"),
        }
    }

    #[test]
    fn naive_micros_localize_like_text() {
        let wall = ymd(2020, 5, 22).and_hms_opt(3, 0, 0).expect("time");
        let naive_us = wall.and_utc().timestamp_micros();

        let from_micros =
            localize_naive_micros(naive_us, chrono_tz::Asia::Tokyo, "Date", 0).expect("localize");
        let from_text = parse_utc("2020-05-22 03:00:00", chrono_tz::Asia::Tokyo).expect("parse");
        assert_eq!(from_micros, from_text.timestamp_micros());

        let back = micros_to_utc(from_micros).expect("in range");
        assert_eq!(back.date_naive(), ymd(2020, 5, 21), "Tokyo is UTC+9");
        assert_eq!(back.year(), 2020);
    }

    #[test]
    fn naive_micros_in_a_gap_are_rejected() {
        let gap = ymd(2020, 3, 8).and_hms_opt(2, 30, 0).expect("time");
        let err = localize_naive_micros(
            gap.and_utc().timestamp_micros(),
            chrono_tz::America::New_York,
            "Date",
            4,
        )
        .unwrap_err();
        assert!(
            matches!(err, NewsQuantError::Parse(ParseError::NonexistentLocalTime { .. })),
            "Unexpected error: {err:?}"
        );
    }

    #[test]
    fn day_micros_round_trip_to_midnight() {
        let day = day_to_micros(ymd(2020, 5, 22));
        let back = micros_to_utc(day).expect("in range");
        assert_eq!(back.date_naive(), ymd(2020, 5, 22));
        assert_eq!(back.hour(), 0);
    }
}
