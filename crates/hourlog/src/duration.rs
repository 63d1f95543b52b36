//! Session duration calculation.
//!
//! Dates and clock times arrive as the strings a form produces
//! (`YYYY-MM-DD`, `HH:MM`). Durations are exact `f64` hours; rounding is left
//! to the view.

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::error::{Error, Result};

/// Milliseconds in one hour.
const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Wire format for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire format for clock times.
pub const CLOCK_FORMAT: &str = "%H:%M";

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] if the input is not a valid calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| Error::InvalidDate {
        value: value.to_string(),
    })
}

/// Parse an `HH:MM` clock time.
///
/// `HH:MM:SS` is accepted too, since some time pickers include seconds. The
/// seconds are dropped: sessions are stored to the minute.
///
/// # Errors
///
/// Returns [`Error::InvalidTime`] if the input is not a valid time of day.
pub fn parse_clock(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, CLOCK_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map(whole_minutes)
        .map_err(|_| Error::InvalidTime {
            value: value.to_string(),
        })
}

/// Drop seconds and fractions so a time matches its `HH:MM` wire form.
#[must_use]
pub fn whole_minutes(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Compute the length of a session in hours.
///
/// Both times are taken on `date`; overnight sessions are not supported.
///
/// # Errors
///
/// Returns [`Error::InvalidInterval`] when `end` is not strictly after `start`.
#[allow(clippy::cast_precision_loss)]
pub fn session_hours(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<f64> {
    let started = date.and_time(start);
    let ended = date.and_time(end);
    if ended <= started {
        return Err(Error::InvalidInterval { start, end });
    }

    let millis = (ended - started).num_milliseconds();
    Ok(millis as f64 / MILLIS_PER_HOUR)
}
