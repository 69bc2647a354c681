//! Timestamp derivation for the XMLTV wire format
//!
//! The wire format is a fixed `YYYYMMDDHHMMSS` string: 14 digits, zero
//! padded, no timezone suffix. All provider times are UTC.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};

use crate::errors::FormatError;

/// `strftime`-style pattern for the 14-digit wire format.
const WIRE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Render a timestamp as the 14-digit XMLTV wire format.
///
/// Fails if the year does not fit four digits, since `%Y` would silently
/// widen the field and corrupt the fixed-width contract.
pub fn format_timestamp(t: DateTime<Utc>) -> Result<String, FormatError> {
    let year = t.year();
    if !(0..=9999).contains(&year) {
        return Err(FormatError::YearOutOfRange { year });
    }
    Ok(t.format(WIRE_FORMAT).to_string())
}

/// Render a date-only value (original airdate) in the same wire format.
///
/// The provider sends no time-of-day for airdates; midnight UTC is used so
/// the rendering is consistent across runs.
pub fn format_date(d: NaiveDate) -> Result<String, FormatError> {
    let midnight = d
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid for every calendar date")
        .and_utc();
    format_timestamp(midnight)
}

/// Derive the stop time of an airing: `start + duration`.
///
/// Negative durations are excluded by the data model (`duration: u32`); the
/// only failure mode left is running off the end of the calendar.
pub fn compute_stop(
    start: DateTime<Utc>,
    duration_secs: u32,
) -> Result<DateTime<Utc>, FormatError> {
    start
        .checked_add_signed(TimeDelta::seconds(i64::from(duration_secs)))
        .ok_or(FormatError::StopOverflow {
            start,
            duration_secs,
        })
}
