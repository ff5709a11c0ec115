//! Conversions between the backend's date arrays, the HTML form inputs and
//! the strings shown on link cards.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

const INPUT_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];
const DISPLAY_FORMAT: &str = "%b %-d, %Y, %-I:%M:%S %p";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DateError {
    /// Not an array, fewer than three elements, or non-integer elements.
    InvalidDateArray,
    /// The components do not name a real calendar date or time of day.
    OutOfRange(Vec<i64>),
    /// A form value that is neither `YYYY-MM-DD` nor `YYYY-MM-DDTHH:MM[:SS]`.
    InvalidInput(String),
}

impl std::fmt::Display for DateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateError::InvalidDateArray => write!(f, "invalid date array"),
            DateError::OutOfRange(parts) => write!(f, "date out of range: {:?}", parts),
            DateError::InvalidInput(value) => write!(f, "invalid date input: {}", value),
        }
    }
}

impl std::error::Error for DateError {}

/// Builds a date-time from `[year, month, day, hour?, minute?, second?, fraction?]`.
/// The month is 1-indexed, missing time components default to zero. A fraction
/// below 1000 is milliseconds, anything larger nanoseconds.
pub fn parse_backend_date(parts: &[i64]) -> Result<NaiveDateTime, DateError> {
    if parts.len() < 3 {
        return Err(DateError::InvalidDateArray);
    }
    let component = |index: usize| parts.get(index).copied().unwrap_or(0);
    let out_of_range = || DateError::OutOfRange(parts.to_vec());

    let year = i32::try_from(parts[0]).map_err(|_| out_of_range())?;
    let month = u32::try_from(parts[1]).map_err(|_| out_of_range())?;
    let day = u32::try_from(parts[2]).map_err(|_| out_of_range())?;
    let hour = u32::try_from(component(3)).map_err(|_| out_of_range())?;
    let minute = u32::try_from(component(4)).map_err(|_| out_of_range())?;
    let second = u32::try_from(component(5)).map_err(|_| out_of_range())?;
    // Jackson's LocalDateTime arrays carry nanoseconds here
    let fraction = u32::try_from(component(6)).map_err(|_| out_of_range())?;
    let nanosecond = if fraction < 1_000 { fraction * 1_000_000 } else { fraction };

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_nano_opt(hour, minute, second, nanosecond))
        .ok_or_else(out_of_range)
}

/// Same as [`parse_backend_date`] for an untyped JSON value.
pub fn parse_backend_date_value(value: &serde_json::Value) -> Result<NaiveDateTime, DateError> {
    let items = value.as_array().ok_or(DateError::InvalidDateArray)?;
    let parts = items
        .iter()
        .map(|item| item.as_i64().ok_or(DateError::InvalidDateArray))
        .collect::<Result<Vec<i64>, DateError>>()?;
    parse_backend_date(&parts)
}

/// The inverse of [`parse_backend_date`], always seven elements long.
pub fn to_backend_array(date: &NaiveDateTime) -> Vec<i64> {
    use chrono::{Datelike, Timelike};

    vec![
        i64::from(date.year()),
        i64::from(date.month()),
        i64::from(date.day()),
        i64::from(date.hour()),
        i64::from(date.minute()),
        i64::from(date.second()),
        i64::from(date.nanosecond() / 1_000_000),
    ]
}

/// `Jan 15, 2024, 10:30:00 AM`
pub fn format_date(date: &NaiveDateTime) -> String {
    date.format(DISPLAY_FORMAT).to_string()
}

pub fn format_date_or_na(date: Option<&NaiveDateTime>) -> String {
    match date {
        Some(date) => format_date(date),
        None => "N/A".to_string(),
    }
}

/// Value for an `<input type="datetime-local">`.
pub fn to_input_value(date: &NaiveDateTime) -> String {
    date.format(INPUT_FORMATS[0]).to_string()
}

/// Parses a form or command-line date. Blank input means "no date"; a bare
/// date is taken as local midnight.
pub fn parse_input_value(value: &str) -> Result<Option<NaiveDateTime>, DateError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    for format in INPUT_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Some(parsed));
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(Some)
        .ok_or_else(|| DateError::InvalidInput(trimmed.to_string()))
}

/// Renders a local wall-clock time the way the backend expects it:
/// `2024-01-15T09:30:00.000Z`. Times that fall in a DST gap are read as UTC.
pub fn to_iso_utc(date: &NaiveDateTime) -> String {
    let instant: DateTime<Utc> = match Local.from_local_datetime(date).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(date),
    };
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reads an ISO-8601 instant back into local wall-clock time.
pub fn from_iso_utc(value: &str) -> Result<NaiveDateTime, DateError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Local).naive_local())
        .map_err(|_| DateError::InvalidInput(value.to_string()))
}

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}
