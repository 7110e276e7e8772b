//! Canonical date/time handling.
//!
//! Every calendar day and instant used in a comparison or uniqueness key
//! goes through this module: days are bare `NaiveDate`s, instants are
//! `NaiveDateTime`s in UTC. Display-timezone conversion is a client
//! concern and never happens on this side of the API.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::errors::{AppError, AppResult};

/// Parse a strict `YYYY-MM-DD` calendar date. Trailing content (a
/// time-of-day component, offsets) is rejected.
pub fn parse_date(input: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("'{input}' is not a YYYY-MM-DD calendar date")))
}

/// Parse a clock string: `H:MM` or `HH:MM`, optional `:SS`, optional
/// AM/PM marker (case-insensitive, with or without a leading space).
///
/// With a marker the hour must be 1–12 and converts per the usual rules
/// (12 AM → 0, PM adds 12 except for 12 PM); without one it must be 0–23.
pub fn parse_clock(input: &str) -> AppResult<NaiveTime> {
    let invalid = || AppError::Validation(format!("'{input}' is not a valid clock time"));

    let upper = input.trim().to_ascii_uppercase();
    let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end(), Some(false))
    } else if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end(), Some(true))
    } else {
        (upper.as_str(), None)
    };

    let fields: Vec<&str> = clock.split(':').collect();
    if !(2..=3).contains(&fields.len()) {
        return Err(invalid());
    }

    let mut parts = [0u32; 3];
    for (i, field) in fields.iter().enumerate() {
        if field.is_empty() || !field.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        parts[i] = field.parse().map_err(|_| invalid())?;
    }
    let (hour, minute, second) = (parts[0], parts[1], parts[2]);

    let hour = match meridiem {
        Some(is_pm) => match (is_pm, hour) {
            (_, 0) | (_, 13..) => return Err(invalid()),
            (false, 12)        => 0,
            (false, h)         => h,
            (true, 12)         => 12,
            (true, h)          => h + 12,
        },
        None if hour <= 23 => hour,
        None => return Err(invalid()),
    };

    if minute > 59 || second > 59 {
        return Err(invalid());
    }

    NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(invalid)
}

/// Combine a calendar day and a clock time into one canonical instant.
pub fn combine(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    date.and_time(time)
}

/// The current canonical calendar day.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// The current canonical instant.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Hours between check-in and check-out, rounded to 2 decimals.
/// Reported as 0 when either endpoint is missing.
pub fn working_hours(check_in: Option<NaiveDateTime>, check_out: Option<NaiveDateTime>) -> f64 {
    match (check_in, check_out) {
        (Some(start), Some(end)) if end >= start => {
            let hours = (end - start).num_seconds() as f64 / 3600.0;
            (hours * 100.0).round() / 100.0
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn clock(s: &str) -> NaiveTime {
        parse_clock(s).unwrap()
    }

    #[test]
    fn date_parsing_is_strict() {
        assert_eq!(date("2024-06-01"), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("01-06-2024").is_err());
        assert!(parse_date("2024-06-01T10:00").is_err());
        assert!(parse_date("2024-06-01 10:00").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn twenty_four_hour_clock() {
        assert_eq!(clock("09:00"), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(clock("9:05"), NaiveTime::from_hms_opt(9, 5, 0).unwrap());
        assert_eq!(clock("23:59:59"), NaiveTime::from_hms_opt(23, 59, 59).unwrap());
        assert_eq!(clock("00:00"), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert!(parse_clock("24:00").is_err());
        assert!(parse_clock("12:60").is_err());
        assert!(parse_clock("12:00:60").is_err());
        assert!(parse_clock("noon").is_err());
        assert!(parse_clock("12").is_err());
    }

    #[test]
    fn meridiem_conversion() {
        assert_eq!(clock("12:00 AM"), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        assert_eq!(clock("12:00 PM"), NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(clock("9:30 AM"), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(clock("9:30 PM"), NaiveTime::from_hms_opt(21, 30, 0).unwrap());
        assert_eq!(clock("09:30pm"), NaiveTime::from_hms_opt(21, 30, 0).unwrap());
        assert_eq!(clock("1:00 pm"), NaiveTime::from_hms_opt(13, 0, 0).unwrap());
        // Hour 0 and hours above 12 make no sense with a meridiem marker.
        assert!(parse_clock("0:30 AM").is_err());
        assert!(parse_clock("13:00 PM").is_err());
    }

    #[test]
    fn combine_keeps_the_day_and_time() {
        let instant = combine(date("2024-06-01"), clock("10:00 AM"));
        assert_eq!(instant.to_string(), "2024-06-01 10:00:00");
        assert_eq!(instant.date(), date("2024-06-01"));
    }

    #[test]
    fn working_hours_rounds_to_two_decimals() {
        let start = combine(date("2024-06-01"), clock("09:00"));
        let end = combine(date("2024-06-01"), clock("18:00"));
        assert_eq!(working_hours(Some(start), Some(end)), 9.00);

        let end = combine(date("2024-06-01"), clock("17:20"));
        assert_eq!(working_hours(Some(start), Some(end)), 8.33);

        assert_eq!(working_hours(Some(start), None), 0.0);
        assert_eq!(working_hours(None, None), 0.0);
        // An inverted pair never reports negative hours.
        assert_eq!(working_hours(Some(end), Some(start)), 0.0);
    }
}
