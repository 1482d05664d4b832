use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Weekday};
use tracing::info;

use crate::error::{Result, TimekeeperError};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn most_recent(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let days_back = (7 + today.weekday().num_days_from_monday()
        - weekday.num_days_from_monday())
        % 7;
    today - Duration::days(days_back as i64)
}

/// The most recent Friday on or before `today`.
pub fn last_friday(today: NaiveDate) -> NaiveDate {
    most_recent(today, Weekday::Fri)
}

/// The most recent Saturday on or before `today`.
pub fn last_saturday(today: NaiveDate) -> NaiveDate {
    most_recent(today, Weekday::Sat)
}

/// Default batch date: the last business Friday relative to the local clock.
pub fn last_friday_local() -> NaiveDate {
    let now = Local::now().date_naive();
    let friday = last_friday(now);
    info!("Calculated last Friday {} for current date {}", friday, now);
    friday
}

pub fn last_friday_str() -> String {
    last_friday_local().format(DATE_FORMAT).to_string()
}

pub fn parse_date_str(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| TimekeeperError::InvalidDate {
        date: date_str.to_string(),
        message: e.to_string(),
    })
}

pub fn add_days_to_date_str(date_str: &str, num_days: i64) -> Result<String> {
    let date = parse_date_str(date_str)? + Duration::days(num_days);
    Ok(date.format(DATE_FORMAT).to_string())
}

/// Hours between two timestamps, rounded to three decimals.
pub fn duration_hours(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    let seconds = (end - start).num_seconds() as f64;
    (seconds / 3600.0 * 1000.0).round() / 1000.0
}
