use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::AppError;

/// Life-area themes in day order, Sunday first.
pub const AXIS_THEMES: [&str; 7] = [
    "Rest and preparation",
    "Physical",
    "Financial",
    "Gear",
    "ON TRACK N+1",
    "Misdirect",
    "Environment",
];

pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// ISO-8601 week id, e.g. `2026-W42`. Weeks start on Monday and week 1 holds
/// the year's first Thursday, so early January can belong to the previous year.
pub fn week_id(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Monday of the ISO week named by `week_id`.
pub fn week_start(week_id: &str) -> Result<NaiveDate, AppError> {
    let invalid = || AppError::Validation(format!("invalid week id '{week_id}', expected YYYY-Wnn"));
    let (year, week) = week_id.trim().split_once("-W").ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let week: u32 = week.parse().map_err(|_| invalid())?;
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)
}

/// Sunday-first month grid. `month0` is zero-based (January = 0); cells outside
/// the month are `None`.
pub fn calendar_grid(year: i32, month0: u32) -> Result<Vec<[Option<u32>; 7]>, AppError> {
    let invalid = || {
        AppError::Validation(format!("invalid month {year}-{}", month0.saturating_add(1)))
    };
    if month0 > 11 {
        return Err(invalid());
    }
    let first = NaiveDate::from_ymd_opt(year, month0 + 1, 1).ok_or_else(invalid)?;
    let next = if month0 == 11 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month0 + 2, 1)
    }
    .ok_or_else(invalid)?;
    let days_in_month = (next - first).num_days() as u32;

    let lead = first.weekday().num_days_from_sunday() as usize;
    let mut cells: Vec<Option<u32>> = vec![None; lead];
    cells.extend((1..=days_in_month).map(Some));
    while cells.len() % 7 != 0 {
        cells.push(None);
    }

    Ok(cells
        .chunks(7)
        .map(|chunk| {
            let mut week = [None; 7];
            week.copy_from_slice(chunk);
            week
        })
        .collect())
}

pub fn iso_date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|err| {
        AppError::Validation(format!("invalid date '{value}': {err}. Use YYYY-MM-DD"))
    })
}

/// Sunday = 0 .. Saturday = 6.
pub fn day_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Monday starting the next planning week. On a Monday this is the following
/// Monday, never the same day.
pub fn upcoming_monday(date: NaiveDate) -> NaiveDate {
    let days = match day_index(date) {
        0 => 1,
        idx => 8 - i64::from(idx),
    };
    date + Duration::days(days)
}

/// Position of a Sunday-first day index inside a Monday-first week.
pub fn monday_offset(day_index: u8) -> u8 {
    (day_index + 6) % 7
}

pub fn date_in_week(monday: NaiveDate, day_index: u8) -> NaiveDate {
    monday + Duration::days(i64::from(monday_offset(day_index)))
}

pub fn axis_for_day(day_index: u8) -> Option<&'static str> {
    AXIS_THEMES.get(usize::from(day_index)).copied()
}

pub fn day_name(day_index: u8) -> &'static str {
    DAY_NAMES
        .get(usize::from(day_index))
        .copied()
        .unwrap_or("Unknown")
}

/// Stable tag for colour lookups: `ON TRACK N+1` -> `on-track-n-plus-1`.
pub fn axis_slug(axis: &str) -> String {
    let trimmed = axis.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    trimmed
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace('+', "-plus-")
}
