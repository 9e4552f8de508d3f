/// Appointment slot parsing and clinic-hours rules
///
/// The assistant accepts `MM/DD/YYYY HH:MM AM/PM` anywhere in a message. The
/// same slot rules (future only, 7:00 AM to 8:00 PM) apply to appointments
/// created through the REST API.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use std::sync::LazyLock;

/// First bookable hour (7:00 AM)
pub const CLINIC_OPEN_HOUR: u32 = 7;

/// Closing hour (8:00 PM); the last bookable slot starts before it
pub const CLINIC_CLOSE_HOUR: u32 = 20;

pub const DATETIME_EXAMPLE: &str = "03/20/2026 10:00 AM";

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2}):(\d{2})\s*(AM|PM)").expect("valid time regex"));

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("valid date regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("Please include a time in 12-hour format (e.g. 10:00 AM).")]
    MissingTime,

    #[error("Please include a date in MM/DD/YYYY format (e.g. 03/15/2026).")]
    MissingDate,

    #[error("Invalid date. Please verify the day and month are correct.")]
    InvalidDate,

    #[error("Invalid time. Please use a real time such as 10:00 AM.")]
    InvalidTime,

    #[error("That date and time has already passed. Please choose a future appointment.")]
    InPast,

    #[error("Sorry, our clinic is closed at that time. We are open Monday to Saturday, 7:00 AM to 8:00 PM only.")]
    OutsideHours,
}

pub fn contains_date(text: &str) -> bool {
    DATE_RE.is_match(text)
}

fn parse_time(text: &str) -> Result<NaiveTime, SlotError> {
    let caps = TIME_RE.captures(text).ok_or(SlotError::MissingTime)?;

    let hour: u32 = caps[1].parse().map_err(|_| SlotError::InvalidTime)?;
    let minute: u32 = caps[2].parse().map_err(|_| SlotError::InvalidTime)?;
    if !(1..=12).contains(&hour) {
        return Err(SlotError::InvalidTime);
    }

    let hour = match (caps[3].to_ascii_uppercase().as_str(), hour) {
        ("AM", 12) => 0,
        ("AM", h) => h,
        ("PM", 12) => 12,
        (_, h) => h + 12,
    };

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or(SlotError::InvalidTime)
}

fn parse_date(text: &str) -> Result<NaiveDate, SlotError> {
    let caps = DATE_RE.captures(text).ok_or(SlotError::MissingDate)?;

    let month: u32 = caps[1].parse().map_err(|_| SlotError::InvalidDate)?;
    let day: u32 = caps[2].parse().map_err(|_| SlotError::InvalidDate)?;
    let year: i32 = caps[3].parse().map_err(|_| SlotError::InvalidDate)?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or(SlotError::InvalidDate)
}

pub fn is_within_clinic_hours(time: NaiveTime) -> bool {
    (CLINIC_OPEN_HOUR..CLINIC_CLOSE_HOUR).contains(&time.hour())
}

/// Checks a slot against `now` (clinic local time)
pub fn validate_slot(slot: NaiveDateTime, now: NaiveDateTime) -> Result<(), SlotError> {
    if slot < now {
        return Err(SlotError::InPast);
    }
    if !is_within_clinic_hours(slot.time()) {
        return Err(SlotError::OutsideHours);
    }
    Ok(())
}

/// Extracts and validates a slot from free text
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use vetconnect_api::chat::datetime::parse_slot;
///
/// let now = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let slot = parse_slot("03/20/2026 10:30 AM please", now).unwrap();
/// assert_eq!(slot.to_string(), "2026-03-20 10:30:00");
/// ```
pub fn parse_slot(text: &str, now: NaiveDateTime) -> Result<NaiveDateTime, SlotError> {
    let time = parse_time(text)?;
    let date = parse_date(text)?;
    let slot = date.and_time(time);
    validate_slot(slot, now)?;
    Ok(slot)
}

/// `03/20/2026 10:00 AM`
pub fn format_slot(slot: NaiveDateTime) -> String {
    slot.format("%m/%d/%Y %I:%M %p").to_string()
}
