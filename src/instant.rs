//! The `Instant` type and calendar helpers shared by the cron trigger and
//! the scheduler.
//!
//! An `Instant` is an absolute point in time carrying a UTC offset, with
//! second precision, restricted to years `1..=9999` (chrono's own domain).

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone};

/// An absolute point in time carrying a UTC offset.
pub type Instant = DateTime<FixedOffset>;

/// The earliest representable instant: used as the "exhausted" sentinel for
/// a job's `scheduled_fire_time`.
pub fn min_instant() -> Instant {
    FixedOffset::east_opt(0)
        .unwrap()
        .from_utc_datetime(&NaiveDate::from_ymd_opt(1, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
}

/// The latest representable instant: used as the "no triggers remain"
/// sentinel for a job's `scheduled_fire_time`.
pub fn max_instant() -> Instant {
    FixedOffset::east_opt(0)
        .unwrap()
        .from_utc_datetime(&NaiveDate::from_ymd_opt(9999, 12, 31).unwrap().and_hms_opt(23, 59, 59).unwrap())
}

/// Weekday numbering used throughout this crate: Sunday = 1 .. Saturday = 7.
///
/// This is **not** the ISO-8601 numbering (which starts at Monday = 1); it
/// matches the convention of the cron dialect this trigger implements and
/// must be preserved for compatibility with existing expressions.
pub fn weekday_number(instant: &Instant) -> u32 {
    instant.weekday().num_days_from_sunday() + 1
}

/// Whether `instant` falls on the first occurrence of its weekday within
/// its month (day-of-month <= 7).
pub fn is_first_weekday_of_month(instant: &Instant) -> bool {
    instant.day() <= 7
}

/// Whether `instant` falls on the last occurrence of its weekday within its
/// month (no day exactly 7 days later falls in the same month).
pub fn is_last_weekday_of_month(instant: &Instant) -> bool {
    let days_in_month = days_in_month(instant.year(), instant.month());
    instant.day() + 7 > days_in_month
}

/// Number of days in the given (year, month), accounting for leap years.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first_of_month = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap()
    };
    (first_of_next - first_of_month).num_days() as u32
}

/// Odd/even week parity relative to the reference Monday 2001-01-01, which
/// is declared to be the first day of an *odd* week.
///
/// The 14-day cycle is anchored at the reference date: the 7 days starting
/// at the reference (and every 14 days before/after it) are "odd"; the
/// other 7 are "even".
pub fn is_odd_week(instant: &Instant) -> bool {
    let reference = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
    let delta = instant.date_naive().signed_duration_since(reference).num_days();
    delta.rem_euclid(14) < 7
}

pub fn is_even_week(instant: &Instant) -> bool {
    !is_odd_week(instant)
}

/// Re-express `instant` using `offset`, preserving the absolute point in
/// time (this is a timezone *conversion*, not a wall-clock reinterpretation).
pub fn with_offset(instant: Instant, offset: FixedOffset) -> Instant {
    instant.with_timezone(&offset)
}

/// Convenience: number of whole milliseconds from `now` until `target`,
/// clamped to zero for instants in the past.
pub fn millis_until(target: Instant, now: Instant) -> i64 {
    (target - now).num_milliseconds().max(0)
}

pub fn duration_until(target: Instant, now: Instant) -> std::time::Duration {
    let ms = millis_until(target, now);
    std::time::Duration::from_millis(ms as u64)
}
