//! Time and timestamp helpers.

use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike, Utc, Weekday};

/// UTC timestamp used for `last_updated`, boost end times, etc.
pub type Timestamp = DateTime<Utc>;

/// Minutes in a day; `start_time` values live in `0..MINUTES_PER_DAY`.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert a UTC timestamp to wall-clock time in the host time zone.
///
/// Weekly schedules are authored in local time.
#[must_use]
pub fn to_local(ts: Timestamp) -> NaiveDateTime {
    ts.with_timezone(&Local).naive_local()
}

/// Minute of the day (`0..=1439`) of a wall-clock time.
#[must_use]
pub fn minute_of_day(at: NaiveDateTime) -> u16 {
    // hour < 24 and minute < 60, so this always fits.
    u16::try_from(at.hour() * 60 + at.minute()).unwrap_or(0)
}

/// Day index with Monday = 0 … Sunday = 6.
#[must_use]
pub fn day_index(weekday: Weekday) -> u8 {
    u8::try_from(weekday.num_days_from_monday()).unwrap_or(0)
}

/// Day index of a wall-clock time.
#[must_use]
pub fn day_index_of(at: NaiveDateTime) -> u8 {
    day_index(at.weekday())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_compute_minute_of_day() {
        assert_eq!(minute_of_day(at(2026, 10, 12, 0, 0)), 0);
        assert_eq!(minute_of_day(at(2026, 10, 12, 8, 30)), 510);
        assert_eq!(minute_of_day(at(2026, 10, 12, 23, 59)), 1439);
    }

    #[test]
    fn should_index_monday_as_zero() {
        // 2026-10-12 is a Monday.
        assert_eq!(day_index_of(at(2026, 10, 12, 9, 0)), 0);
        assert_eq!(day_index_of(at(2026, 10, 18, 9, 0)), 6);
    }
}
