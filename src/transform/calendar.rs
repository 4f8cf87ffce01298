//! UTC calendar decomposition of epoch timestamps

use chrono::{DateTime, Datelike, Timelike};

/// Calendar parts of an instant, all in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarParts {
    pub hour: i32,
    pub day: i32,
    /// ISO-8601 week number
    pub week: i32,
    pub month: i32,
    pub year: i32,
    /// 1 = Sunday ... 7 = Saturday
    pub weekday: i32,
}

impl CalendarParts {
    /// Decompose epoch seconds; `None` when the instant is out of range
    pub fn from_epoch_seconds(seconds: i64) -> Option<Self> {
        let instant = DateTime::from_timestamp(seconds, 0)?;
        Some(Self {
            hour: instant.hour() as i32,
            day: instant.day() as i32,
            week: instant.iso_week().week() as i32,
            month: instant.month() as i32,
            year: instant.year(),
            weekday: instant.weekday().number_from_sunday() as i32,
        })
    }
}

/// Epoch milliseconds to epoch seconds, truncating toward zero
pub fn millis_to_seconds(millis: i64) -> i64 {
    millis / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_instant() {
        // 2018-11-15 18:30:26 UTC, a Thursday
        let parts = CalendarParts::from_epoch_seconds(1_542_306_626).unwrap();
        assert_eq!(parts.year, 2018);
        assert_eq!(parts.month, 11);
        assert_eq!(parts.day, 15);
        assert_eq!(parts.hour, 18);
        assert_eq!(parts.week, 46);
        assert_eq!(parts.weekday, 5);
    }

    #[test]
    fn test_sunday_is_one() {
        // 2018-11-04 00:00:00 UTC, a Sunday
        let parts = CalendarParts::from_epoch_seconds(1_541_289_600).unwrap();
        assert_eq!(parts.weekday, 1);
        assert_eq!(parts.hour, 0);
    }

    #[test]
    fn test_iso_week_at_year_boundary() {
        // 2018-12-31 belongs to ISO week 1 of 2019 but calendar year 2018
        let parts = CalendarParts::from_epoch_seconds(1_546_214_400).unwrap();
        assert_eq!(parts.year, 2018);
        assert_eq!(parts.month, 12);
        assert_eq!(parts.week, 1);
    }

    #[test]
    fn test_out_of_range() {
        assert!(CalendarParts::from_epoch_seconds(i64::MAX).is_none());
    }

    #[test]
    fn test_millis_truncate() {
        assert_eq!(millis_to_seconds(1_542_306_626_796), 1_542_306_626);
        assert_eq!(millis_to_seconds(-1_500), -1);
    }
}
