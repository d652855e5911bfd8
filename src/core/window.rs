//! Business-hours window evaluation.
//!
//! Windows are time-of-day intervals. A window whose stop is not after its
//! start wraps past midnight, so `22:00-06:00` covers the night and
//! `09:00-09:00` covers the whole day.

use chrono::NaiveTime;

use crate::core::slot::ScheduledStop;
use crate::core::SlotError;

/// Persisted time-of-day format.
pub const WINDOW_FORMAT: &str = "%H:%M";

/// Whether `now` falls inside `[start, stop]`, wrapping past midnight when
/// `stop` is not after `start`.
#[must_use]
pub fn is_within_window(now: NaiveTime, start: NaiveTime, stop: NaiveTime) -> bool {
    if start < stop {
        return start <= now && now <= stop;
    }
    now >= start || now <= stop
}

/// Parse an `HH:MM` string.
///
/// # Errors
///
/// Returns [`SlotError::InvalidWindow`] when the value is not a time of day.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, SlotError> {
    NaiveTime::parse_from_str(value.trim(), WINDOW_FORMAT)
        .map_err(|_| SlotError::InvalidWindow(value.to_string()))
}

/// Format a time of day in the persisted form.
#[must_use]
pub fn format_time_of_day(time: NaiveTime) -> String {
    time.format(WINDOW_FORMAT).to_string()
}

/// Parsed operating window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessWindow {
    /// Opening time.
    pub start: NaiveTime,
    /// Closing time.
    pub stop: NaiveTime,
}

impl BusinessWindow {
    /// Build a window from two times of day.
    #[must_use]
    pub const fn new(start: NaiveTime, stop: NaiveTime) -> Self {
        Self { start, stop }
    }

    /// Parse a persisted window.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::InvalidWindow`] if either bound is malformed.
    pub fn parse(schedule: &ScheduledStop) -> Result<Self, SlotError> {
        Ok(Self {
            start: parse_time_of_day(&schedule.start)?,
            stop: parse_time_of_day(&schedule.stop)?,
        })
    }

    /// Whether the window crosses midnight.
    #[must_use]
    pub fn wraps(&self) -> bool {
        self.stop <= self.start
    }

    /// Whether `now` is inside the window.
    #[must_use]
    pub fn contains(&self, now: NaiveTime) -> bool {
        is_within_window(now, self.start, self.stop)
    }

    /// Persisted representation.
    #[must_use]
    pub fn to_scheduled_stop(&self) -> ScheduledStop {
        ScheduledStop {
            start: format_time_of_day(self.start),
            stop: format_time_of_day(self.stop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(value: &str) -> NaiveTime {
        parse_time_of_day(value).unwrap()
    }

    #[test]
    fn test_plain_window() {
        let window = BusinessWindow::new(t("08:00"), t("18:00"));
        assert!(!window.wraps());
        assert!(window.contains(t("10:00")));
        assert!(window.contains(t("08:00")));
        assert!(window.contains(t("18:00")));
        assert!(!window.contains(t("20:00")));
        assert!(!window.contains(t("07:59")));
    }

    #[test]
    fn test_window_wrapping_midnight() {
        let window = BusinessWindow::new(t("22:00"), t("06:00"));
        assert!(window.wraps());
        assert!(window.contains(t("23:00")));
        assert!(window.contains(t("00:30")));
        assert!(window.contains(t("06:00")));
        assert!(!window.contains(t("12:00")));
        assert!(!window.contains(t("21:59")));
    }

    #[test]
    fn test_equal_bounds_cover_whole_day() {
        let window = BusinessWindow::new(t("09:00"), t("09:00"));
        assert!(window.contains(t("03:00")));
        assert!(window.contains(t("15:00")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let bad = ScheduledStop {
            start: "08:00".into(),
            stop: "6pm".into(),
        };
        assert!(matches!(
            BusinessWindow::parse(&bad),
            Err(SlotError::InvalidWindow(v)) if v == "6pm"
        ));
    }

    #[test]
    fn test_round_trip_format() {
        let window = BusinessWindow::new(t("19:30"), t("07:30"));
        let stored = window.to_scheduled_stop();
        assert_eq!(stored.start, "19:30");
        assert_eq!(BusinessWindow::parse(&stored).unwrap(), window);
    }
}
