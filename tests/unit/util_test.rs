//! Tests for clocks and business-hours windows

use chrono::{Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use prometheus_slot_coordinator::core::window::{format_time_of_day, parse_time_of_day};
use prometheus_slot_coordinator::core::{is_within_window, BusinessWindow, ScheduledStop, SlotError};
use prometheus_slot_coordinator::util::clock::{now_ms, Clock, ManualClock};
use prometheus_slot_coordinator::util::telemetry::init_tracing;

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn test_now_ms_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(b >= a);
}

#[test]
fn test_manual_clock_offset() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap())
        .with_offset(FixedOffset::west_opt(3 * 3600).unwrap());
    assert_eq!(clock.time_of_day(), hm(20, 30));
    clock.advance(Duration::hours(2));
    assert_eq!(clock.time_of_day(), hm(22, 30));
}

#[test]
fn test_overnight_window() {
    assert!(is_within_window(hm(23, 0), hm(22, 0), hm(6, 0)));
    assert!(is_within_window(hm(5, 59), hm(22, 0), hm(6, 0)));
    assert!(!is_within_window(hm(12, 0), hm(22, 0), hm(6, 0)));
}

#[test]
fn test_daytime_window_is_inclusive() {
    assert!(is_within_window(hm(8, 0), hm(8, 0), hm(18, 0)));
    assert!(is_within_window(hm(18, 0), hm(8, 0), hm(18, 0)));
    assert!(!is_within_window(hm(18, 1), hm(8, 0), hm(18, 0)));
}

#[test]
fn test_business_window_round_trips_persisted_form() {
    let stored = ScheduledStop {
        start: "22:00".into(),
        stop: "06:00".into(),
    };
    let window = BusinessWindow::parse(&stored).unwrap();
    assert!(window.wraps());
    assert_eq!(window.to_scheduled_stop(), stored);
    assert_eq!(format_time_of_day(hm(7, 5)), "07:05");
}

#[test]
fn test_bad_time_of_day() {
    assert!(matches!(
        parse_time_of_day("noon"),
        Err(SlotError::InvalidWindow(_))
    ));
    assert!(parse_time_of_day("24:00").is_err());
}

#[test]
fn test_init_tracing_is_repeatable() {
    init_tracing(None);
    init_tracing(Some("prometheus_slot_coordinator=debug"));
    tracing::info!("tracing initialized twice without panicking");
}
