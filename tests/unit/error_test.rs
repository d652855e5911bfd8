//! Tests for error types and their boundary mapping

use prometheus_slot_coordinator::core::SlotError;

#[test]
fn test_error_display() {
    let err = SlotError::Busy("Q1".into());
    assert_eq!(err.to_string(), "lane busy: Q1");

    let err = SlotError::AllQueuesBusy("Q".into());
    assert_eq!(err.to_string(), "all queues busy: Q");

    let err = SlotError::InvalidWindow("25:99".into());
    assert_eq!(err.to_string(), "invalid window time: 25:99");
}

#[test]
fn test_status_codes() {
    assert_eq!(SlotError::Busy("a".into()).status_code(), 409);
    assert_eq!(SlotError::AllQueuesBusy("a".into()).status_code(), 409);
    assert_eq!(SlotError::NotFound("a".into()).status_code(), 404);
    assert_eq!(SlotError::InvalidWindow("a".into()).status_code(), 400);
    assert_eq!(SlotError::Backend("a".into()).status_code(), 500);
}

#[test]
fn test_only_single_lane_busy_is_retryable() {
    assert!(SlotError::Busy("Q1".into()).is_busy());
    assert!(!SlotError::AllQueuesBusy("Q".into()).is_busy());
}

#[test]
fn test_error_converts_to_anyhow() {
    fn fails() -> prometheus_slot_coordinator::core::AppResult<()> {
        Err(SlotError::NotFound("Q9".into()).into())
    }
    let err = fails().unwrap_err();
    assert!(err.to_string().contains("Q9"));
}
