//! Tests for the audit trail

use prometheus_slot_coordinator::core::{
    build_audit_event, AuditSink, InMemoryAuditSink, SlotAction,
};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);
    sink.record(build_audit_event("Q1", SlotAction::Acquire, Some("robot-1".into())));
    sink.record(build_audit_event("Q1", SlotAction::Release, None));
    sink.record(build_audit_event("Q2", SlotAction::Acquire, None));

    let events = sink.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].detail.as_deref(), Some("robot-1"));
    assert_ne!(events[0].event_id, events[1].event_id);
    assert_eq!(
        sink.actions_for("Q1"),
        vec![SlotAction::Acquire, SlotAction::Release]
    );
}

#[test]
fn test_audit_sink_evicts_oldest() {
    let sink = InMemoryAuditSink::new(2);
    sink.record(build_audit_event("Q1", SlotAction::Acquire, None));
    sink.record(build_audit_event("Q2", SlotAction::Acquire, None));
    sink.record(build_audit_event("Q3", SlotAction::Acquire, None));

    let lanes: Vec<_> = sink.events().into_iter().map(|e| e.lane).collect();
    assert_eq!(lanes, vec!["Q2", "Q3"]);
}

#[test]
fn test_zero_capacity_records_nothing() {
    let sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event("Q1", SlotAction::Sweep, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_action_names() {
    assert_eq!(SlotAction::Recover.as_str(), "recover");
    assert_eq!(SlotAction::Expire.as_str(), "expire");
}
