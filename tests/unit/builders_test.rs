//! Tests for builders

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use prometheus_slot_coordinator::builders::{build_coordinator, build_store, CoordinatorBuilder};
use prometheus_slot_coordinator::config::{CoordinatorConfig, StoreBackendConfig};
use prometheus_slot_coordinator::core::{AcquireRequest, SlotAction, SlotStore};
use prometheus_slot_coordinator::infra::InMemorySlotStore;
use prometheus_slot_coordinator::util::clock::ManualClock;

#[test]
fn test_build_coordinator_from_defaults() {
    let stack = build_coordinator(&CoordinatorConfig::default()).unwrap();
    assert_eq!(stack.selector.pool_size(), 5);
    assert_eq!(
        stack.coordinator.max_task_duration().as_secs(),
        28 * 3600
    );
    assert!(stack.audit.is_some());
}

#[test]
fn test_build_rejects_invalid_config() {
    let cfg = CoordinatorConfig {
        pool_size: 0,
        ..CoordinatorConfig::default()
    };
    assert!(build_coordinator(&cfg).is_err());
}

#[test]
fn test_builder_overrides_store_and_clock() {
    let store = Arc::new(InMemorySlotStore::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap(),
    ));
    let cfg = CoordinatorConfig {
        pool_size: 2,
        ..CoordinatorConfig::default()
    };
    let stack = CoordinatorBuilder::new(cfg)
        .with_store(store.clone())
        .with_clock(clock)
        .build()
        .unwrap();

    let lane = stack.selector.pick_from_pool("R", None).unwrap();
    assert_eq!(lane, "R1");
    let row = store.get("R1").unwrap().unwrap();
    assert_eq!(
        row.start_time,
        Some(Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap())
    );
    let audit = stack.audit.as_ref().unwrap();
    assert_eq!(audit.actions_for("R1"), vec![SlotAction::Acquire]);
}

#[test]
fn test_recent_window_comes_from_config() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap(),
    ));
    let cfg = CoordinatorConfig {
        recent_window_hours: 3,
        ..CoordinatorConfig::default()
    };
    let stack = CoordinatorBuilder::new(cfg)
        .with_clock(clock.clone())
        .build()
        .unwrap();
    let coordinator = &stack.coordinator;
    assert_eq!(coordinator.recent_window_hours(), 3);

    coordinator.acquire("Q1", &AcquireRequest::default()).unwrap();
    coordinator.release("Q1", false).unwrap();
    clock.advance(chrono::Duration::hours(2));
    assert!(coordinator.recently_completed_in_window("Q1").unwrap());
    clock.advance(chrono::Duration::hours(2));
    assert!(!coordinator.recently_completed_in_window("Q1").unwrap());
}

#[test]
fn test_disabled_audit() {
    let cfg = CoordinatorConfig {
        audit_capacity: 0,
        ..CoordinatorConfig::default()
    };
    let stack = build_coordinator(&cfg).unwrap();
    assert!(stack.audit.is_none());
    stack
        .coordinator
        .acquire("Q1", &AcquireRequest::default())
        .unwrap();
}

#[test]
fn test_build_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = build_store(&StoreBackendConfig::File {
        path: dir.path().to_path_buf(),
        stream: "night".into(),
    })
    .unwrap();
    assert!(store.get("Q1").unwrap().is_none());
}
