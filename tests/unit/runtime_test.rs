//! Tests for the boundary API models and the orphan reaper

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use prometheus_slot_coordinator::core::{
    AcquireRequest, QueueSelector, SlotCoordinator, SlotStore, TaskSlot, MAX_TASK_DURATION,
};
use prometheus_slot_coordinator::infra::InMemorySlotStore;
use prometheus_slot_coordinator::runtime::api::{health, lane_status};
use prometheus_slot_coordinator::runtime::{claim_lane, ClaimRequest, OrphanReaper, MIN_SWEEP_INTERVAL};
use prometheus_slot_coordinator::util::clock::ManualClock;

fn selector() -> QueueSelector {
    let coordinator = SlotCoordinator::new(Arc::new(InMemorySlotStore::new()));
    QueueSelector::new(Arc::new(coordinator)).with_pool_size(2)
}

#[test]
fn test_claim_lane_from_pool() {
    let selector = selector();
    let req = ClaimRequest {
        lane: "Q".into(),
        ..ClaimRequest::default()
    };
    assert_eq!(claim_lane(&selector, &req).unwrap().lane, "Q1");
    assert_eq!(claim_lane(&selector, &req).unwrap().lane, "Q2");

    let err = claim_lane(&selector, &req).unwrap_err();
    assert_eq!(err.status, 409);
    assert!(err.detail.contains("all queues busy"));
}

#[test]
fn test_claim_exact_lane() {
    let selector = selector();
    let req: ClaimRequest =
        serde_json::from_str(r#"{"lane": "NIGHT", "exact": true, "designee": "robot-3"}"#).unwrap();
    assert_eq!(claim_lane(&selector, &req).unwrap().lane, "NIGHT");
    assert_eq!(claim_lane(&selector, &req).unwrap_err().status, 409);

    let status = lane_status(selector.coordinator(), "NIGHT").unwrap();
    assert!(status.running);
    assert_eq!(status.designee.as_deref(), Some("robot-3"));
}

#[test]
fn test_bad_end_time_maps_to_400() {
    let selector = selector();
    let req = ClaimRequest {
        lane: "Q".into(),
        context: AcquireRequest::default().with_end_time(Some("late")),
        ..ClaimRequest::default()
    };
    assert_eq!(claim_lane(&selector, &req).unwrap_err().status, 400);
}

#[test]
fn test_unknown_lane_status_is_404() {
    let selector = selector();
    assert_eq!(lane_status(selector.coordinator(), "ghost").unwrap_err().status, 404);
}

#[test]
fn test_health_counts_running_lanes() {
    let selector = selector();
    selector.pick_from_pool("Q", None).unwrap();
    let h = health(selector.coordinator());
    assert!(h.ok);
    assert_eq!(h.running_lanes, 1);
}

#[tokio::test]
async fn test_reaper_expires_stale_lanes_until_cancelled() {
    let start = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
    let mut stale = TaskSlot::new("Q1");
    stale.is_running = true;
    stale.start_time = Some(start);
    let mut fresh = TaskSlot::new("Q2");
    fresh.is_running = true;
    fresh.start_time = Some(start + chrono::Duration::hours(20));

    let store = Arc::new(InMemorySlotStore::with_rows([stale, fresh]));
    let clock = Arc::new(ManualClock::new(start + chrono::Duration::hours(29)));
    let coordinator = Arc::new(
        SlotCoordinator::new(store.clone())
            .with_clock(clock)
            .with_max_task_duration(MAX_TASK_DURATION),
    );

    let reaper = OrphanReaper::new(coordinator, Duration::from_millis(10));
    let token = reaper.shutdown_token();
    let handle = reaper.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    let total = handle.await.unwrap();

    assert_eq!(total, 1);
    let q1 = store.get("Q1").unwrap().unwrap();
    assert!(!q1.is_running);
    assert!(q1.stop_requested());
    assert!(store.get("Q2").unwrap().unwrap().is_running);
}

#[tokio::test]
async fn test_reaper_zero_interval_is_raised() {
    let coordinator = Arc::new(SlotCoordinator::new(Arc::new(InMemorySlotStore::new())));
    let reaper = OrphanReaper::new(coordinator, Duration::ZERO);
    assert_eq!(reaper.sweep_interval(), MIN_SWEEP_INTERVAL);

    let token = reaper.shutdown_token();
    let handle = reaper.start();
    tokio::time::sleep(Duration::from_millis(5)).await;
    token.cancel();
    assert_eq!(handle.await.unwrap(), 0);
}
