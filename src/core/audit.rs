//! Audit trail for lane lifecycle events.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::util::clock::now_ms;

/// Lifecycle transitions recorded by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    /// Lane claimed by a worker.
    Acquire,
    /// Stuck lane taken over by a new claim.
    Recover,
    /// Lane released by its worker.
    Release,
    /// Cooperative stop requested.
    Interrupt,
    /// Stale run force-closed.
    Expire,
    /// Running lanes closed by the shutdown sweep.
    Sweep,
}

impl SlotAction {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Acquire => "acquire",
            Self::Recover => "recover",
            Self::Release => "release",
            Self::Interrupt => "interrupt",
            Self::Expire => "expire",
            Self::Sweep => "sweep",
        }
    }
}

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Lane name, or `*` for bulk operations.
    pub lane: String,
    /// What happened.
    pub action: SlotAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// Bounded in-memory audit sink; oldest events are evicted first.
#[derive(Debug)]
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Actions recorded for one lane, oldest first.
    #[must_use]
    pub fn actions_for(&self, lane: &str) -> Vec<SlotAction> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.lane == lane)
            .map(|e| e.action)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Build an audit event stamped with a fresh id and the current time.
#[must_use]
pub fn build_audit_event(
    lane: impl Into<String>,
    action: SlotAction,
    detail: Option<String>,
) -> AuditEvent {
    build_audit_event_at(lane, action, detail, now_ms())
}

/// Build an audit event stamped with a fresh id and the given time.
#[must_use]
pub fn build_audit_event_at(
    lane: impl Into<String>,
    action: SlotAction,
    detail: Option<String>,
    created_at_ms: u128,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        lane: lane.into(),
        action,
        created_at_ms,
        detail,
    }
}
