//! Lane model, coordination logic and shutdown handling.

pub mod audit;
pub mod coordinator;
pub mod error;
pub mod selector;
pub mod shutdown;
pub mod slot;
pub mod store;
pub mod window;

pub use audit::{
    build_audit_event, build_audit_event_at, AuditEvent, AuditSink, InMemoryAuditSink, SlotAction,
};
pub use coordinator::{
    AcquireRequest, SlotCoordinator, DEFAULT_RECENT_WINDOW_HOURS, MAX_TASK_DURATION,
};
pub use error::{AppResult, SlotError};
pub use selector::{QueueSelector, DEFAULT_POOL_SIZE};
pub use shutdown::{
    CompensatingAction, ExitPolicy, InterruptRunningSlots, ProcessLedger, ResetStartedProcesses,
    ShutdownHook, SweepReport, DEFAULT_ACTION_TIMEOUT,
};
pub use slot::{
    ClaimOutcome, NameMatch, ScheduledStop, SlotField, SlotFilter, SlotPatch, SortBy, TaskSlot,
};
pub use store::SlotStore;
pub use window::{is_within_window, BusinessWindow};
