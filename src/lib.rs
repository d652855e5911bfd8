//! # Prometheus Slot Coordinator
//!
//! Mutual exclusion over named execution lanes ("slots") for long-running
//! batch workers spread across processes.
//!
//! A worker claims a lane, polls it while working and releases it when done.
//! Lane state lives in a pluggable [`SlotStore`](core::SlotStore) so every
//! process sharing the store sees the same picture.
//!
//! ## Key Features
//!
//! - **Stale recovery**: a run older than the maximum task duration (28h by
//!   default) no longer blocks its lane
//! - **Atomic claims**: [`SlotCoordinator::try_acquire`](core::SlotCoordinator::try_acquire)
//!   checks and marks a lane in one store operation
//! - **Queue pools**: [`QueueSelector`](core::QueueSelector) hands out the
//!   first free lane among `Q1..QN`
//! - **Business hours**: lanes can carry a time-of-day window, including
//!   windows that wrap past midnight
//! - **Cooperative interrupts**: a stop flag workers poll between steps
//! - **Shutdown sweep**: [`ShutdownHook`](core::ShutdownHook) closes running
//!   lanes and resets started processes on termination
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_slot_coordinator::core::{AcquireRequest, SlotCoordinator, MAX_TASK_DURATION};
//! use prometheus_slot_coordinator::infra::InMemorySlotStore;
//!
//! let coordinator = SlotCoordinator::new(Arc::new(InMemorySlotStore::new()));
//! let request = AcquireRequest::default().with_designee("robot-7");
//! coordinator.try_acquire("Q1", &request, MAX_TASK_DURATION)?;
//! while coordinator.keep_running("Q1")? {
//!     // one unit of work
//! }
//! coordinator.release("Q1", false)?;
//! ```

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Lane model, coordinator, selector and shutdown handling.
pub mod core;
/// Configuration models for the store, limits and shutdown behavior.
pub mod config;
/// Builders to construct the coordinator stack from configuration.
pub mod builders;
/// Infrastructure adapters for lane stores and the process ledger.
pub mod infra;
/// Boundary API models and background tasks.
pub mod runtime;
/// Shared utilities.
pub mod util;
