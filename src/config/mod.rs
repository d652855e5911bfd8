//! Configuration models for the coordinator, store backends and shutdown.

pub mod coordinator;

pub use coordinator::{CoordinatorConfig, ShutdownConfig, StoreBackendConfig};
