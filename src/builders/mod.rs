//! Builders to construct the coordinator stack from configuration.

pub mod coordinator_builder;

pub use coordinator_builder::{build_coordinator, build_store, CoordinatorBuilder, CoordinatorStack};
