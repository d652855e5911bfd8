//! Builders to construct the coordinator stack from configuration.

use std::sync::Arc;

use crate::config::{CoordinatorConfig, StoreBackendConfig};
use crate::core::{
    AuditSink, InMemoryAuditSink, ProcessLedger, QueueSelector, ShutdownHook, SlotCoordinator,
    SlotError, SlotStore,
};
use crate::infra::store::{FileSlotStore, InMemorySlotStore};
use crate::util::clock::Clock;

/// Open the store selected by the configuration.
///
/// # Errors
///
/// Backend failures while opening a file store.
pub fn build_store(cfg: &StoreBackendConfig) -> Result<Arc<dyn SlotStore>, SlotError> {
    let store: Arc<dyn SlotStore> = match cfg {
        StoreBackendConfig::InMemory => Arc::new(InMemorySlotStore::new()),
        StoreBackendConfig::File { path, stream } => Arc::new(FileSlotStore::open(path, stream.as_str())?),
    };
    Ok(store)
}

/// Everything a process needs to coordinate lanes, built once at startup.
#[derive(Debug, Clone)]
pub struct CoordinatorStack {
    /// Shared coordinator.
    pub coordinator: Arc<SlotCoordinator>,
    /// Selector over the coordinator.
    pub selector: QueueSelector,
    /// Audit buffer, absent when disabled.
    pub audit: Option<Arc<InMemoryAuditSink>>,
    /// Configuration the stack was built from.
    pub config: CoordinatorConfig,
}

impl CoordinatorStack {
    /// Shutdown hook closing running lanes and, with a ledger, resetting
    /// started processes.
    #[must_use]
    pub fn shutdown_hook(&self, ledger: Option<Arc<dyn ProcessLedger>>) -> Arc<ShutdownHook> {
        Arc::new(
            ShutdownHook::for_coordinator(Arc::clone(&self.coordinator), ledger)
                .with_action_timeout(self.config.shutdown.action_timeout()),
        )
    }
}

/// Builder for [`CoordinatorStack`].
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    store: Option<Arc<dyn SlotStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoordinatorBuilder {
    /// Start from a configuration.
    #[must_use]
    pub const fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            store: None,
            clock: None,
        }
    }

    /// Use this store instead of the configured backend.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SlotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this clock instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Configuration being built.
    #[must_use]
    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Validate the configuration and assemble the stack.
    ///
    /// # Errors
    ///
    /// Invalid configuration or store failures.
    pub fn build(self) -> Result<CoordinatorStack, SlotError> {
        self.config
            .validate()
            .map_err(|e| SlotError::Backend(format!("config invalid: {e}")))?;

        let store = match self.store {
            Some(store) => store,
            None => build_store(&self.config.store)?,
        };
        let mut coordinator = SlotCoordinator::new(store)
            .with_max_task_duration(self.config.max_task_duration())
            .with_recent_window_hours(self.config.recent_window_hours);
        if let Some(clock) = self.clock {
            coordinator = coordinator.with_clock(clock);
        }
        let audit = (self.config.audit_capacity > 0)
            .then(|| Arc::new(InMemoryAuditSink::new(self.config.audit_capacity)));
        if let Some(sink) = &audit {
            coordinator = coordinator.with_audit(Arc::clone(sink) as Arc<dyn AuditSink>);
        }

        let coordinator = Arc::new(coordinator);
        let selector =
            QueueSelector::new(Arc::clone(&coordinator)).with_pool_size(self.config.pool_size);
        tracing::info!(
            pool_size = self.config.pool_size,
            max_task_duration_secs = self.config.max_task_duration_secs,
            "coordinator built"
        );
        Ok(CoordinatorStack {
            coordinator,
            selector,
            audit,
            config: self.config,
        })
    }
}

/// Build the coordinator stack straight from configuration.
///
/// # Errors
///
/// Same as [`CoordinatorBuilder::build`].
pub fn build_coordinator(cfg: &CoordinatorConfig) -> Result<CoordinatorStack, SlotError> {
    CoordinatorBuilder::new(cfg.clone()).build()
}
