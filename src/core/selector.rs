//! Lane selection over a fixed pool of numbered lanes.

use std::sync::Arc;

use crate::core::coordinator::{AcquireRequest, SlotCoordinator};
use crate::core::{ClaimOutcome, SlotError};

/// Pool size used when none is configured.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Names of the lanes in a pool, in probe order: `base1`, `base2`, ...
#[must_use]
pub fn candidates(base_name: &str, pool_size: usize) -> impl Iterator<Item = String> + '_ {
    (1..=pool_size).map(move |i| format!("{base_name}{i}"))
}

/// Claims the first free lane of a pool.
///
/// Probing always starts at lane 1; there is no rotation between calls.
#[derive(Debug, Clone)]
pub struct QueueSelector {
    coordinator: Arc<SlotCoordinator>,
    pool_size: usize,
}

impl QueueSelector {
    /// Selector over pools of [`DEFAULT_POOL_SIZE`] lanes.
    #[must_use]
    pub const fn new(coordinator: Arc<SlotCoordinator>) -> Self {
        Self {
            coordinator,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    /// Change the default pool size.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Configured pool size.
    #[must_use]
    pub const fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Coordinator used for claims.
    #[must_use]
    pub const fn coordinator(&self) -> &Arc<SlotCoordinator> {
        &self.coordinator
    }

    /// Claim the first free lane of `base_name` using the configured size.
    ///
    /// # Errors
    ///
    /// [`SlotError::AllQueuesBusy`] when every lane is held; any non-busy
    /// error from the coordinator is returned as-is.
    pub fn pick_from_pool(&self, base_name: &str, end_time: Option<&str>) -> Result<String, SlotError> {
        self.pick_from_pool_of(base_name, end_time, self.pool_size)
    }

    /// Claim the first free lane among `base1..=base{pool_size}`.
    ///
    /// # Errors
    ///
    /// Same as [`pick_from_pool`](Self::pick_from_pool).
    pub fn pick_from_pool_of(
        &self,
        base_name: &str,
        end_time: Option<&str>,
        pool_size: usize,
    ) -> Result<String, SlotError> {
        let request = AcquireRequest::default().with_end_time(end_time);
        self.pick_with(base_name, &request, pool_size)
    }

    /// Claim the first free lane with a full run context.
    ///
    /// # Errors
    ///
    /// Same as [`pick_from_pool`](Self::pick_from_pool).
    pub fn pick_with(
        &self,
        base_name: &str,
        request: &AcquireRequest,
        pool_size: usize,
    ) -> Result<String, SlotError> {
        let limit = self.coordinator.max_task_duration();
        for lane in candidates(base_name, pool_size) {
            match self.coordinator.try_acquire(&lane, request, limit) {
                Ok(_) => return Ok(lane),
                Err(SlotError::Busy(_)) => {}
                Err(e) => return Err(e),
            }
        }
        tracing::warn!(pool = base_name, pool_size, "every lane in pool is busy");
        Err(SlotError::AllQueuesBusy(base_name.to_string()))
    }

    /// Claim exactly the lane `name`.
    ///
    /// # Errors
    ///
    /// [`SlotError::AllQueuesBusy`] when it is held; other errors as-is.
    pub fn pick_named(&self, name: &str, end_time: Option<&str>) -> Result<bool, SlotError> {
        let request = AcquireRequest::default().with_end_time(end_time);
        self.pick_named_with(name, &request).map(|_| true)
    }

    /// Claim exactly the lane `name` with a full run context.
    ///
    /// # Errors
    ///
    /// Same as [`pick_named`](Self::pick_named).
    pub fn pick_named_with(
        &self,
        name: &str,
        request: &AcquireRequest,
    ) -> Result<ClaimOutcome, SlotError> {
        self.coordinator
            .try_acquire(name, request, self.coordinator.max_task_duration())
            .map_err(|e| match e {
                SlotError::Busy(_) => SlotError::AllQueuesBusy(name.to_string()),
                other => other,
            })
    }
}
