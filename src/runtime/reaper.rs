//! Periodic orphan sweep.
//!
//! The coordinator never expires abandoned lanes on its own; a process that
//! wants it starts an [`OrphanReaper`] next to the coordinator.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::shutdown::run_blocking;
use crate::core::SlotCoordinator;

/// Shortest accepted sweep interval; smaller values are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Background task calling [`SlotCoordinator::expire_orphaned`] on a fixed
/// interval until cancelled.
#[derive(Debug)]
pub struct OrphanReaper {
    coordinator: Arc<SlotCoordinator>,
    every: Duration,
    shutdown_token: CancellationToken,
}

impl OrphanReaper {
    /// Reaper over `coordinator` firing every `every`, at least
    /// [`MIN_SWEEP_INTERVAL`].
    #[must_use]
    pub fn new(coordinator: Arc<SlotCoordinator>, every: Duration) -> Self {
        Self {
            coordinator,
            every: every.max(MIN_SWEEP_INTERVAL),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Stop together with another token, e.g. the shutdown hook's.
    #[must_use]
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    /// Effective sweep interval.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        self.every
    }

    /// Token that stops the reaper.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Run one sweep on the blocking pool; returns how many lanes were
    /// closed. Failures are logged and count as zero.
    pub async fn sweep_once(&self) -> usize {
        let coordinator = Arc::clone(&self.coordinator);
        match run_blocking(move || coordinator.expire_orphaned()).await {
            Ok(expired) => expired,
            Err(e) => {
                warn!("orphan sweep failed: {}", e);
                0
            }
        }
    }

    /// Spawn the loop on the current Tokio runtime. The returned handle
    /// resolves with the total number of lanes expired.
    pub fn start(self) -> JoinHandle<usize> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) -> usize {
        info!(interval_secs = self.every.as_secs(), "starting orphan reaper");
        let mut tick = interval(self.every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut total = 0;
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let expired = self.sweep_once().await;
                    debug!(expired, "orphan sweep cycle");
                    total += expired;
                }
                () = self.shutdown_token.cancelled() => {
                    info!(total, "stopping orphan reaper");
                    break;
                }
            }
        }
        total
    }
}
