//! Tracing setup for binaries and tests that embed the coordinator.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "prometheus_slot_coordinator=info";

/// Install an env-filtered fmt subscriber unless one is already set.
///
/// `RUST_LOG` wins over `fallback`; pass `None` to use [`DEFAULT_LOG_FILTER`].
pub fn init_tracing(fallback: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback.unwrap_or(DEFAULT_LOG_FILTER)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
