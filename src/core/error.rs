//! Error types for lane coordination.

use thiserror::Error;

/// Errors produced by the coordinator, selector and store backends.
#[derive(Debug, Error)]
pub enum SlotError {
    /// Lane is running and has not exceeded the maximum duration.
    #[error("lane busy: {0}")]
    Busy(String),
    /// Every candidate lane in a pool is busy.
    #[error("all queues busy: {0}")]
    AllQueuesBusy(String),
    /// The operation needs an existing lane record.
    #[error("lane not found: {0}")]
    NotFound(String),
    /// A time-of-day value is not in `HH:MM` form.
    #[error("invalid window time: {0}")]
    InvalidWindow(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

impl SlotError {
    /// HTTP-style status code used when the error crosses the request boundary.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Busy(_) | Self::AllQueuesBusy(_) => 409,
            Self::NotFound(_) => 404,
            Self::InvalidWindow(_) => 400,
            Self::Backend(_) => 500,
        }
    }

    /// Whether the caller may try another lane.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
