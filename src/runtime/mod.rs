//! Runtime adapters: boundary API models and background tasks.

pub mod api;
pub mod reaper;

pub use api::{claim_lane, ClaimRequest, ClaimResponse, ErrorResponse, LaneStatusResponse};
pub use reaper::{OrphanReaper, MIN_SWEEP_INTERVAL};
