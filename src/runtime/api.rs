//! Request/response models for the boundary that hands out lanes.

use serde::{Deserialize, Serialize};

use crate::core::{AcquireRequest, QueueSelector, SlotCoordinator, SlotError, TaskSlot};

/// Request to claim a lane from a pool, or one named lane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// Pool base name (`Q` probes `Q1..QN`) or the exact lane name.
    pub lane: String,
    /// Claim exactly `lane` instead of probing a pool.
    #[serde(default)]
    pub exact: bool,
    /// Pool size override.
    pub pool_size: Option<usize>,
    /// Run context.
    #[serde(default, flatten)]
    pub context: AcquireRequest,
}

/// Successful claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResponse {
    /// Lane now held by the caller.
    pub lane: String,
}

/// Failure mapped for the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// Human-readable detail.
    pub detail: String,
}

impl From<SlotError> for ErrorResponse {
    fn from(err: SlotError) -> Self {
        Self {
            status: err.status_code(),
            detail: err.to_string(),
        }
    }
}

/// Lane state exposed to pollers and dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneStatusResponse {
    /// Lane name.
    pub lane: String,
    /// Whether a worker holds it.
    pub running: bool,
    /// Whether a stop was requested.
    pub interrupted: bool,
    /// Designee of the last run.
    pub designee: Option<String>,
    /// Last progress blob.
    pub progress: Option<serde_json::Value>,
}

impl From<TaskSlot> for LaneStatusResponse {
    fn from(slot: TaskSlot) -> Self {
        let interrupted = slot.stop_requested();
        Self {
            lane: slot.task_name,
            running: slot.is_running,
            interrupted,
            designee: slot.designee,
            progress: slot.progress,
        }
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Number of lanes currently running.
    pub running_lanes: usize,
}

/// Claim a lane for a request.
///
/// # Errors
///
/// The coordinator error mapped to a status code (409 when busy).
pub fn claim_lane(
    selector: &QueueSelector,
    req: &ClaimRequest,
) -> Result<ClaimResponse, ErrorResponse> {
    if req.exact {
        selector.pick_named_with(&req.lane, &req.context)?;
        return Ok(ClaimResponse {
            lane: req.lane.clone(),
        });
    }
    let pool_size = req.pool_size.unwrap_or_else(|| selector.pool_size());
    let lane = selector.pick_with(&req.lane, &req.context, pool_size)?;
    Ok(ClaimResponse { lane })
}

/// Status of one lane.
///
/// # Errors
///
/// 404 for unknown lanes; store failures.
pub fn lane_status(
    coordinator: &SlotCoordinator,
    lane: &str,
) -> Result<LaneStatusResponse, ErrorResponse> {
    coordinator
        .slot(lane)?
        .map(LaneStatusResponse::from)
        .ok_or_else(|| SlotError::NotFound(lane.to_string()).into())
}

/// Health payload; unhealthy when the store cannot be read.
#[must_use]
pub fn health(coordinator: &SlotCoordinator) -> Health {
    match coordinator.active_lanes("") {
        Ok(lanes) => Health {
            ok: true,
            running_lanes: lanes.len(),
        },
        Err(e) => {
            tracing::warn!("health check failed: {}", e);
            Health {
                ok: false,
                running_lanes: 0,
            }
        }
    }
}
