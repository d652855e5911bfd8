//! Lane coordinator: acquire, release, interrupt and query named lanes.
//!
//! A single [`SlotCoordinator`] is built at process start and shared through an
//! `Arc`. It holds no lane state of its own; every decision is made against the
//! [`SlotStore`], so several processes pointed at the same store coordinate
//! with each other.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::audit::{build_audit_event_at, AuditSink, SlotAction};
use crate::core::slot::{ClaimOutcome, SlotField, SlotFilter, SlotPatch, SortBy, TaskSlot};
use crate::core::window::{parse_time_of_day, BusinessWindow};
use crate::core::{SlotError, SlotStore};
use crate::util::clock::{Clock, SystemClock};

/// Longest a lane may stay running before it is considered abandoned.
pub const MAX_TASK_DURATION: Duration = Duration::from_secs(28 * 60 * 60);

/// Trailing window for "recently completed" checks when none is configured.
pub const DEFAULT_RECENT_WINDOW_HOURS: u32 = 1;

/// Run context written on acquire. Every field is optional and opaque.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireRequest {
    /// Identity driving the run.
    pub designee: Option<String>,
    /// Opaque session identifier.
    pub session_id: Option<String>,
    /// Opaque amount.
    pub amount: Option<i64>,
    /// `HH:MM` closing time; enables business-hours mode.
    pub end_time: Option<String>,
    /// Who asked for the run.
    pub requester: Option<String>,
}

impl AcquireRequest {
    /// Set the designee.
    #[must_use]
    pub fn with_designee(mut self, designee: impl Into<String>) -> Self {
        self.designee = Some(designee.into());
        self
    }

    /// Set the session identifier.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the amount.
    #[must_use]
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set (or clear) the business-hours closing time.
    #[must_use]
    pub fn with_end_time(mut self, end_time: Option<&str>) -> Self {
        self.end_time = end_time.map(str::to_string);
        self
    }

    /// Set the requester.
    #[must_use]
    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }
}

fn to_delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

fn subtract(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(to_delta(duration))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Domain API over the lane store.
pub struct SlotCoordinator {
    store: Arc<dyn SlotStore>,
    clock: Arc<dyn Clock>,
    max_task_duration: Duration,
    recent_window_hours: u32,
    audit: Option<Arc<dyn AuditSink>>,
}

impl std::fmt::Debug for SlotCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotCoordinator")
            .field("max_task_duration", &self.max_task_duration)
            .field("recent_window_hours", &self.recent_window_hours)
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl SlotCoordinator {
    /// Coordinator over `store` using the system clock and a 28 hour limit.
    #[must_use]
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            max_task_duration: MAX_TASK_DURATION,
            recent_window_hours: DEFAULT_RECENT_WINDOW_HOURS,
            audit: None,
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the stale-run limit used by the orphan sweep and claims.
    #[must_use]
    pub fn with_max_task_duration(mut self, limit: Duration) -> Self {
        self.max_task_duration = limit;
        self
    }

    /// Replace the trailing window used by
    /// [`recently_completed_in_window`](Self::recently_completed_in_window).
    #[must_use]
    pub fn with_recent_window_hours(mut self, hours: u32) -> Self {
        self.recent_window_hours = hours;
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SlotStore> {
        &self.store
    }

    /// Configured "recently completed" window in hours.
    #[must_use]
    pub const fn recent_window_hours(&self) -> u32 {
        self.recent_window_hours
    }

    /// Configured stale-run limit.
    #[must_use]
    pub const fn max_task_duration(&self) -> Duration {
        self.max_task_duration
    }

    /// Current instant according to the coordinator's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn record(&self, lane: &str, action: SlotAction, detail: Option<String>) {
        if let Some(sink) = &self.audit {
            let created_at_ms = u128::try_from(self.now().timestamp_millis()).unwrap_or_default();
            sink.record(build_audit_event_at(lane, action, detail, created_at_ms));
        }
    }

    fn acquire_patch(&self, request: &AcquireRequest) -> Result<SlotPatch, SlotError> {
        let schedule = match request.end_time.as_deref() {
            Some(stop) => {
                let window = BusinessWindow::new(self.clock.time_of_day(), parse_time_of_day(stop)?);
                Some(window.to_scheduled_stop())
            }
            None => None,
        };
        Ok(SlotPatch {
            is_running: Some(true),
            start_time: Some(Some(self.now())),
            end_time: Some(None),
            designee: Some(request.designee.clone()),
            session_id: Some(request.session_id.clone()),
            amount: Some(request.amount),
            requester: Some(request.requester.clone()),
            force_stop: Some(false),
            erro_login: Some(false),
            business_hours: Some(schedule.is_some()),
            scheduled_stop: Some(schedule),
            progress: None,
        })
    }

    /// Check whether `name` may be acquired.
    ///
    /// A run older than `max_duration` is force-closed here (stop flag raised)
    /// and the lane reported available. This is a read followed by a separate
    /// write: two callers can both see "available". Use
    /// [`try_acquire`](Self::try_acquire) when exclusion matters.
    ///
    /// # Errors
    ///
    /// [`SlotError::Busy`] while a live run holds the lane.
    pub fn is_available(&self, name: &str, max_duration: Duration) -> Result<bool, SlotError> {
        let Some(slot) = self.store.get(name)? else {
            return Ok(true);
        };
        if !slot.is_running {
            return Ok(true);
        }
        let now = self.now();
        match slot.elapsed(now) {
            Some(elapsed) if elapsed >= to_delta(max_duration) => {
                self.store
                    .update_many(&SlotFilter::named(name), &SlotPatch::interrupted(now))?;
                tracing::warn!(
                    lane = name,
                    elapsed_secs = elapsed.num_seconds(),
                    "force-expired stale lane"
                );
                self.record(name, SlotAction::Expire, None);
                Ok(true)
            }
            _ => Err(SlotError::Busy(name.to_string())),
        }
    }

    /// Mark `name` as running with the given context, unconditionally.
    ///
    /// With `end_time` the lane enters business-hours mode with the window
    /// `{start: now, stop: end_time}`.
    ///
    /// # Errors
    ///
    /// [`SlotError::InvalidWindow`] for a malformed `end_time`; store failures.
    pub fn acquire(&self, name: &str, request: &AcquireRequest) -> Result<(), SlotError> {
        let patch = self.acquire_patch(request)?;
        self.store.upsert_by_key(name, &patch)?;
        tracing::info!(
            lane = name,
            designee = request.designee.as_deref().unwrap_or("-"),
            business_hours = request.end_time.is_some(),
            "lane acquired"
        );
        self.record(name, SlotAction::Acquire, request.designee.clone());
        Ok(())
    }

    /// Claim `name` in one conditional write: succeeds if the lane is free or
    /// its run is older than `max_duration`.
    ///
    /// # Errors
    ///
    /// [`SlotError::Busy`] while a live run holds the lane;
    /// [`SlotError::InvalidWindow`]; store failures.
    pub fn try_acquire(
        &self,
        name: &str,
        request: &AcquireRequest,
        max_duration: Duration,
    ) -> Result<ClaimOutcome, SlotError> {
        let patch = self.acquire_patch(request)?;
        let cutoff = subtract(self.now(), max_duration);
        let outcome = self.store.claim(name, cutoff, &patch)?;
        match &outcome {
            ClaimOutcome::Busy { .. } => {
                tracing::debug!(lane = name, "lane busy");
                return Err(SlotError::Busy(name.to_string()));
            }
            ClaimOutcome::Recovered { previous_start } => {
                tracing::warn!(lane = name, ?previous_start, "recovered stale lane");
                self.record(name, SlotAction::Recover, None);
            }
            ClaimOutcome::Claimed => {}
        }
        tracing::info!(lane = name, "lane acquired");
        self.record(name, SlotAction::Acquire, request.designee.clone());
        Ok(outcome)
    }

    /// End the run on `name`. Does nothing if the lane has no record.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn release(&self, name: &str, login_error: bool) -> Result<(), SlotError> {
        let changed = self.store.update_many(
            &SlotFilter::named(name),
            &SlotPatch::release(self.now(), login_error),
        )?;
        if changed == 0 {
            tracing::debug!(lane = name, "release on unknown or unchanged lane");
        } else {
            tracing::info!(lane = name, login_error, "lane released");
            self.record(name, SlotAction::Release, login_error.then(|| "login error".into()));
        }
        Ok(())
    }

    /// Raise the cooperative stop flag. Returns whether the row changed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn request_interrupt(&self, name: &str) -> Result<bool, SlotError> {
        let changed =
            self.store
                .update_many(&SlotFilter::named(name), &SlotPatch::stop_request())?
                > 0;
        if changed {
            tracing::info!(lane = name, "interrupt requested");
            self.record(name, SlotAction::Interrupt, None);
        }
        Ok(changed)
    }

    /// Current stop flag; false for unknown lanes.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn is_interrupted(&self, name: &str) -> Result<bool, SlotError> {
        Ok(self.store.get(name)?.is_some_and(|slot| slot.stop_requested()))
    }

    fn window_of(slot: &TaskSlot) -> Result<Option<BusinessWindow>, SlotError> {
        if !slot.business_hours {
            return Ok(None);
        }
        slot.scheduled_stop
            .as_ref()
            .map(BusinessWindow::parse)
            .transpose()
    }

    /// Poll answer for a running worker.
    ///
    /// Polarity depends on the lane's mode. In business-hours mode the result
    /// is `true` while the clock is **inside** the window, meaning the worker
    /// should keep going. Otherwise the result is the stop flag, `true` meaning
    /// stop; a row that never had the flag set (never acquired) reads `true`.
    /// Prefer [`keep_running`](Self::keep_running) in new code.
    ///
    /// # Errors
    ///
    /// [`SlotError::NotFound`] for unknown lanes; [`SlotError::InvalidWindow`]
    /// for a corrupt stored window; store failures.
    pub fn should_stop(&self, name: &str) -> Result<bool, SlotError> {
        let slot = self
            .store
            .get(name)?
            .ok_or_else(|| SlotError::NotFound(name.to_string()))?;
        match Self::window_of(&slot)? {
            Some(window) => Ok(window.contains(self.clock.time_of_day())),
            None => Ok(slot.force_stop.unwrap_or(true)),
        }
    }

    /// Whether the worker on `name` should continue: inside the window in
    /// business-hours mode, otherwise while the stop flag is explicitly off.
    ///
    /// # Errors
    ///
    /// Same as [`should_stop`](Self::should_stop).
    pub fn keep_running(&self, name: &str) -> Result<bool, SlotError> {
        let slot = self
            .store
            .get(name)?
            .ok_or_else(|| SlotError::NotFound(name.to_string()))?;
        match Self::window_of(&slot)? {
            Some(window) => Ok(window.contains(self.clock.time_of_day())),
            None => Ok(!slot.force_stop.unwrap_or(true)),
        }
    }

    /// Rewrite the operating window of an existing lane to `{start: now,
    /// stop}`. Turning business hours off clears the window. Returns whether
    /// the row changed.
    ///
    /// # Errors
    ///
    /// [`SlotError::InvalidWindow`]; store failures.
    pub fn set_schedule(
        &self,
        name: &str,
        stop: &str,
        business_hours: bool,
    ) -> Result<bool, SlotError> {
        let stop = parse_time_of_day(stop)?;
        let schedule = business_hours
            .then(|| BusinessWindow::new(self.clock.time_of_day(), stop).to_scheduled_stop());
        let patch = SlotPatch {
            business_hours: Some(business_hours),
            scheduled_stop: Some(schedule),
            ..SlotPatch::default()
        };
        Ok(self.store.update_many(&SlotFilter::named(name), &patch)? > 0)
    }

    /// Store a progress blob verbatim, creating the row if needed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn update_progress(&self, name: &str, progress: Value) -> Result<(), SlotError> {
        let patch = SlotPatch {
            progress: Some(Some(progress)),
            ..SlotPatch::default()
        };
        self.store.upsert_by_key(name, &patch).map(|_| ())
    }

    /// Last stored progress blob.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn get_progress(&self, name: &str) -> Result<Option<Value>, SlotError> {
        Ok(self.store.get(name)?.and_then(|slot| slot.progress))
    }

    /// Assign (or clear) the designee of a lane, creating the row if needed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn set_designee(&self, name: &str, designee: Option<&str>) -> Result<(), SlotError> {
        let patch = SlotPatch {
            designee: Some(designee.map(str::to_string)),
            ..SlotPatch::default()
        };
        self.store.upsert_by_key(name, &patch).map(|_| ())
    }

    /// Whether `name` is currently marked running.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn is_running(&self, name: &str) -> Result<bool, SlotError> {
        Ok(self.store.get(name)?.is_some_and(|slot| slot.is_running))
    }

    /// Running lanes whose name contains `pattern`, ignoring case.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn active_lanes(&self, pattern: &str) -> Result<Vec<TaskSlot>, SlotError> {
        self.store
            .find_many(&SlotFilter::running().name_containing(pattern))
    }

    /// Whether `designee` is running on any lane other than `name`.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn is_designee_running_elsewhere(
        &self,
        name: &str,
        designee: &str,
    ) -> Result<bool, SlotError> {
        let filter = SlotFilter::running().with_designee(designee).excluding(name);
        Ok(self.store.find_one(&filter, None)?.is_some())
    }

    /// Number of distinct lanes currently running for `designee`.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn count_active_lanes_for_designee(&self, designee: &str) -> Result<usize, SlotError> {
        let lanes = self.store.distinct_values(
            SlotField::TaskName,
            &SlotFilter::running().with_designee(designee),
        )?;
        Ok(lanes.len())
    }

    /// Most recent acquire time across all lanes for `designee`.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn last_used(&self, designee: &str) -> Result<Option<DateTime<Utc>>, SlotError> {
        let latest = self.store.find_one(
            &SlotFilter::all().with_designee(designee),
            Some(SortBy::StartTimeDesc),
        )?;
        Ok(latest.and_then(|slot| slot.start_time))
    }

    /// Whether `name` is idle and was released within the last `hours`.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn recently_completed(&self, name: &str, hours: u32) -> Result<bool, SlotError> {
        let threshold = subtract(self.now(), Duration::from_secs(u64::from(hours) * 3600));
        let filter = SlotFilter::named(name)
            .with_running(false)
            .ended_after(threshold);
        Ok(self.store.find_one(&filter, None)?.is_some())
    }

    /// [`recently_completed`](Self::recently_completed) over the configured
    /// trailing window.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn recently_completed_in_window(&self, name: &str) -> Result<bool, SlotError> {
        self.recently_completed(name, self.recent_window_hours)
    }

    /// Force-close every lane running longer than the configured limit.
    /// Returns how many lanes were closed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn expire_orphaned(&self) -> Result<usize, SlotError> {
        let now = self.now();
        let cutoff = subtract(now, self.max_task_duration);
        let expired = self.store.update_many(
            &SlotFilter::running().started_no_later_than(cutoff),
            &SlotPatch::interrupted(now),
        )?;
        if expired > 0 {
            tracing::warn!(expired, "expired orphaned lanes");
            self.record("*", SlotAction::Expire, Some(format!("{expired} lanes")));
        }
        Ok(expired)
    }

    /// Close every running lane with the stop flag raised. Safe to repeat:
    /// a second pass finds nothing running and changes nothing.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn interrupt_all_running(&self) -> Result<usize, SlotError> {
        let closed = self
            .store
            .update_many(&SlotFilter::running(), &SlotPatch::interrupted(self.now()))?;
        tracing::info!(closed, "marked running lanes as interrupted");
        if closed > 0 {
            self.record("*", SlotAction::Sweep, Some(format!("{closed} lanes")));
        }
        Ok(closed)
    }

    /// Record for `name`, if any.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn slot(&self, name: &str) -> Result<Option<TaskSlot>, SlotError> {
        self.store.get(name)
    }
}
