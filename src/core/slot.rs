//! Lane records and the filter/patch vocabulary used to query and mutate them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operating window persisted on a lane, as `HH:MM` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledStop {
    /// Time of day the window opened (set at acquire).
    pub start: String,
    /// Time of day the window closes.
    pub stop: String,
}

/// One persisted row per named execution lane.
///
/// Field names are the persisted layout and must not be renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSlot {
    /// Unique lane name.
    pub task_name: String,
    /// True while a worker holds the lane.
    #[serde(default)]
    pub is_running: bool,
    /// Last acquire time.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Last release time; cleared while running.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Identity driving the run.
    #[serde(default)]
    pub designee: Option<String>,
    /// Opaque run metadata.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Opaque run metadata.
    #[serde(default)]
    pub amount: Option<i64>,
    /// Opaque run metadata.
    #[serde(default)]
    pub requester: Option<String>,
    /// Cooperative termination request. Absent on rows that were never
    /// acquired or interrupted; [`should_stop`](crate::core::SlotCoordinator::should_stop)
    /// reads an absent flag as "stop".
    #[serde(default)]
    pub force_stop: Option<bool>,
    /// Set on release when the run ended on an authentication failure.
    #[serde(default)]
    pub erro_login: bool,
    /// When true the operating window decides whether the run continues.
    #[serde(default)]
    pub business_hours: bool,
    /// Operating window, present only with `business_hours`.
    #[serde(default)]
    pub scheduled_stop: Option<ScheduledStop>,
    /// Free-form progress blob.
    #[serde(default)]
    pub progress: Option<Value>,
}

impl TaskSlot {
    /// Blank, never-acquired record for a lane.
    #[must_use]
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            is_running: false,
            start_time: None,
            end_time: None,
            designee: None,
            session_id: None,
            amount: None,
            requester: None,
            force_stop: None,
            erro_login: false,
            business_hours: false,
            scheduled_stop: None,
            progress: None,
        }
    }

    /// Whether a stop was explicitly requested.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.force_stop == Some(true)
    }

    /// Time since the last acquire, if the lane was ever acquired.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.start_time.map(|started| now - started)
    }
}

/// Fields that support distinct-value aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotField {
    /// `task_name`
    TaskName,
    /// `designee`
    Designee,
}

impl SlotField {
    /// Read the field as a string, if set.
    #[must_use]
    pub fn read(self, slot: &TaskSlot) -> Option<&str> {
        match self {
            Self::TaskName => Some(slot.task_name.as_str()),
            Self::Designee => slot.designee.as_deref(),
        }
    }
}

/// Ordering applied when a lookup may match several rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// Most recent `start_time` first; never-acquired rows last.
    StartTimeDesc,
}

/// Predicate on `task_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    /// Exactly this name.
    Exact(String),
    /// Any name except this one.
    Not(String),
    /// Name contains the pattern, ignoring ASCII case.
    ContainsIgnoreCase(String),
}

impl NameMatch {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(n) => name == n,
            Self::Not(n) => name != n,
            Self::ContainsIgnoreCase(p) => name
                .to_ascii_lowercase()
                .contains(&p.to_ascii_lowercase()),
        }
    }
}

/// Conjunction of optional conditions; an empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotFilter {
    /// Condition on the lane name.
    pub name: Option<NameMatch>,
    /// Condition on `is_running`.
    pub is_running: Option<bool>,
    /// Condition on `designee`.
    pub designee: Option<String>,
    /// `start_time` is set and at or before this instant.
    pub started_no_later_than: Option<DateTime<Utc>>,
    /// `end_time` is set and strictly after this instant.
    pub ended_after: Option<DateTime<Utc>>,
}

impl SlotFilter {
    /// Filter matching every row.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching exactly one lane.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(NameMatch::Exact(name.into())),
            ..Self::default()
        }
    }

    /// Filter matching running lanes.
    #[must_use]
    pub fn running() -> Self {
        Self {
            is_running: Some(true),
            ..Self::default()
        }
    }

    /// Restrict on `is_running`.
    #[must_use]
    pub fn with_running(mut self, running: bool) -> Self {
        self.is_running = Some(running);
        self
    }

    /// Exclude one lane by name.
    #[must_use]
    pub fn excluding(mut self, name: impl Into<String>) -> Self {
        self.name = Some(NameMatch::Not(name.into()));
        self
    }

    /// Restrict to names containing `pattern`, ignoring case.
    #[must_use]
    pub fn name_containing(mut self, pattern: impl Into<String>) -> Self {
        self.name = Some(NameMatch::ContainsIgnoreCase(pattern.into()));
        self
    }

    /// Restrict on designee.
    #[must_use]
    pub fn with_designee(mut self, designee: impl Into<String>) -> Self {
        self.designee = Some(designee.into());
        self
    }

    /// Restrict to rows started at or before `cutoff`.
    #[must_use]
    pub fn started_no_later_than(mut self, cutoff: DateTime<Utc>) -> Self {
        self.started_no_later_than = Some(cutoff);
        self
    }

    /// Restrict to rows released after `threshold`.
    #[must_use]
    pub fn ended_after(mut self, threshold: DateTime<Utc>) -> Self {
        self.ended_after = Some(threshold);
        self
    }

    /// Evaluate the filter against a row.
    #[must_use]
    pub fn matches(&self, slot: &TaskSlot) -> bool {
        if let Some(name) = &self.name {
            if !name.matches(&slot.task_name) {
                return false;
            }
        }
        if let Some(running) = self.is_running {
            if slot.is_running != running {
                return false;
            }
        }
        if let Some(designee) = &self.designee {
            if slot.designee.as_deref() != Some(designee.as_str()) {
                return false;
            }
        }
        if let Some(cutoff) = self.started_no_later_than {
            if !slot.start_time.is_some_and(|s| s <= cutoff) {
                return false;
            }
        }
        if let Some(threshold) = self.ended_after {
            if !slot.end_time.is_some_and(|e| e > threshold) {
                return false;
            }
        }
        true
    }
}

/// Partial update; `None` leaves a field untouched.
///
/// Nullable fields use `Option<Option<_>>` so a patch can clear them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotPatch {
    /// New `is_running`.
    pub is_running: Option<bool>,
    /// New `start_time`.
    pub start_time: Option<Option<DateTime<Utc>>>,
    /// New `end_time`.
    pub end_time: Option<Option<DateTime<Utc>>>,
    /// New `designee`.
    pub designee: Option<Option<String>>,
    /// New `session_id`.
    pub session_id: Option<Option<String>>,
    /// New `amount`.
    pub amount: Option<Option<i64>>,
    /// New `requester`.
    pub requester: Option<Option<String>>,
    /// New `force_stop`.
    pub force_stop: Option<bool>,
    /// New `erro_login`.
    pub erro_login: Option<bool>,
    /// New `business_hours`.
    pub business_hours: Option<bool>,
    /// New `scheduled_stop`.
    pub scheduled_stop: Option<Option<ScheduledStop>>,
    /// New `progress`.
    pub progress: Option<Option<Value>>,
}

macro_rules! set_if {
    ($patch:expr, $slot:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$patch.$field {
                $slot.$field = value.clone();
            }
        )+
    };
}

impl SlotPatch {
    /// Apply the patch; returns whether the row changed.
    pub fn apply(&self, slot: &mut TaskSlot) -> bool {
        let before = slot.clone();
        set_if!(
            self,
            slot,
            is_running,
            start_time,
            end_time,
            designee,
            session_id,
            amount,
            requester,
            erro_login,
            business_hours,
            scheduled_stop,
            progress,
        );
        if let Some(flag) = self.force_stop {
            slot.force_stop = Some(flag);
        }
        *slot != before
    }

    /// Normal end of a run.
    #[must_use]
    pub fn release(now: DateTime<Utc>, login_error: bool) -> Self {
        Self {
            is_running: Some(false),
            end_time: Some(Some(now)),
            erro_login: Some(login_error),
            ..Self::default()
        }
    }

    /// Forced end of a run: stale recovery and shutdown sweeps.
    #[must_use]
    pub fn interrupted(now: DateTime<Utc>) -> Self {
        Self {
            is_running: Some(false),
            end_time: Some(Some(now)),
            force_stop: Some(true),
            ..Self::default()
        }
    }

    /// Raise the cooperative stop flag only.
    #[must_use]
    pub fn stop_request() -> Self {
        Self {
            force_stop: Some(true),
            ..Self::default()
        }
    }
}

/// Result of an atomic conditional claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Lane was free (or absent) and is now held.
    Claimed,
    /// Lane was stuck past the maximum duration and has been taken over.
    Recovered {
        /// Start time of the abandoned run.
        previous_start: Option<DateTime<Utc>>,
    },
    /// Lane is held by a live run; nothing was written.
    Busy {
        /// Start time of the live run.
        started: Option<DateTime<Utc>>,
    },
}

impl ClaimOutcome {
    /// Whether the caller now holds the lane.
    #[must_use]
    pub const fn is_claimed(&self) -> bool {
        !matches!(self, Self::Busy { .. })
    }
}
