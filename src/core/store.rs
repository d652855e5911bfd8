//! Storage contract for lane records.

use chrono::{DateTime, Utc};

use crate::core::slot::{ClaimOutcome, SlotField, SlotFilter, SlotPatch, SortBy, TaskSlot};
use crate::core::SlotError;

/// Durable storage holding one [`TaskSlot`] per lane name.
///
/// Every call is atomic for the rows it touches; nothing spans calls. Backends
/// surface their failures as [`SlotError::Backend`] and never retry.
pub trait SlotStore: Send + Sync {
    /// Apply `patch` to the row for `name`, creating a blank row first if
    /// absent. Returns whether anything changed.
    fn upsert_by_key(&self, name: &str, patch: &SlotPatch) -> Result<bool, SlotError>;

    /// First row matching `filter`, in `sort` order when given.
    fn find_one(
        &self,
        filter: &SlotFilter,
        sort: Option<SortBy>,
    ) -> Result<Option<TaskSlot>, SlotError>;

    /// Every row matching `filter`, ordered by name.
    fn find_many(&self, filter: &SlotFilter) -> Result<Vec<TaskSlot>, SlotError>;

    /// Apply `patch` to every matching row; returns how many changed.
    fn update_many(&self, filter: &SlotFilter, patch: &SlotPatch) -> Result<usize, SlotError>;

    /// Distinct non-null values of `field` among matching rows, sorted.
    fn distinct_values(
        &self,
        field: SlotField,
        filter: &SlotFilter,
    ) -> Result<Vec<String>, SlotError>;

    /// Single conditional write: apply `patch` to `name` only if the row is
    /// absent, not running, or running with `start_time <= stale_cutoff`.
    fn claim(
        &self,
        name: &str,
        stale_cutoff: DateTime<Utc>,
        patch: &SlotPatch,
    ) -> Result<ClaimOutcome, SlotError>;

    /// Point lookup by lane name.
    fn get(&self, name: &str) -> Result<Option<TaskSlot>, SlotError> {
        self.find_one(&SlotFilter::named(name), None)
    }
}
