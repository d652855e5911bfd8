//! In-memory lane store.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::core::{
    ClaimOutcome, SlotError, SlotField, SlotFilter, SlotPatch, SlotStore, SortBy, TaskSlot,
};

/// Lane rows keyed by name. Shared by the in-memory and file backends.
#[derive(Debug, Default, Clone)]
pub(crate) struct SlotTable {
    rows: BTreeMap<String, TaskSlot>,
}

impl SlotTable {
    pub(crate) fn from_rows(rows: impl IntoIterator<Item = TaskSlot>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| (row.task_name.clone(), row))
                .collect(),
        }
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &TaskSlot> {
        self.rows.values()
    }

    pub(crate) fn upsert(&mut self, name: &str, patch: &SlotPatch) -> bool {
        let mut created = false;
        let row = self.rows.entry(name.to_string()).or_insert_with(|| {
            created = true;
            TaskSlot::new(name)
        });
        patch.apply(row) || created
    }

    pub(crate) fn find_one(&self, filter: &SlotFilter, sort: Option<SortBy>) -> Option<TaskSlot> {
        let mut matching = self.rows.values().filter(|row| filter.matches(row));
        match sort {
            None => matching.next().cloned(),
            Some(SortBy::StartTimeDesc) => matching.max_by_key(|row| row.start_time).cloned(),
        }
    }

    pub(crate) fn find_many(&self, filter: &SlotFilter) -> Vec<TaskSlot> {
        self.rows
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect()
    }

    pub(crate) fn update_many(&mut self, filter: &SlotFilter, patch: &SlotPatch) -> usize {
        self.rows
            .values_mut()
            .filter(|row| filter.matches(row))
            .map(|row| patch.apply(row))
            .filter(|changed| *changed)
            .count()
    }

    pub(crate) fn distinct_values(&self, field: SlotField, filter: &SlotFilter) -> Vec<String> {
        self.rows
            .values()
            .filter(|row| filter.matches(row))
            .filter_map(|row| field.read(row).map(str::to_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub(crate) fn claim(
        &mut self,
        name: &str,
        stale_cutoff: DateTime<Utc>,
        patch: &SlotPatch,
    ) -> ClaimOutcome {
        let outcome = match self.rows.get(name) {
            Some(row) if row.is_running => match row.start_time {
                Some(started) if started <= stale_cutoff => ClaimOutcome::Recovered {
                    previous_start: Some(started),
                },
                started => return ClaimOutcome::Busy { started },
            },
            _ => ClaimOutcome::Claimed,
        };
        self.upsert(name, patch);
        outcome
    }
}

/// Lane store kept in process memory; contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySlotStore {
    table: Mutex<SlotTable>,
}

impl InMemorySlotStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with rows.
    #[must_use]
    pub fn with_rows(rows: impl IntoIterator<Item = TaskSlot>) -> Self {
        Self {
            table: Mutex::new(SlotTable::from_rows(rows)),
        }
    }

    /// Number of lane rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().rows().count()
    }

    /// Whether no lane row exists yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SlotStore for InMemorySlotStore {
    fn upsert_by_key(&self, name: &str, patch: &SlotPatch) -> Result<bool, SlotError> {
        Ok(self.table.lock().upsert(name, patch))
    }

    fn find_one(
        &self,
        filter: &SlotFilter,
        sort: Option<SortBy>,
    ) -> Result<Option<TaskSlot>, SlotError> {
        Ok(self.table.lock().find_one(filter, sort))
    }

    fn find_many(&self, filter: &SlotFilter) -> Result<Vec<TaskSlot>, SlotError> {
        Ok(self.table.lock().find_many(filter))
    }

    fn update_many(&self, filter: &SlotFilter, patch: &SlotPatch) -> Result<usize, SlotError> {
        Ok(self.table.lock().update_many(filter, patch))
    }

    fn distinct_values(
        &self,
        field: SlotField,
        filter: &SlotFilter,
    ) -> Result<Vec<String>, SlotError> {
        Ok(self.table.lock().distinct_values(field, filter))
    }

    fn claim(
        &self,
        name: &str,
        stale_cutoff: DateTime<Utc>,
        patch: &SlotPatch,
    ) -> Result<ClaimOutcome, SlotError> {
        Ok(self.table.lock().claim(name, stale_cutoff, patch))
    }
}
