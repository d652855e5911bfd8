//! File-backed lane store using JSON lines for durability.
//!
//! Every call re-reads `<stream>_slots.jsonl` under an advisory lock on
//! `<stream>_slots.lock`, so several processes can share one directory.
//! Mutations work on a freshly loaded table and replace the data file through
//! a temp file and rename; a failed write leaves the previous contents intact.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::core::{
    ClaimOutcome, SlotError, SlotField, SlotFilter, SlotPatch, SlotStore, SortBy, TaskSlot,
};
use crate::infra::store::memory::SlotTable;

/// Lane store persisted to `<dir>/<stream>_slots.jsonl`.
#[derive(Debug)]
pub struct FileSlotStore {
    path: PathBuf,
    stream: String,
    local: Mutex<()>,
}

fn backend(e: impl std::fmt::Display) -> SlotError {
    SlotError::Backend(e.to_string())
}

/// Held advisory lock; released when the file handle drops.
struct LockGuard(File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.0.unlock();
    }
}

impl FileSlotStore {
    /// Open (or create) a store under `path` for the given stream name.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or an existing file holds a
    /// malformed record.
    pub fn open(path: impl AsRef<Path>, stream: impl Into<String>) -> Result<Self, SlotError> {
        let path = path.as_ref().to_path_buf();
        create_dir_all(&path).map_err(backend)?;
        let store = Self {
            path,
            stream: stream.into(),
            local: Mutex::new(()),
        };
        let rows = store.read(|table| table.rows().count())?;
        tracing::debug!(
            file = %store.file_path().display(),
            rows,
            "opened lane store"
        );
        Ok(store)
    }

    /// Location of the backing file.
    #[must_use]
    pub fn file_path(&self) -> PathBuf {
        self.path.join(format!("{}_slots.jsonl", self.stream))
    }

    fn lock_path(&self) -> PathBuf {
        self.path.join(format!("{}_slots.lock", self.stream))
    }

    fn acquire_lock(&self, exclusive: bool) -> Result<LockGuard, SlotError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(backend)?;
        if exclusive {
            file.lock().map_err(backend)?;
        } else {
            file.lock_shared().map_err(backend)?;
        }
        Ok(LockGuard(file))
    }

    fn load_from_disk(&self) -> Result<SlotTable, SlotError> {
        let file = match File::open(self.file_path()) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SlotTable::default()),
            Err(e) => return Err(backend(e)),
        };
        let mut rows = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(backend)?;
            if line.trim().is_empty() {
                continue;
            }
            rows.push(serde_json::from_str::<TaskSlot>(&line).map_err(backend)?);
        }
        Ok(SlotTable::from_rows(rows))
    }

    fn rewrite_disk(&self, table: &SlotTable) -> Result<(), SlotError> {
        let tmp = NamedTempFile::new_in(&self.path).map_err(backend)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            for row in table.rows() {
                let line = serde_json::to_string(row).map_err(backend)?;
                writeln!(writer, "{line}").map_err(backend)?;
            }
            writer.flush().map_err(backend)?;
        }
        tmp.as_file().sync_all().map_err(backend)?;
        tmp.persist(self.file_path()).map_err(|e| backend(e.error))?;
        Ok(())
    }

    fn read<T>(&self, op: impl FnOnce(&SlotTable) -> T) -> Result<T, SlotError> {
        let _local = self.local.lock();
        let _lock = self.acquire_lock(false)?;
        Ok(op(&self.load_from_disk()?))
    }

    /// Load, mutate and persist under the exclusive lock. `op` reports whether
    /// the table must be written back.
    fn write<T>(&self, op: impl FnOnce(&mut SlotTable) -> (T, bool)) -> Result<T, SlotError> {
        let _local = self.local.lock();
        let _lock = self.acquire_lock(true)?;
        let mut table = self.load_from_disk()?;
        let (result, dirty) = op(&mut table);
        if dirty {
            self.rewrite_disk(&table)?;
        }
        Ok(result)
    }
}

impl SlotStore for FileSlotStore {
    fn upsert_by_key(&self, name: &str, patch: &SlotPatch) -> Result<bool, SlotError> {
        self.write(|table| {
            let changed = table.upsert(name, patch);
            (changed, changed)
        })
    }

    fn find_one(
        &self,
        filter: &SlotFilter,
        sort: Option<SortBy>,
    ) -> Result<Option<TaskSlot>, SlotError> {
        self.read(|table| table.find_one(filter, sort))
    }

    fn find_many(&self, filter: &SlotFilter) -> Result<Vec<TaskSlot>, SlotError> {
        self.read(|table| table.find_many(filter))
    }

    fn update_many(&self, filter: &SlotFilter, patch: &SlotPatch) -> Result<usize, SlotError> {
        self.write(|table| {
            let changed = table.update_many(filter, patch);
            (changed, changed > 0)
        })
    }

    fn distinct_values(
        &self,
        field: SlotField,
        filter: &SlotFilter,
    ) -> Result<Vec<String>, SlotError> {
        self.read(|table| table.distinct_values(field, filter))
    }

    fn claim(
        &self,
        name: &str,
        stale_cutoff: DateTime<Utc>,
        patch: &SlotPatch,
    ) -> Result<ClaimOutcome, SlotError> {
        self.write(|table| {
            let outcome = table.claim(name, stale_cutoff, patch);
            let dirty = outcome.is_claimed();
            (outcome, dirty)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start_patch(now: DateTime<Utc>) -> SlotPatch {
        SlotPatch {
            is_running: Some(true),
            start_time: Some(Some(now)),
            ..SlotPatch::default()
        }
    }

    #[test]
    fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileSlotStore::open(dir.path(), "lanes").unwrap();
            store
                .upsert_by_key(
                    "Q1",
                    &SlotPatch {
                        is_running: Some(true),
                        designee: Some(Some("alice".into())),
                        ..SlotPatch::default()
                    },
                )
                .unwrap();
            store.upsert_by_key("Q2", &SlotPatch::default()).unwrap();
        }

        let reopened = FileSlotStore::open(dir.path(), "lanes").unwrap();
        let q1 = reopened.get("Q1").unwrap().unwrap();
        assert!(q1.is_running);
        assert_eq!(q1.designee.as_deref(), Some("alice"));
        assert_eq!(reopened.find_many(&SlotFilter::all()).unwrap().len(), 2);
    }

    #[test]
    fn test_streams_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileSlotStore::open(dir.path(), "a").unwrap();
        a.upsert_by_key("Q1", &SlotPatch::default()).unwrap();
        let b = FileSlotStore::open(dir.path(), "b").unwrap();
        assert!(b.get("Q1").unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad_slots.jsonl"), "{not json}\n").unwrap();
        let err = FileSlotStore::open(dir.path(), "bad").unwrap_err();
        assert!(matches!(err, SlotError::Backend(_)));
    }

    #[test]
    fn test_instances_sharing_a_file_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileSlotStore::open(dir.path(), "lanes").unwrap();
        let b = FileSlotStore::open(dir.path(), "lanes").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let cutoff = now - chrono::Duration::hours(28);

        assert_eq!(a.claim("Q1", cutoff, &start_patch(now)).unwrap(), ClaimOutcome::Claimed);
        assert_eq!(
            b.claim("Q1", cutoff, &start_patch(now)).unwrap(),
            ClaimOutcome::Busy { started: Some(now) }
        );

        b.claim("Q2", cutoff, &start_patch(now)).unwrap();
        assert!(a.get("Q1").unwrap().unwrap().is_running);
        assert!(a.get("Q2").unwrap().unwrap().is_running);
    }

    #[test]
    fn test_failed_write_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("lanes");
        let store = FileSlotStore::open(&root, "lanes").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let cutoff = now - chrono::Duration::hours(28);

        std::fs::remove_dir_all(&root).unwrap();
        assert!(matches!(
            store.claim("Q1", cutoff, &start_patch(now)),
            Err(SlotError::Backend(_))
        ));

        std::fs::create_dir_all(&root).unwrap();
        assert!(store.get("Q1").unwrap().is_none());
        assert_eq!(
            store.claim("Q1", cutoff, &start_patch(now)).unwrap(),
            ClaimOutcome::Claimed
        );
    }
}
