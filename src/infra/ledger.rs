//! In-memory business-process ledger.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::{ProcessLedger, SlotError};

/// Status of a tracked business process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Waiting to be picked up.
    Pending,
    /// Being worked on.
    Started,
    /// Finished.
    Completed,
    /// Finished with an error.
    Failed,
}

/// Process statuses keyed by process id.
#[derive(Debug, Default)]
pub struct InMemoryProcessLedger {
    processes: Mutex<HashMap<String, ProcessStatus>>,
}

impl InMemoryProcessLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a process status.
    pub fn set(&self, id: impl Into<String>, status: ProcessStatus) {
        self.processes.lock().insert(id.into(), status);
    }

    /// Status of one process.
    #[must_use]
    pub fn status(&self, id: &str) -> Option<ProcessStatus> {
        self.processes.lock().get(id).copied()
    }

    /// Number of processes in `status`.
    #[must_use]
    pub fn count(&self, status: ProcessStatus) -> usize {
        self.processes
            .lock()
            .values()
            .filter(|s| **s == status)
            .count()
    }
}

impl ProcessLedger for InMemoryProcessLedger {
    fn reset_started_to_pending(&self) -> Result<usize, SlotError> {
        let mut processes = self.processes.lock();
        let mut moved = 0;
        for status in processes.values_mut() {
            if *status == ProcessStatus::Started {
                *status = ProcessStatus::Pending;
                moved += 1;
            }
        }
        Ok(moved)
    }
}
