//! Infrastructure adapters: lane stores and the process ledger.

pub mod ledger;
pub mod store;

pub use ledger::{InMemoryProcessLedger, ProcessStatus};
pub use store::{FileSlotStore, InMemorySlotStore};
