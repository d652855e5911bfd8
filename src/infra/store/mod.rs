//! Lane store backends.

pub mod file;
pub mod memory;

pub use file::FileSlotStore;
pub use memory::InMemorySlotStore;
