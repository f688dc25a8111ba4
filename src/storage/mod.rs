//! Persisted key/value storage shared by every context on the same origin.
//!
//! - Synchronous `get_item`/`set_item`/`remove_item` with a byte quota
//! - Writes may fail; callers catch and log
//! - A native change signal that only fires in *other* contexts

mod medium;
mod memory;
mod sqlite;

pub use medium::{
  ContextId, SharedMedium, StorageError, StorageEvent, StorageMedium, StorageResult, StorageWatch,
  DEFAULT_QUOTA_BYTES,
};
pub use memory::MemoryMedium;
pub use sqlite::SqliteMedium;
