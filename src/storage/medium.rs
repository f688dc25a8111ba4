//! Storage medium trait, change events and error types.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Default byte quota for a storage medium (matches typical browser storage).
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Errors raised by a storage medium.
#[derive(Debug, Error)]
pub enum StorageError {
  /// The write would push the medium past its byte quota.
  #[error("storage quota exceeded: {needed} bytes needed, limit is {limit}")]
  QuotaExceeded { needed: usize, limit: usize },

  /// The medium cannot be used right now (lock poisoned, closed, ...).
  #[error("storage unavailable: {0}")]
  Unavailable(String),

  /// The SQLite backend failed.
  #[error("storage backend error: {0}")]
  Backend(#[from] rusqlite::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Identifier of one browsing context (a tab, a process) attached to a medium.
pub type ContextId = String;

/// Native change signal: a key was written or removed by some context.
///
/// Carries only the key, never the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
  pub key: String,
  pub origin: ContextId,
}

/// Synchronous key -> string store shared by every context on the same origin.
///
/// Every successful `set_item`/`remove_item` emits a [`StorageEvent`] that
/// other contexts observe through [`StorageMedium::watch`].
pub trait StorageMedium: Send + Sync {
  fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

  fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

  fn remove_item(&self, key: &str) -> StorageResult<()>;

  /// The context this handle writes as.
  fn context_id(&self) -> &str;

  /// Subscribe to writes made by other contexts.
  fn watch(&self) -> StorageWatch;
}

pub type SharedMedium = Arc<dyn StorageMedium>;

/// Receiver half of the native change signal, filtered to foreign writes.
pub struct StorageWatch {
  rx: broadcast::Receiver<StorageEvent>,
  context: ContextId,
}

impl StorageWatch {
  pub(crate) fn new(rx: broadcast::Receiver<StorageEvent>, context: ContextId) -> Self {
    Self { rx, context }
  }

  /// Take the next pending foreign event without waiting.
  pub fn try_next(&mut self) -> Option<StorageEvent> {
    loop {
      match self.rx.try_recv() {
        Ok(event) if event.origin == self.context => continue,
        Ok(event) => return Some(event),
        Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
          tracing::warn!(skipped, "storage watch lagged, some change signals were dropped");
          continue;
        }
        Err(_) => return None,
      }
    }
  }

  /// Wait for the next foreign event. Returns `None` once the medium is gone.
  pub async fn next(&mut self) -> Option<StorageEvent> {
    loop {
      match self.rx.recv().await {
        Ok(event) if event.origin == self.context => continue,
        Ok(event) => return Some(event),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          tracing::warn!(skipped, "storage watch lagged, some change signals were dropped");
          continue;
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }
}

/// Fresh context identifier.
pub(crate) fn new_context_id() -> ContextId {
  uuid::Uuid::new_v4().to_string()
}

/// Bytes a key/value pair counts against the quota.
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
  key.len() + value.len()
}
