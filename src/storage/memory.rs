//! In-memory storage medium.
//!
//! Used in tests and as the fallback when the SQLite file cannot be opened.
//! Several contexts can share one backing map through [`MemoryMedium::new_context`],
//! which is how two "tabs" are simulated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use super::medium::{
  entry_size, new_context_id, ContextId, StorageError, StorageEvent, StorageMedium, StorageResult,
  StorageWatch, DEFAULT_QUOTA_BYTES,
};

struct Shared {
  items: Mutex<HashMap<String, String>>,
  events: broadcast::Sender<StorageEvent>,
  quota: usize,
}

/// Handle to a shared in-memory medium, bound to one context.
#[derive(Clone)]
pub struct MemoryMedium {
  shared: Arc<Shared>,
  context: ContextId,
}

impl MemoryMedium {
  /// Create a new, empty medium with the default quota.
  pub fn new() -> Self {
    Self::with_quota(DEFAULT_QUOTA_BYTES)
  }

  /// Create a new, empty medium with the given byte quota.
  pub fn with_quota(quota: usize) -> Self {
    let (events, _) = broadcast::channel(256);
    Self {
      shared: Arc::new(Shared {
        items: Mutex::new(HashMap::new()),
        events,
        quota,
      }),
      context: new_context_id(),
    }
  }

  /// Another context over the same backing map.
  pub fn new_context(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
      context: new_context_id(),
    }
  }

  fn emit(&self, key: &str) {
    // No receivers is fine: nobody is watching yet.
    let _ = self.shared.events.send(StorageEvent {
      key: key.to_string(),
      origin: self.context.clone(),
    });
  }
}

impl Default for MemoryMedium {
  fn default() -> Self {
    Self::new()
  }
}

impl StorageMedium for MemoryMedium {
  fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
    let items = self
      .shared
      .items
      .lock()
      .map_err(|e| StorageError::Unavailable(format!("lock poisoned: {}", e)))?;
    Ok(items.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
    {
      let mut items = self
        .shared
        .items
        .lock()
        .map_err(|e| StorageError::Unavailable(format!("lock poisoned: {}", e)))?;

      let used: usize = items
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| entry_size(k, v))
        .sum();
      let needed = used + entry_size(key, value);
      if needed > self.shared.quota {
        return Err(StorageError::QuotaExceeded {
          needed,
          limit: self.shared.quota,
        });
      }

      items.insert(key.to_string(), value.to_string());
    }

    self.emit(key);
    Ok(())
  }

  fn remove_item(&self, key: &str) -> StorageResult<()> {
    let removed = {
      let mut items = self
        .shared
        .items
        .lock()
        .map_err(|e| StorageError::Unavailable(format!("lock poisoned: {}", e)))?;
      items.remove(key).is_some()
    };

    if removed {
      self.emit(key);
    }
    Ok(())
  }

  fn context_id(&self) -> &str {
    &self.context
  }

  fn watch(&self) -> StorageWatch {
    StorageWatch::new(self.shared.events.subscribe(), self.context.clone())
  }
}
