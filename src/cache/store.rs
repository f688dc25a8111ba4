//! Durable key -> snapshot store on top of a storage medium.

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::SharedMedium;

/// A cached listing snapshot.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
  pub key: String,
  /// The cached items in order
  pub payload: Vec<T>,
  /// When the snapshot was written
  pub stored_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSnapshot<T> {
  payload: Vec<T>,
  stored_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredSnapshotRef<'a, T> {
  payload: &'a [T],
  stored_at: DateTime<Utc>,
}

/// Snapshot store keyed by scope.
///
/// Never fails towards the caller: unreadable values read as absent and
/// failed writes are logged and dropped.
#[derive(Clone)]
pub struct CacheStore {
  medium: SharedMedium,
  /// Entries older than this read as absent. `None` keeps entries forever.
  max_age: Option<Duration>,
}

impl CacheStore {
  pub fn new(medium: SharedMedium) -> Self {
    Self {
      medium,
      max_age: None,
    }
  }

  /// Bound how long an entry is trusted by [`CacheStore::get`].
  pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
    self.max_age = max_age;
    self
  }

  fn is_expired(&self, stored_at: DateTime<Utc>) -> bool {
    self
      .max_age
      .is_some_and(|max_age| Utc::now() - stored_at > max_age)
  }

  /// Read the entry for `key`, honouring the max age.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
    let entry = self.get_any_age(key)?;
    if self.is_expired(entry.stored_at) {
      debug!(key, stored_at = %entry.stored_at, "cache entry older than max age");
      return None;
    }
    Some(entry)
  }

  /// Read the entry for `key` regardless of age.
  pub fn get_any_age<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
    let raw = match self.medium.get_item(key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        warn!(key, error = %e, "failed to read cache entry");
        return None;
      }
    };

    match serde_json::from_str::<StoredSnapshot<T>>(&raw) {
      Ok(snapshot) => Some(CacheEntry {
        key: key.to_string(),
        payload: snapshot.payload,
        stored_at: snapshot.stored_at,
      }),
      Err(e) => {
        debug!(key, error = %e, "ignoring unparsable cache entry");
        None
      }
    }
  }

  /// Replace the entry for `key` with `payload`, stamped now.
  ///
  /// Returns whether the write reached the medium.
  pub fn set<T: Serialize>(&self, key: &str, payload: &[T]) -> bool {
    let snapshot = StoredSnapshotRef {
      payload,
      stored_at: Utc::now(),
    };

    let raw = match serde_json::to_string(&snapshot) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(key, error = %e, "failed to serialize cache entry");
        return false;
      }
    };

    match self.medium.set_item(key, &raw) {
      Ok(()) => true,
      Err(e) => {
        warn!(key, error = %e, "failed to write cache entry");
        false
      }
    }
  }

  /// Drop the entry for `key`.
  pub fn invalidate(&self, key: &str) -> bool {
    match self.medium.remove_item(key) {
      Ok(()) => true,
      Err(e) => {
        warn!(key, error = %e, "failed to invalidate cache entry");
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::{MemoryMedium, StorageMedium};
  use std::sync::Arc;

  fn store() -> (MemoryMedium, CacheStore) {
    let medium = MemoryMedium::new();
    let store = CacheStore::new(Arc::new(medium.clone()));
    (medium, store)
  }

  #[test]
  fn test_set_then_get() {
    let (_medium, store) = store();
    assert!(store.set("k", &[1, 2, 3]));

    let entry = store.get::<i32>("k").unwrap();
    assert_eq!(entry.key, "k");
    assert_eq!(entry.payload, vec![1, 2, 3]);
  }

  #[test]
  fn test_set_replaces_prior_entry() {
    let (_medium, store) = store();
    store.set("k", &[1, 2, 3]);
    store.set("k", &[4]);
    assert_eq!(store.get::<i32>("k").unwrap().payload, vec![4]);
  }

  #[test]
  fn test_missing_key_is_absent() {
    let (_medium, store) = store();
    assert!(store.get::<i32>("missing").is_none());
  }

  #[test]
  fn test_corrupt_value_is_absent() {
    let (medium, store) = store();
    medium.set_item("k", "{not json").unwrap();
    assert!(store.get::<i32>("k").is_none());

    medium.set_item("k", r#"{"payload": "nope"}"#).unwrap();
    assert!(store.get::<i32>("k").is_none());
  }

  #[test]
  fn test_invalidate_removes_entry() {
    let (_medium, store) = store();
    store.set("k", &["a"]);
    assert!(store.invalidate("k"));
    assert!(store.get::<String>("k").is_none());
  }

  #[test]
  fn test_write_failure_is_swallowed() {
    let medium = MemoryMedium::with_quota(8);
    let store = CacheStore::new(Arc::new(medium));
    assert!(!store.set("k", &["far too large for the quota"]));
    assert!(store.get::<String>("k").is_none());
  }

  #[test]
  fn test_max_age_hides_old_entry_but_any_age_still_reads_it() {
    let (medium, store) = store();
    let old = format!(
      r#"{{"payload":[1],"storedAt":"{}"}}"#,
      (Utc::now() - Duration::hours(2)).to_rfc3339()
    );
    medium.set_item("k", &old).unwrap();

    let store = store.with_max_age(Some(Duration::minutes(30)));
    assert!(store.get::<i32>("k").is_none());
    assert_eq!(store.get_any_age::<i32>("k").unwrap().payload, vec![1]);
  }

  #[test]
  fn test_no_max_age_keeps_entries_forever() {
    let (medium, store) = store();
    medium
      .set_item("k", r#"{"payload":[1],"storedAt":"2001-01-01T00:00:00Z"}"#)
      .unwrap();
    assert!(store.get::<i32>("k").is_some());
  }
}
