//! SQLite-backed storage medium.
//!
//! Each opened connection is one context. Processes sharing the database file
//! play the role of browser tabs sharing an origin: writes are recorded in a
//! change log, and every context polls the log for rows written by others.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::medium::{
  entry_size, new_context_id, ContextId, StorageError, StorageEvent, StorageMedium, StorageResult,
  StorageWatch,
};

/// How many change-log rows are kept for slow pollers.
const CHANGE_LOG_RETENTION: i64 = 1000;

/// Schema for the key/value table and its change log.
const STORAGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS storage_items (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per write, read by other contexts
CREATE TABLE IF NOT EXISTS storage_changes (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    origin TEXT NOT NULL
);
"#;

struct PollState {
  last_seq: i64,
}

/// SQLite storage medium bound to one context.
pub struct SqliteMedium {
  conn: Mutex<Connection>,
  context: ContextId,
  quota: usize,
  events: broadcast::Sender<StorageEvent>,
  poll: Mutex<PollState>,
}

impl SqliteMedium {
  /// Open the medium at the default location.
  pub fn open_default(quota: usize) -> Result<Self> {
    Self::open(&Self::default_path()?, quota)
  }

  /// Open (or create) the medium at `path`.
  pub fn open(path: &Path, quota: usize) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open storage at {}: {}", path.display(), e))?;
    conn
      .busy_timeout(Duration::from_secs(2))
      .map_err(|e| eyre!("Failed to configure storage: {}", e))?;
    conn
      .execute_batch("PRAGMA journal_mode = WAL;")
      .map_err(|e| eyre!("Failed to configure storage: {}", e))?;
    conn
      .execute_batch(STORAGE_SCHEMA)
      .map_err(|e| eyre!("Failed to run storage migrations: {}", e))?;

    // Start after whatever was written before this context existed.
    let last_seq: i64 = conn
      .query_row("SELECT COALESCE(MAX(seq), 0) FROM storage_changes", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to read storage change log: {}", e))?;

    let (events, _) = broadcast::channel(256);

    Ok(Self {
      conn: Mutex::new(conn),
      context: new_context_id(),
      quota,
      events,
      poll: Mutex::new(PollState { last_seq }),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("shopcache").join("storage.db"))
  }

  /// Read change-log rows written by other contexts since the last poll and
  /// broadcast them to watchers. Returns how many foreign changes were seen.
  pub fn poll_changes(&self) -> StorageResult<usize> {
    let mut poll = self
      .poll
      .lock()
      .map_err(|e| StorageError::Unavailable(format!("lock poisoned: {}", e)))?;

    let rows: Vec<(i64, String, String)> = {
      let conn = self.lock_conn()?;
      let mut stmt =
        conn.prepare("SELECT seq, key, origin FROM storage_changes WHERE seq > ? ORDER BY seq")?;
      let rows = stmt
        .query_map(params![poll.last_seq], |row| {
          Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      rows
    };

    let mut foreign = 0;
    for (seq, key, origin) in rows {
      poll.last_seq = poll.last_seq.max(seq);
      if origin == self.context {
        continue;
      }
      foreign += 1;
      let _ = self.events.send(StorageEvent { key, origin });
    }

    Ok(foreign)
  }

  /// Poll the change log on a fixed interval until the medium is dropped.
  pub fn spawn_change_poller(medium: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
    let weak = Arc::downgrade(medium);
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      loop {
        ticker.tick().await;
        let Some(medium) = weak.upgrade() else {
          break;
        };
        if let Err(e) = medium.poll_changes() {
          tracing::warn!(error = %e, "failed to poll storage change log");
        }
      }
    })
  }

  fn lock_conn(&self) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| StorageError::Unavailable(format!("lock poisoned: {}", e)))
  }

  fn record_change(tx: &rusqlite::Transaction<'_>, key: &str, origin: &str) -> StorageResult<()> {
    tx.execute(
      "INSERT INTO storage_changes (key, origin) VALUES (?, ?)",
      params![key, origin],
    )?;
    tx.execute(
      "DELETE FROM storage_changes WHERE seq <= (SELECT MAX(seq) FROM storage_changes) - ?",
      params![CHANGE_LOG_RETENTION],
    )?;
    Ok(())
  }
}

impl StorageMedium for SqliteMedium {
  fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
    let conn = self.lock_conn()?;
    let value = conn
      .query_row(
        "SELECT value FROM storage_items WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(value)
  }

  fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
    let mut conn = self.lock_conn()?;
    let tx = conn.transaction()?;

    let used: i64 = tx.query_row(
      "SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0)
       FROM storage_items WHERE key != ?",
      params![key],
      |row| row.get(0),
    )?;
    let needed = usize::try_from(used).unwrap_or(usize::MAX) + entry_size(key, value);
    if needed > self.quota {
      return Err(StorageError::QuotaExceeded {
        needed,
        limit: self.quota,
      });
    }

    tx.execute(
      "INSERT INTO storage_items (key, value) VALUES (?, ?)
       ON CONFLICT(key) DO UPDATE SET value = excluded.value",
      params![key, value],
    )?;
    Self::record_change(&tx, key, &self.context)?;
    tx.commit()?;

    Ok(())
  }

  fn remove_item(&self, key: &str) -> StorageResult<()> {
    let mut conn = self.lock_conn()?;
    let tx = conn.transaction()?;

    let removed = tx.execute("DELETE FROM storage_items WHERE key = ?", params![key])?;
    if removed > 0 {
      Self::record_change(&tx, key, &self.context)?;
    }
    tx.commit()?;

    Ok(())
  }

  fn context_id(&self) -> &str {
    &self.context
  }

  fn watch(&self) -> StorageWatch {
    StorageWatch::new(self.events.subscribe(), self.context.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::DEFAULT_QUOTA_BYTES;

  fn open_pair() -> (tempfile::TempDir, SqliteMedium, SqliteMedium) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.db");
    let a = SqliteMedium::open(&path, DEFAULT_QUOTA_BYTES).unwrap();
    let b = SqliteMedium::open(&path, DEFAULT_QUOTA_BYTES).unwrap();
    (dir, a, b)
  }

  #[test]
  fn test_set_get_remove() {
    let (_dir, a, _b) = open_pair();

    a.set_item("k", "v1").unwrap();
    a.set_item("k", "v2").unwrap();
    assert_eq!(a.get_item("k").unwrap().as_deref(), Some("v2"));

    a.remove_item("k").unwrap();
    assert_eq!(a.get_item("k").unwrap(), None);
  }

  #[test]
  fn test_second_connection_sees_write_and_change_signal() {
    let (_dir, a, b) = open_pair();
    let mut watch_a = a.watch();
    let mut watch_b = b.watch();

    a.set_item("wishlist", "[\"p1\"]").unwrap();
    assert_eq!(b.get_item("wishlist").unwrap().as_deref(), Some("[\"p1\"]"));

    assert_eq!(a.poll_changes().unwrap(), 0);
    assert_eq!(watch_a.try_next(), None);

    assert_eq!(b.poll_changes().unwrap(), 1);
    let event = watch_b.try_next().unwrap();
    assert_eq!(event.key, "wishlist");

    // Already consumed
    assert_eq!(b.poll_changes().unwrap(), 0);
  }

  #[test]
  fn test_quota_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let medium = SqliteMedium::open(&dir.path().join("s.db"), 16).unwrap();

    medium.set_item("a", "short").unwrap();
    let err = medium.set_item("b", "this value is far too long").unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { limit: 16, .. }));
    assert_eq!(medium.get_item("b").unwrap(), None);
  }

  #[test]
  fn test_changes_before_open_are_not_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.db");
    let a = SqliteMedium::open(&path, DEFAULT_QUOTA_BYTES).unwrap();
    a.set_item("k", "v").unwrap();

    let late = SqliteMedium::open(&path, DEFAULT_QUOTA_BYTES).unwrap();
    assert_eq!(late.poll_changes().unwrap(), 0);
  }
}
