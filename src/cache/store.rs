//! Durable key/value store with per-entry TTL, backed by SQLite.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::SyncError;

/// Contract for the durable cache store.
///
/// An entry is valid iff `now - written_at <= ttl`. Expired entries are
/// treated as absent and deleted on the read that observes them (lazy
/// eviction). Entries written with `ttl = None` never expire; they are the
/// durable slots used for the catalog snapshot and the last-sync timestamp.
pub trait CacheStore: Send + Sync {
  /// Return the stored value if present and valid; evict it if expired.
  fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SyncError>;

  /// Overwrite any existing entry unconditionally, stamping the write time.
  fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>)
    -> Result<(), SyncError>;

  /// Remove an entry. Deleting an absent key is not an error.
  fn delete(&self, key: &str) -> Result<(), SyncError>;

  /// Remove all entries. Used by forced resync.
  fn clear(&self) -> Result<(), SyncError>;

  /// Equivalent to `get(key).is_some()`, with identical expiry semantics.
  fn has(&self, key: &str) -> Result<bool, SyncError>;
}

/// SQLite-backed implementation of [`CacheStore`].
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Schema for the cache table. `ttl_ms NULL` marks a non-expiring slot.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_cache (
    key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    written_at TEXT NOT NULL,
    ttl_ms INTEGER
);
"#;

impl SqliteStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self, SyncError> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open or create the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self, SyncError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| SyncError::Storage(format!("failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      SyncError::Storage(format!("failed to open cache db at {}: {}", path.display(), e))
    })?;

    Self::from_connection(conn)
  }

  /// In-memory store, used by tests.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, SyncError> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self, SyncError> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<std::path::PathBuf, SyncError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| SyncError::Storage("could not determine data directory".into()))?;

    Ok(data_dir.join("storesync").join("cache.db"))
  }

  /// Schema creation is idempotent, so concurrent first-use of several
  /// store handles against the same file cannot duplicate tables.
  fn run_migrations(&self) -> Result<(), SyncError> {
    self.conn()?.execute_batch(CACHE_SCHEMA)?;
    Ok(())
  }

  fn conn(&self) -> Result<MutexGuard<'_, Connection>, SyncError> {
    self
      .conn
      .lock()
      .map_err(|e| SyncError::Storage(format!("lock poisoned: {}", e)))
  }

  /// Write an entry with an explicit write timestamp. `set` stamps "now";
  /// tests backdate entries through this to exercise expiry boundaries.
  pub(crate) fn set_at<T: Serialize>(
    &self,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
    written_at: DateTime<Utc>,
  ) -> Result<(), SyncError> {
    let data = serde_json::to_vec(value)?;
    let written = written_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    let ttl_ms = ttl.map(|d| d.num_milliseconds());

    self.conn()?.execute(
      "INSERT OR REPLACE INTO kv_cache (key, data, written_at, ttl_ms) VALUES (?, ?, ?, ?)",
      params![key, data, written, ttl_ms],
    )?;

    Ok(())
  }
}

impl CacheStore for SqliteStore {
  fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SyncError> {
    let row: Option<(Vec<u8>, String, Option<i64>)> = self
      .conn()?
      .query_row(
        "SELECT data, written_at, ttl_ms FROM kv_cache WHERE key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()?;

    let Some((data, written_str, ttl_ms)) = row else {
      return Ok(None);
    };

    if let Some(ttl_ms) = ttl_ms {
      let written = parse_timestamp(&written_str)?;
      if Utc::now() - written > Duration::milliseconds(ttl_ms) {
        // Lazy eviction: an expired entry is absent, and the row goes away
        // on the read that observed it.
        self.delete(key)?;
        return Ok(None);
      }
    }

    Ok(Some(serde_json::from_slice(&data)?))
  }

  fn set<T: Serialize>(
    &self,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
  ) -> Result<(), SyncError> {
    self.set_at(key, value, ttl, Utc::now())
  }

  fn delete(&self, key: &str) -> Result<(), SyncError> {
    self
      .conn()?
      .execute("DELETE FROM kv_cache WHERE key = ?", params![key])?;
    Ok(())
  }

  fn clear(&self) -> Result<(), SyncError> {
    self.conn()?.execute("DELETE FROM kv_cache", [])?;
    Ok(())
  }

  fn has(&self, key: &str) -> Result<bool, SyncError> {
    Ok(self.get::<serde_json::Value>(key)?.is_some())
  }
}

/// Parse an RFC 3339 timestamp written by `set_at`.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, SyncError> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| SyncError::Storage(format!("corrupt written_at '{}': {}", s, e)))
}
