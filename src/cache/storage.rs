//! Byte store trait and its backends (SQLite, files, memory, none).

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::traits::StoredEntry;
use crate::config::{CacheBackend, CacheConfig};

/// Trait for byte store backends.
///
/// A flat key to bytes mapping. `set` overwrites unconditionally.
pub trait ByteStore: Send + Sync {
  /// Get the bytes stored under `key`, if any.
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

  /// Store `bytes` under `key`, replacing any previous value.
  fn set(&self, key: &str, bytes: &[u8]) -> Result<()>;

  /// List stored entries.
  fn entries(&self) -> Result<Vec<StoredEntry>>;
}

/// Open the store selected by configuration.
pub fn open_store(config: &CacheConfig) -> Result<Box<dyn ByteStore>> {
  let store: Box<dyn ByteStore> = match config.backend {
    CacheBackend::Sqlite => {
      let path = match &config.path {
        Some(p) => p.clone(),
        None => default_data_dir()?.join("cache.db"),
      };
      Box::new(SqliteStore::open(&path)?)
    }
    CacheBackend::Files => {
      let dir = match &config.path {
        Some(p) => p.clone(),
        None => default_data_dir()?.join("responses"),
      };
      Box::new(FileStore::open(dir)?)
    }
    CacheBackend::Memory => Box::new(MemoryStore::default()),
    CacheBackend::None => Box::new(NoopStore),
  };

  Ok(store)
}

/// Get the default data directory.
fn default_data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("readthru"))
}

/// Store that doesn't keep anything.
/// Used when caching is disabled - every lookup misses.
pub struct NoopStore;

impl ByteStore for NoopStore {
  fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
    Ok(None) // Always miss
  }

  fn set(&self, _key: &str, _bytes: &[u8]) -> Result<()> {
    Ok(()) // Discard
  }

  fn entries(&self) -> Result<Vec<StoredEntry>> {
    Ok(Vec::new())
  }
}

/// In-process store, lost on exit.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl ByteStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, bytes: &[u8]) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(key.to_string(), bytes.to_vec());
    Ok(())
  }

  fn entries(&self) -> Result<Vec<StoredEntry>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut listed: Vec<StoredEntry> = entries
      .iter()
      .map(|(key, bytes)| StoredEntry {
        key: key.clone(),
        size: bytes.len() as u64,
        stored_at: None,
      })
      .collect();
    listed.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(listed)
  }
}

/// One file per key inside a directory.
pub struct FileStore {
  dir: PathBuf,
  /// Distinguishes temp files of concurrent writes
  writes: AtomicU64,
}

impl FileStore {
  /// Open (and create if needed) a file store rooted at `dir`.
  pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
    let dir = dir.into();
    std::fs::create_dir_all(&dir)
      .map_err(|e| eyre!("Failed to create cache directory {}: {}", dir.display(), e))?;
    Ok(Self {
      dir,
      writes: AtomicU64::new(0),
    })
  }

  fn path_for(&self, key: &str) -> Result<PathBuf> {
    if key.is_empty() || key.starts_with('.') || key.contains(|c: char| c == '/' || c == '\\') {
      return Err(eyre!("Invalid cache key for file store: {:?}", key));
    }
    Ok(self.dir.join(key))
  }
}

const TEMP_SUFFIX: &str = ".tmp";

impl ByteStore for FileStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let path = self.path_for(key)?;
    match std::fs::read(&path) {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(eyre!("Failed to read {}: {}", path.display(), e)),
    }
  }

  fn set(&self, key: &str, bytes: &[u8]) -> Result<()> {
    let path = self.path_for(key)?;
    let write = self.writes.fetch_add(1, Ordering::Relaxed);
    let temp = self
      .dir
      .join(format!("{}.{}.{}{}", key, std::process::id(), write, TEMP_SUFFIX));

    // Write then rename so readers never see a partial file
    let written = std::fs::write(&temp, bytes)
      .map_err(|e| eyre!("Failed to write {}: {}", temp.display(), e))
      .and_then(|()| {
        std::fs::rename(&temp, &path)
          .map_err(|e| eyre!("Failed to move {} into place: {}", path.display(), e))
      });

    if written.is_err() {
      let _ = std::fs::remove_file(&temp);
    }
    written
  }

  fn entries(&self) -> Result<Vec<StoredEntry>> {
    let read_dir = std::fs::read_dir(&self.dir)
      .map_err(|e| eyre!("Failed to list {}: {}", self.dir.display(), e))?;

    let mut listed = Vec::new();
    for entry in read_dir {
      let entry = entry.map_err(|e| eyre!("Failed to list {}: {}", self.dir.display(), e))?;
      let key = entry.file_name().to_string_lossy().into_owned();
      if key.ends_with(TEMP_SUFFIX) {
        continue;
      }

      let metadata = entry
        .metadata()
        .map_err(|e| eyre!("Failed to stat {}: {}", entry.path().display(), e))?;
      if !metadata.is_file() {
        continue;
      }

      listed.push(StoredEntry {
        key,
        size: metadata.len(),
        stored_at: metadata.modified().ok().map(DateTime::<Utc>::from),
      });
    }
    listed.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));

    Ok(listed)
  }
}

/// SQLite-based byte store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open or create the database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Raw response bodies keyed by cache key
CREATE TABLE IF NOT EXISTS response_cache (
    cache_key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl ByteStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT data FROM response_cache WHERE cache_key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry: {}", e))
  }

  fn set(&self, key: &str, bytes: &[u8]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache (cache_key, data, stored_at)
         VALUES (?, ?, datetime('now'))",
        params![key, bytes],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn entries(&self) -> Result<Vec<StoredEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT cache_key, length(data), stored_at FROM response_cache
         ORDER BY stored_at DESC, cache_key",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<(String, i64, String)> = stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
      .map_err(|e| eyre!("Failed to query entries: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read entry: {}", e))?;

    rows
      .into_iter()
      .map(|(key, size, stored_at)| {
        Ok(StoredEntry {
          key,
          size: size.max(0) as u64,
          stored_at: Some(parse_datetime(&stored_at)?),
        })
      })
      .collect()
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
