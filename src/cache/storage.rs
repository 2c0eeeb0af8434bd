//! Persistent key-value store backends.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::KeyValueStore;
use crate::config::Config;

/// Store that doesn't keep anything.
/// Used when caching is disabled - every read misses, every write is dropped.
pub struct NoopStore;

impl KeyValueStore for NoopStore {
  fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
    async { Ok(None) }.boxed()
  }

  fn set<'a>(&'a self, _key: &'a str, _value: String) -> BoxFuture<'a, Result<()>> {
    async { Ok(()) }.boxed()
  }

  fn remove<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<()>> {
    async { Ok(()) }.boxed()
  }

  fn clear(&self) -> BoxFuture<'_, Result<()>> {
    async { Ok(()) }.boxed()
  }
}

/// In-process store, lost when the session ends.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> R) -> Result<R> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(f(&mut entries))
  }
}

impl KeyValueStore for MemoryStore {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
    async move { self.with_entries(|entries| entries.get(key).cloned()) }.boxed()
  }

  fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
    async move {
      self.with_entries(|entries| {
        entries.insert(key.to_string(), value);
      })
    }
    .boxed()
  }

  fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
    async move {
      self.with_entries(|entries| {
        entries.remove(key);
      })
    }
    .boxed()
  }

  fn clear(&self) -> BoxFuture<'_, Result<()>> {
    async move { self.with_entries(|entries| entries.clear()) }.boxed()
  }
}

/// SQLite-backed store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  #[cfg(test)]
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

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    Ok(Config::data_dir()?.join("cache.db"))
  }

  /// Run database migrations for the store table.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  fn read(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read key {}: {}", key, e))
  }

  fn write(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write key {}: {}", key, e))?;

    Ok(())
  }

  fn delete(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete key {}: {}", key, e))?;

    Ok(())
  }

  fn delete_all(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_store", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(())
  }
}

/// Schema for the store table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl KeyValueStore for SqliteStore {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
    async move { self.read(key) }.boxed()
  }

  fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<()>> {
    async move { self.write(key, &value) }.boxed()
  }

  fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
    async move { self.delete(key) }.boxed()
  }

  fn clear(&self) -> BoxFuture<'_, Result<()>> {
    async move { self.delete_all() }.boxed()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn exercise(store: &dyn KeyValueStore) {
    assert_eq!(store.get("a").await.unwrap(), None);

    store.set("a", "1".into()).await.unwrap();
    store.set("b", "2".into()).await.unwrap();
    assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));

    store.set("a", "3".into()).await.unwrap();
    assert_eq!(store.get("a").await.unwrap().as_deref(), Some("3"));

    store.remove("a").await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), None);
    // Removing a missing key is fine
    store.remove("a").await.unwrap();

    store.clear().await.unwrap();
    assert_eq!(store.get("b").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_memory_store() {
    exercise(&MemoryStore::new()).await;
  }

  #[tokio::test]
  async fn test_sqlite_store() {
    exercise(&SqliteStore::open_in_memory().unwrap()).await;
  }

  #[tokio::test]
  async fn test_noop_store_always_misses() {
    let store = NoopStore;
    store.set("a", "1".into()).await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), None);
  }
}
