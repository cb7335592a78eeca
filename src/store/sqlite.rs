//! SQLite-backed key-value store.

use super::{KeyValueStore, UpdateFn};
use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// How long a writer waits for another process to release the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// SQLite key-value store.
pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    /// Open (or create) a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HarvestError::Store(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        debug!(key, bytes = value.len(), "Stored record");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let keys = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Runs inside a `BEGIN IMMEDIATE` transaction, so the write lock is
    /// held from the read onward and other connections wait on it.
    async fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<String> = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;

        let value = apply(current)?;
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        debug!(key, bytes = value.len(), "Updated record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("harvest.db");

        {
            let store = SqliteKeyValueStore::new(&path).unwrap();
            store.set("jobs", "[]").await.unwrap();
            store.set("jobs", "[1]").await.unwrap();
        }

        let store = SqliteKeyValueStore::new(&path).unwrap();
        assert_eq!(store.get("jobs").await.unwrap(), Some("[1]".to_string()));
        assert_eq!(store.keys().await.unwrap(), vec!["jobs"]);
        assert!(store.delete("jobs").await.unwrap());
        assert_eq!(store.get("jobs").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_merges_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvest.db");
        let first = SqliteKeyValueStore::new(&path).unwrap();
        let second = SqliteKeyValueStore::new(&path).unwrap();

        let append = |item: &'static str| {
            move |raw: Option<String>| -> Result<String> {
                let mut items: Vec<String> = match raw {
                    Some(raw) => serde_json::from_str(&raw)?,
                    None => Vec::new(),
                };
                items.push(item.to_string());
                Ok(serde_json::to_string(&items)?)
            }
        };
        first.update("hashes", &mut append("a")).await.unwrap();
        second.update("hashes", &mut append("b")).await.unwrap();
        first.update("hashes", &mut append("c")).await.unwrap();

        let stored = second.get("hashes").await.unwrap().unwrap();
        assert_eq!(stored, r#"["a","b","c"]"#);

        let failed = first
            .update("hashes", &mut |_| Err(HarvestError::Store("boom".to_string())))
            .await;
        assert!(failed.is_err());
        assert_eq!(second.get("hashes").await.unwrap().unwrap(), stored);
    }

    #[tokio::test]
    async fn test_in_memory_sqlite_store() {
        let store = SqliteKeyValueStore::in_memory().unwrap();
        assert_eq!(store.get("missing").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }
}
