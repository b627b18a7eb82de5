//! SQLite-backed key-value store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{GateError, GateResult};
use crate::traits::KeyValueStore;

/// Key-value store persisted in a single SQLite table.
///
/// Each write is a single-row upsert, which gives the per-key atomicity the
/// intention store relies on.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Open (or create) a store at the given path.
    pub fn new(path: impl AsRef<Path>) -> GateResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> GateResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> GateResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GateError::storage("SQLite connection lock poisoned"))
    }

    fn init_schema(&self) -> GateResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    fn decode(key: &str, raw: &str) -> GateResult<serde_json::Value> {
        serde_json::from_str(raw).map_err(|e| GateError::corrupted(key, e))
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> GateResult<Option<serde_json::Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        raw.map(|r| Self::decode(key, &r)).transpose()
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> GateResult<()> {
        let raw = serde_json::to_string(&value)?;
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, raw, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> GateResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    async fn get_all(&self) -> GateResult<HashMap<String, serde_json::Value>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM kv")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut all = HashMap::new();
        for row in rows {
            let (key, raw) = row?;
            let value = Self::decode(&key, &raw)?;
            all.insert(key, value);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_and_get_all() {
        let store = SqliteKvStore::in_memory().unwrap();
        store.set("intention:youtube.com", json!({"intention": "a"})).await.unwrap();
        store.set("intention:youtube.com", json!({"intention": "b"})).await.unwrap();
        store.set("active_intention", json!({"domain": "youtube.com"})).await.unwrap();

        assert_eq!(
            store.get("intention:youtube.com").await.unwrap(),
            Some(json!({"intention": "b"}))
        );
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 2);

        store.remove("active_intention").await.unwrap();
        assert!(store.get("active_intention").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        {
            let store = SqliteKvStore::new(&path).unwrap();
            store.set("k", json!(42)).await.unwrap();
        }
        let store = SqliteKvStore::new(&path).unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(42)));
    }
}
