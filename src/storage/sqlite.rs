use super::{KeyValueStore, StorageError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Single-table key/value store on top of SQLite.
pub struct SqliteStore {
    db_path: String,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: impl Into<String>) -> Result<Self, StorageError> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let store = Self {
            db_path,
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        info!("SQLite storage initialized at {}", self.db_path);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Backend("sqlite connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .prepare_cached("SELECT value FROM kv_store WHERE key = ?1")?
            .query_row(params![key], |row| row.get(0))
            .optional()?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let text = serde_json::to_string(&value)?;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();

        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )?
        .execute(params![key, text, timestamp])?;
        Ok(())
    }
}
