//! Key/value persistence used by the blocklist and theme stores.
//!
//! The stores only rely on [`KeyValueStore`]; the adapters in this module are
//! the host-side backends selected through `[storage]` in the config.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("value for '{key}' is {size} bytes, over the {limit} byte item quota")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },
    #[error("storage did not respond within {0}ms")]
    Timeout(u64),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// Asynchronous get/set of named slots.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}
