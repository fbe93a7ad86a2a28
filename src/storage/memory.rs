use super::{KeyValueStore, StorageError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store. Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, Value>>,
    // Mirrors the per-item size limit of browser sync storage.
    quota_bytes_per_item: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes_per_item: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            quota_bytes_per_item: Some(quota_bytes_per_item),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let slots = self.slots.read().await;
        Ok(slots.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        if let Some(limit) = self.quota_bytes_per_item {
            // Size is counted the way sync storage does: key plus JSON text.
            let size = key.len() + serde_json::to_string(&value)?.len();
            if size > limit {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    size,
                    limit,
                });
            }
        }

        let mut slots = self.slots.write().await;
        slots.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("blockedDomains").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store
            .set("blockedDomains", json!(["example.com"]))
            .await
            .unwrap();
        assert_eq!(
            store.get("blockedDomains").await.unwrap(),
            Some(json!(["example.com"]))
        );
    }

    #[tokio::test]
    async fn test_quota_rejects_large_items_and_keeps_old_value() {
        let store = MemoryStore::with_quota(32);
        store.set("k", json!(["a.io"])).await.unwrap();

        let big = json!(["a-very-long-domain-name.example.com"]);
        let err = store.set("k", big).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { limit: 32, .. }));
        assert_eq!(store.get("k").await.unwrap(), Some(json!(["a.io"])));
    }
}
