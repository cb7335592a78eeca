//! In-memory key-value store implementation.
//!
//! Useful for testing and dry runs.

use super::{KeyValueStore, UpdateFn};
use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory key-value store.
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> HarvestError {
    HarvestError::Store(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        Ok(entries.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let value = apply(entries.get(key).cloned())?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryKeyValueStore::new();

        store.set("b", "2").await.unwrap();
        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_update() {
        let store = MemoryKeyValueStore::new();
        store
            .update("n", &mut |raw| Ok(format!("{}1", raw.unwrap_or_default())))
            .await
            .unwrap();
        store
            .update("n", &mut |raw| Ok(format!("{}1", raw.unwrap_or_default())))
            .await
            .unwrap();
        assert_eq!(store.get("n").await.unwrap(), Some("11".to_string()));

        let failed = store
            .update("n", &mut |_| Err(HarvestError::Store("boom".to_string())))
            .await;
        assert!(failed.is_err());
        assert_eq!(store.get("n").await.unwrap(), Some("11".to_string()));
    }
}
