//! Persistent key-value storage for Harvest records.
//!
//! Every record (jobs, insight lists, hash sets, registries) is stored as an
//! opaque JSON blob under a well-known key.

mod memory;
mod sqlite;

pub use memory::MemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;

use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Well-known record keys.
pub mod keys {
    pub const JOBS: &str = "jobs";
    pub const PROCESSED_VIDEOS: &str = "processed_videos";
    pub const PENDING_INSIGHTS: &str = "insights.pending";
    pub const APPROVED_INSIGHTS: &str = "insights.approved";
    pub const REJECTED_INSIGHTS: &str = "insights.rejected";
    pub const CHANNELS: &str = "channels";
    pub const CONTENT_HASHES: &str = "content_hashes";
    pub const QUALITY_STATS: &str = "quality_stats";
}

/// Read-modify-write step for [`KeyValueStore::update`]: receives the current
/// raw value and returns the value to store.
pub type UpdateFn<'a> = dyn FnMut(Option<String>) -> Result<String> + Send + 'a;

/// Trait for key-value store implementations.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// List all keys.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Atomically replace the value under `key` with `apply(current)`.
    ///
    /// No other writer, in this process or another one sharing the store,
    /// can interleave between the read and the write. An error from `apply`
    /// leaves the value untouched.
    async fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<()>;
}

fn decode<T>(key: &str, raw: Option<String>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match raw {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| HarvestError::Store(format!("Corrupt record '{}': {}", key, e))),
        None => Ok(T::default()),
    }
}

/// Typed JSON access on top of a [`KeyValueStore`].
#[derive(Clone)]
pub struct Records {
    kv: Arc<dyn KeyValueStore>,
}

impl Records {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load a record, falling back to its default when absent.
    pub async fn load<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        decode(key, self.kv.get(key).await?)
    }

    /// Serialize and store a record.
    pub async fn save<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.kv.set(key, &raw).await
    }

    /// Atomically load, modify and store a record.
    ///
    /// `modify` runs once against the freshly read value; if it fails,
    /// nothing is written and its error is returned.
    pub async fn update<T, R, F>(&self, key: &str, modify: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> Result<R> + Send,
        R: Send,
    {
        let mut modify = Some(modify);
        let mut output = None;
        let mut apply = |raw: Option<String>| -> Result<String> {
            let modify = modify
                .take()
                .ok_or_else(|| HarvestError::Store(format!("Update of '{}' ran twice", key)))?;
            let mut value: T = decode(key, raw)?;
            output = Some(modify(&mut value)?);
            Ok(serde_json::to_string(&value)?)
        };
        self.kv.update(key, &mut apply).await?;
        output.ok_or_else(|| HarvestError::Store(format!("Update of '{}' did not run", key)))
    }

    /// Access the underlying store.
    pub fn raw(&self) -> Arc<dyn KeyValueStore> {
        self.kv.clone()
    }
}
