//! Content normalization, hashing and the persistent dedup store.
//!
//! Hashes are computed over normalized text (lowercased, punctuation
//! stripped, whitespace collapsed) so cosmetic differences never produce a
//! new entry.

use crate::error::Result;
use crate::store::{keys, Records};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use tracing::debug;

/// Normalize text for duplicate detection.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 hex digest of the normalized text.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(normalize(text).as_bytes()))
}

/// Hash identifying an insight by its title and body.
pub fn insight_hash(title: &str, insight: &str) -> String {
    content_hash(&format!("{} {}", title, insight))
}

/// Persistent set of accepted content hashes.
///
/// Nothing is cached: every read sees hashes written by other stores over
/// the same records, and writes are atomic read-modify-writes.
pub struct DedupStore {
    records: Records,
}

impl DedupStore {
    pub fn new(records: Records) -> Self {
        Self { records }
    }

    /// Every accepted hash.
    pub async fn snapshot(&self) -> Result<BTreeSet<String>> {
        self.records.load(keys::CONTENT_HASHES).await
    }

    /// Whether `hash` has already been accepted.
    pub async fn contains(&self, hash: &str) -> Result<bool> {
        Ok(self.snapshot().await?.contains(hash))
    }

    /// Record `hash` as accepted. Returns `false` if it was already present.
    pub async fn insert(&self, hash: &str) -> Result<bool> {
        Ok(!self.claim(&[hash.to_string()]).await?.is_empty())
    }

    /// Accept every hash not yet present and return those, in input order.
    ///
    /// Hashes another writer accepted first are left out of the result.
    pub async fn claim(&self, hashes: &[String]) -> Result<Vec<String>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let claimed = self
            .records
            .update(keys::CONTENT_HASHES, |set: &mut BTreeSet<String>| {
                Ok(hashes
                    .iter()
                    .filter(|h| set.insert((*h).clone()))
                    .cloned()
                    .collect::<Vec<_>>())
            })
            .await?;
        debug!(requested = hashes.len(), claimed = claimed.len(), "Claimed content hashes");
        Ok(claimed)
    }

    /// Undo a [`claim`](Self::claim) whose insights were never stored.
    pub async fn release(&self, hashes: &[String]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        self.records
            .update(keys::CONTENT_HASHES, |set: &mut BTreeSet<String>| {
                for hash in hashes {
                    set.remove(hash);
                }
                Ok(())
            })
            .await?;
        debug!(count = hashes.len(), "Released content hashes");
        Ok(())
    }

    /// Number of accepted hashes.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.snapshot().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKeyValueStore;
    use std::sync::Arc;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hello,   WORLD!\n\tAgain "), "hello world again");
        assert_eq!(normalize("it's"), "its");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_hash_ignores_cosmetic_differences() {
        let samples = [
            "Listen before you fix.",
            "  LISTEN before   you fix ",
            "listen, before you... fix!",
        ];
        let first = content_hash(samples[0]);
        for s in samples {
            assert_eq!(content_hash(s), first);
            assert_eq!(content_hash(s), content_hash(&normalize(s)));
        }
        assert_ne!(content_hash("listen after you fix"), first);
    }

    #[tokio::test]
    async fn test_dedup_store_insert_is_idempotent() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = DedupStore::new(Records::new(kv.clone()));
        let hash = insight_hash("Name the feeling", "Say what you notice.");

        assert!(!store.contains(&hash).await.unwrap());
        assert!(store.insert(&hash).await.unwrap());
        assert!(!store.insert(&hash).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);

        // A fresh store over the same backing records sees the hash.
        let reopened = DedupStore::new(Records::new(kv));
        assert!(reopened.contains(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_stores_over_shared_records_keep_each_others_hashes() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let first = DedupStore::new(Records::new(kv.clone()));
        let second = DedupStore::new(Records::new(kv.clone()));
        let h1 = insight_hash("Name the feeling", "Say what you notice.");
        let h2 = insight_hash("Slow down", "Leave a pause.");

        assert!(!first.contains(&h1).await.unwrap());
        assert!(second.insert(&h2).await.unwrap());
        assert!(first.insert(&h1).await.unwrap());
        assert!(first.contains(&h2).await.unwrap());

        let fresh = DedupStore::new(Records::new(kv));
        assert!(fresh.contains(&h1).await.unwrap());
        assert!(fresh.contains(&h2).await.unwrap());
        assert!(!fresh.insert(&h2).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_claims_accept_each_hash_once() {
        let kv = Arc::new(crate::store::testing::YieldingStore::new());
        let first = DedupStore::new(Records::new(kv.clone()));
        let second = DedupStore::new(Records::new(kv));
        let shared = content_hash("listen before you fix");
        let a = vec![shared.clone(), content_hash("only a")];
        let b = vec![shared.clone(), content_hash("only b")];

        let (claimed_a, claimed_b) = tokio::join!(first.claim(&a), second.claim(&b));
        let (claimed_a, claimed_b) = (claimed_a.unwrap(), claimed_b.unwrap());

        assert_eq!(claimed_a.len() + claimed_b.len(), 3);
        assert!(claimed_a.contains(&shared) != claimed_b.contains(&shared));
        assert_eq!(first.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_release_undoes_claim() {
        let store = DedupStore::new(Records::new(Arc::new(MemoryKeyValueStore::new())));
        let kept = content_hash("kept");
        store.insert(&kept).await.unwrap();

        let claimed = store
            .claim(&[kept.clone(), content_hash("new")])
            .await
            .unwrap();
        assert_eq!(claimed, vec![content_hash("new")]);

        store.release(&claimed).await.unwrap();
        assert_eq!(store.snapshot().await.unwrap().into_iter().collect::<Vec<_>>(), vec![kept]);
    }
}
