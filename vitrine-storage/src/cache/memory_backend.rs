//! In-memory result store.
//!
//! Entries expire on the tokio clock, so tests can drive expiry with a
//! paused runtime. Expired entries are dropped lazily on read or in bulk by
//! [`ResultStore::purge_expired`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use vitrine_core::VitrineResult;

use super::traits::{CacheStats, ResultStore};

#[derive(Debug)]
struct StoredValue {
    bytes: Vec<u8>,
    /// `None` when the TTL reaches past what the clock can represent.
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<String, StoredValue>,
    stats: CacheStats,
}

impl StoreInner {
    fn insert(&mut self, key: String, value: StoredValue) {
        self.stats.memory_bytes += value.size();
        if let Some(old) = self.entries.insert(key, value) {
            self.stats.memory_bytes -= old.size();
        }
        self.stats.entry_count = self.entries.len() as u64;
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(old) => {
                self.stats.memory_bytes -= old.size();
                self.stats.entry_count = self.entries.len() as u64;
                true
            }
            None => false,
        }
    }
}

/// Result store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn get(&self, key: &str) -> VitrineResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let expired = match inner.entries.get(key) {
            Some(value) if !value.is_expired(now) => {
                let bytes = value.bytes.clone();
                inner.stats.hits += 1;
                return Ok(Some(bytes));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.remove(key);
            inner.stats.expirations += 1;
        }
        inner.stats.misses += 1;
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> VitrineResult<()> {
        let expires_at = Instant::now().checked_add(ttl);
        let mut inner = self.inner.write().await;
        inner.insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> VitrineResult<bool> {
        Ok(self.inner.write().await.remove(key))
    }

    async fn stats(&self) -> VitrineResult<CacheStats> {
        Ok(self.inner.read().await.stats.clone())
    }

    async fn purge_expired(&self) -> VitrineResult<u64> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let mut purged = 0u64;
        let mut freed = 0u64;
        inner.entries.retain(|_, v| {
            if v.is_expired(now) {
                purged += 1;
                freed += v.size();
                false
            } else {
                true
            }
        });
        inner.stats.memory_bytes -= freed;
        inner.stats.entry_count = inner.entries.len() as u64;
        inner.stats.expirations += purged;
        Ok(purged)
    }

    async fn close(&self) -> VitrineResult<()> {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.stats.entry_count = 0;
        inner.stats.memory_bytes = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryResultStore::new();
        store
            .set("products:qf1:a", b"page".to_vec(), HOUR)
            .await
            .expect("set should succeed");

        let value = store.get("products:qf1:a").await.expect("get should succeed");
        assert_eq!(value.as_deref(), Some(&b"page"[..]));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store = InMemoryResultStore::new();
        let value = store.get("missing").await.expect("get should succeed");
        assert!(value.is_none());

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = InMemoryResultStore::new();
        store
            .set("k", b"one".to_vec(), HOUR)
            .await
            .expect("set should succeed");
        store
            .set("k", b"two".to_vec(), HOUR)
            .await
            .expect("set should succeed");

        let value = store.get("k").await.expect("get should succeed");
        assert_eq!(value.as_deref(), Some(&b"two"[..]));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryResultStore::new();
        store
            .set("k", b"v".to_vec(), HOUR)
            .await
            .expect("set should succeed");

        assert!(store.delete("k").await.expect("delete should succeed"));
        assert!(!store.delete("k").await.expect("delete should succeed"));
        assert!(store.get("k").await.expect("get should succeed").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = InMemoryResultStore::new();
        store
            .set("k", b"v".to_vec(), Duration::from_secs(10))
            .await
            .expect("set should succeed");

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.get("k").await.expect("get should succeed").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("k").await.expect("get should succeed").is_none());
        assert!(store.is_empty().await);

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = InMemoryResultStore::new();
        store
            .set("short", b"v".to_vec(), Duration::from_secs(1))
            .await
            .expect("set should succeed");
        store
            .set("long", b"v".to_vec(), HOUR)
            .await
            .expect("set should succeed");

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.purge_expired().await.expect("purge should succeed"), 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get("long").await.expect("get should succeed").is_some());

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.memory_bytes, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_never_expires() {
        let store = InMemoryResultStore::new();
        store
            .set("k", b"v".to_vec(), Duration::MAX)
            .await
            .expect("set should succeed");

        assert!(store.get("k").await.expect("get should succeed").is_some());
        assert_eq!(store.purge_expired().await.expect("purge should succeed"), 0);
    }

    #[tokio::test]
    async fn test_stats_track_size_across_overwrite_and_delete() {
        let store = InMemoryResultStore::new();
        store
            .set("a", vec![0u8; 100], HOUR)
            .await
            .expect("set should succeed");
        store
            .set("a", vec![0u8; 40], HOUR)
            .await
            .expect("set should succeed");
        store
            .set("b", vec![0u8; 10], HOUR)
            .await
            .expect("set should succeed");

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.memory_bytes, 50);

        store.delete("a").await.expect("delete should succeed");
        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.memory_bytes, 10);
    }

    #[tokio::test]
    async fn test_stats_track_size() {
        let store = InMemoryResultStore::new();
        store
            .set("a", vec![0u8; 100], HOUR)
            .await
            .expect("set should succeed");
        store
            .set("b", vec![0u8; 50], HOUR)
            .await
            .expect("set should succeed");
        store.get("a").await.expect("get should succeed");

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.memory_bytes, 150);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_close_drops_entries() {
        let store = InMemoryResultStore::new();
        store
            .set("a", b"v".to_vec(), HOUR)
            .await
            .expect("set should succeed");
        store.close().await.expect("close should succeed");
        assert!(store.is_empty().await);
    }
}
