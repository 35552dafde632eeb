//! LMDB-backed result store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep cached query pages in
//! a memory-mapped file that survives process restarts.
//!
//! # Value Layout
//!
//! `[expires_at: 8 bytes, i64 LE unix millis][payload]`
//!
//! Expiry is checked against the wall clock on every read. Expired values
//! are reported as absent and deleted on the spot; [`LmdbResultStore::remove_expired`]
//! sweeps the rest.

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use vitrine_core::{CacheError, VitrineError, VitrineResult};

use super::traits::{CacheStats, ResultStore};

/// Size of the expiry header in front of every value.
const HEADER_LEN: usize = 8;

/// Error type for LMDB result store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored value is shorter than its header.
    #[error("Corrupt value under key {0}")]
    Corrupt(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for VitrineError {
    fn from(e: LmdbStoreError) -> Self {
        VitrineError::Cache(CacheError::Unavailable {
            reason: e.to_string(),
        })
    }
}

/// Result store persisted in LMDB.
pub struct LmdbResultStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    stats: RwLock<CacheStats>,
}

impl LmdbResultStore {
    /// Open (or create) a store under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per path by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    /// Delete every expired value. Returns how many were deleted.
    pub fn remove_expired(&self) -> Result<u64, LmdbStoreError> {
        let now = Utc::now().timestamp_millis();
        let expired = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            let iter = self
                .db
                .iter(&rtxn)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

            let mut keys = Vec::new();
            for result in iter {
                let (key, value) = result.map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
                let live = split_value(value).map_or(false, |(expires_at, _)| expires_at > now);
                if !live {
                    keys.push(key.to_vec());
                }
            }
            keys
        };

        if expired.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let mut deleted = 0u64;
        for key in &expired {
            if self
                .db
                .delete(&mut wtxn, key)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
            {
                deleted += 1;
            }
        }
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        if let Ok(mut stats) = self.stats.write() {
            stats.expirations += deleted;
        }
        Ok(deleted)
    }

    fn record_hit(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.hits += 1;
        }
    }

    fn record_miss(&self, expired: bool) {
        if let Ok(mut stats) = self.stats.write() {
            stats.misses += 1;
            if expired {
                stats.expirations += 1;
            }
        }
    }

    fn delete_key(&self, key: &[u8]) -> Result<bool, LmdbStoreError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let removed = self
            .db
            .delete(&mut wtxn, key)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(removed)
    }
}

/// Split a stored value into its expiry and payload.
fn split_value(bytes: &[u8]) -> Option<(i64, &[u8])> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    let (header, payload) = bytes.split_at(HEADER_LEN);
    let expires_at = i64::from_le_bytes(header.try_into().ok()?);
    Some((expires_at, payload))
}

#[async_trait]
impl ResultStore for LmdbResultStore {
    async fn get(&self, key: &str) -> VitrineResult<Option<Vec<u8>>> {
        let now = Utc::now().timestamp_millis();
        let found = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            match self.db.get(&rtxn, key.as_bytes()) {
                Ok(Some(bytes)) => {
                    let (expires_at, payload) = split_value(bytes)
                        .ok_or_else(|| LmdbStoreError::Corrupt(key.to_string()))?;
                    Some((expires_at, payload.to_vec()))
                }
                Ok(None) => None,
                Err(e) => {
                    self.record_miss(false);
                    return Err(LmdbStoreError::Transaction(e.to_string()).into());
                }
            }
        };

        match found {
            Some((expires_at, payload)) if expires_at > now => {
                self.record_hit();
                Ok(Some(payload))
            }
            Some(_) => {
                self.delete_key(key.as_bytes())?;
                self.record_miss(true);
                Ok(None)
            }
            None => {
                self.record_miss(false);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> VitrineResult<()> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_millis);

        let mut full_bytes = Vec::with_capacity(HEADER_LEN + value.len());
        full_bytes.extend_from_slice(&expires_at.to_le_bytes());
        full_bytes.extend_from_slice(&value);

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, key.as_bytes(), &full_bytes)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> VitrineResult<bool> {
        Ok(self.delete_key(key.as_bytes())?)
    }

    async fn stats(&self) -> VitrineResult<CacheStats> {
        let mut stats = self
            .stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();

        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        stats.entry_count = self
            .db
            .len(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut bytes = 0u64;
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        for (_, value) in iter.flatten() {
            bytes += value.len().saturating_sub(HEADER_LEN) as u64;
        }
        stats.memory_bytes = bytes;
        Ok(stats)
    }

    async fn purge_expired(&self) -> VitrineResult<u64> {
        Ok(self.remove_expired()?)
    }

    async fn close(&self) -> VitrineResult<()> {
        self.env
            .force_sync()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn create_test_store() -> (LmdbResultStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbResultStore::open(temp_dir.path(), 10).expect("open should succeed");
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_open_store() {
        let (store, _temp_dir) = create_test_store();
        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (store, _temp_dir) = create_test_store();
        store
            .set("products:qf1:abc", b"{\"records\":[]}".to_vec(), HOUR)
            .await
            .expect("set should succeed");

        let value = store
            .get("products:qf1:abc")
            .await
            .expect("get should succeed");
        assert_eq!(value.as_deref(), Some(&b"{\"records\":[]}"[..]));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (store, _temp_dir) = create_test_store();
        let value = store.get("missing").await.expect("get should succeed");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_overwrite() {
        let (store, _temp_dir) = create_test_store();
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
        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _temp_dir) = create_test_store();
        store
            .set("k", b"v".to_vec(), HOUR)
            .await
            .expect("set should succeed");

        assert!(store.delete("k").await.expect("delete should succeed"));
        assert!(!store.delete("k").await.expect("delete should succeed"));
        assert!(store.get("k").await.expect("get should succeed").is_none());
    }

    #[tokio::test]
    async fn test_expired_value_is_absent_and_deleted() {
        let (store, _temp_dir) = create_test_store();
        store
            .set("k", b"v".to_vec(), Duration::ZERO)
            .await
            .expect("set should succeed");

        assert!(store.get("k").await.expect("get should succeed").is_none());

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, _temp_dir) = create_test_store();
        store
            .set("gone", b"v".to_vec(), Duration::ZERO)
            .await
            .expect("set should succeed");
        store
            .set("kept", b"v".to_vec(), HOUR)
            .await
            .expect("set should succeed");

        assert_eq!(store.remove_expired().expect("purge should succeed"), 1);
        assert!(store.get("kept").await.expect("get should succeed").is_some());
        assert_eq!(store.remove_expired().expect("purge should succeed"), 0);

        store
            .set("gone-again", b"v".to_vec(), Duration::ZERO)
            .await
            .expect("set should succeed");
        let purged = ResultStore::purge_expired(&store)
            .await
            .expect("purge should succeed");
        assert_eq!(purged, 1);
        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let (store, _temp_dir) = create_test_store();
        store
            .set("a", vec![1u8; 40], HOUR)
            .await
            .expect("set should succeed");
        store.get("a").await.expect("get should succeed");
        store.get("b").await.expect("get should succeed");

        let stats = store.stats().await.expect("stats should succeed");
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.memory_bytes, 40);
        assert!((stats.hit_rate() - 0.5).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let store = LmdbResultStore::open(temp_dir.path(), 10).expect("open should succeed");
            store
                .set("k", b"persisted".to_vec(), HOUR)
                .await
                .expect("set should succeed");
            store.close().await.expect("close should succeed");
        }

        let reopened = LmdbResultStore::open(temp_dir.path(), 10).expect("reopen should succeed");
        let value = reopened.get("k").await.expect("get should succeed");
        assert_eq!(value.as_deref(), Some(&b"persisted"[..]));
    }

    #[test]
    fn test_split_value_rejects_short_values() {
        assert!(split_value(&[1, 2, 3]).is_none());
        let mut bytes = 42i64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"x");
        assert_eq!(split_value(&bytes), Some((42, &b"x"[..])));
    }
}
