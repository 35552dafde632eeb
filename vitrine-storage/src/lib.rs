//! VITRINE Storage - Record Source Traits and Query Cache
//!
//! Defines the record store abstraction the catalog reads from and writes
//! to, an in-memory implementation, and the watermark-checked query cache
//! layered on top of it.

pub mod cache;

pub use cache::{
    CacheConfig, CacheEntry, CacheStats, CatalogQueryCache, CatalogRead, CatalogRecord, Freshness,
    InMemoryResultStore, KeyScope, LmdbResultStore, LmdbStoreError, QueryCacheStats,
    QueryFingerprint, QueryPage, RecordSourceOracle, ResultStore, ServedFrom, Watermark,
    WatermarkOracle,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;
use vitrine_core::{
    new_entity_id, CatalogFilter, EntityId, Product, SortSpec, StorageError, Timestamp,
    VitrineResult,
};

// ============================================================================
// RECORD SOURCE TRAITS
// ============================================================================

/// Read side of a record collection.
///
/// `max_modified_timestamp` must move forward on every write that could
/// change the result of `query` or `count`, removals included.
#[async_trait]
pub trait RecordSource<T: CatalogRecord>: Send + Sync {
    /// Records matching `filter`, ordered by `sort`, after skipping `skip`
    /// and returning at most `limit`.
    async fn query(
        &self,
        filter: &CatalogFilter,
        sort: &SortSpec,
        skip: u64,
        limit: u64,
    ) -> VitrineResult<Vec<T>>;

    /// Number of records matching `filter`, independent of pagination.
    async fn count(&self, filter: &CatalogFilter) -> VitrineResult<u64>;

    /// Latest modification stamp among records matching `filter`, or `None`
    /// when the collection has never held a record.
    async fn max_modified_timestamp(&self, filter: &CatalogFilter)
        -> VitrineResult<Option<Timestamp>>;

    /// Identity of this source's modification history.
    ///
    /// A source whose records do not outlive it must return an epoch unique
    /// to the instance, so pages cached against an earlier instance are
    /// never looked up again. `None` means the history is durable.
    fn epoch(&self) -> Option<EntityId> {
        None
    }
}

/// Write side of a record collection.
#[async_trait]
pub trait RecordWriter<T: CatalogRecord>: Send + Sync {
    /// Get a record by ID.
    async fn get(&self, id: EntityId) -> VitrineResult<Option<T>>;

    /// Insert a new record. Returns the stored record with its stamps.
    async fn insert(&self, record: T) -> VitrineResult<T>;

    /// Replace an existing record. Returns the stored record.
    async fn replace(&self, record: T) -> VitrineResult<T>;

    /// Remove a record. Returns what was removed.
    async fn remove(&self, id: EntityId) -> VitrineResult<T>;
}

// ============================================================================
// IN-MEMORY CATALOG
// ============================================================================

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<EntityId, Product>,
    /// Last stamp handed out by any write.
    last_stamp: Option<Timestamp>,
    /// Stamp of the most recent removal.
    last_removal: Option<Timestamp>,
}

impl CatalogState {
    /// Strictly increasing write stamp.
    fn next_stamp(&mut self) -> Timestamp {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + ChronoDuration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }
}

/// In-memory product collection.
///
/// Write stamps come from a strictly monotonic clock so two writes never
/// share an `updated_at`. Removals leave a stamp behind that feeds
/// `max_modified_timestamp`, which keeps deletions visible to watermark
/// readers. Each instance starts a new epoch, since its records die with it.
#[derive(Debug)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
    queries: AtomicU64,
    epoch: EntityId,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            queries: AtomicU64::new(0),
            epoch: new_entity_id(),
        }
    }
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored products.
    pub async fn len(&self) -> usize {
        self.state.read().await.products.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.products.is_empty()
    }

    /// Number of `query` calls served so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordSource<Product> for InMemoryCatalog {
    async fn query(
        &self,
        filter: &CatalogFilter,
        sort: &SortSpec,
        skip: u64,
        limit: u64,
    ) -> VitrineResult<Vec<Product>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read().await;
        let mut matching: Vec<&Product> = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .collect();
        matching.sort_by(|a, b| sort.compare(a, b));

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &CatalogFilter) -> VitrineResult<u64> {
        let state = self.state.read().await;
        Ok(state.products.values().filter(|p| filter.matches(p)).count() as u64)
    }

    async fn max_modified_timestamp(
        &self,
        filter: &CatalogFilter,
    ) -> VitrineResult<Option<Timestamp>> {
        let state = self.state.read().await;
        let latest_record = state
            .products
            .values()
            .filter(|p| filter.matches(p))
            .map(|p| p.updated_at)
            .max();
        Ok(latest_record.max(state.last_removal))
    }

    fn epoch(&self) -> Option<EntityId> {
        Some(self.epoch)
    }
}

#[async_trait]
impl RecordWriter<Product> for InMemoryCatalog {
    async fn get(&self, id: EntityId) -> VitrineResult<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.get(&id).cloned())
    }

    async fn insert(&self, mut record: Product) -> VitrineResult<Product> {
        let mut state = self.state.write().await;
        if state.products.contains_key(&record.product_id) {
            return Err(StorageError::InsertFailed {
                collection: Product::collection(),
                reason: "already exists".to_string(),
            }
            .into());
        }
        let stamp = state.next_stamp();
        record.created_at = stamp;
        record.updated_at = stamp;
        state.products.insert(record.product_id, record.clone());
        Ok(record)
    }

    async fn replace(&self, mut record: Product) -> VitrineResult<Product> {
        let mut state = self.state.write().await;
        let created_at = match state.products.get(&record.product_id) {
            Some(existing) => existing.created_at,
            None => {
                return Err(StorageError::NotFound {
                    collection: Product::collection(),
                    id: record.product_id,
                }
                .into())
            }
        };
        record.created_at = created_at;
        record.updated_at = state.next_stamp();
        state.products.insert(record.product_id, record.clone());
        Ok(record)
    }

    async fn remove(&self, id: EntityId) -> VitrineResult<Product> {
        let mut state = self.state.write().await;
        let removed = state.products.remove(&id).ok_or(StorageError::NotFound {
            collection: Product::collection(),
            id,
        })?;
        let stamp = state.next_stamp();
        state.last_removal = Some(stamp);
        Ok(removed)
    }
}

// ============================================================================
// TESTS
// ============================================================================
