//! Result store trait and cacheable record marker.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use vitrine_core::{EntityId, Product, Timestamp, VitrineResult};

/// Marker trait for records whose query pages can be cached.
///
/// # Implementation Requirements
///
/// - `collection()` must return the same name for every instance; it scopes
///   result store keys
/// - `modified_at()` must advance on every write to the record
pub trait CatalogRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the collection this record type lives in.
    fn collection() -> &'static str;

    /// Unique identifier of this record.
    fn record_id(&self) -> EntityId;

    /// Last modification stamp.
    fn modified_at(&self) -> Timestamp;
}

impl CatalogRecord for Product {
    fn collection() -> &'static str {
        "products"
    }

    fn record_id(&self) -> EntityId {
        self.product_id
    }

    fn modified_at(&self) -> Timestamp {
        self.updated_at
    }
}

/// Opaque key/value store for encoded query pages.
///
/// Implementations are free to lose entries at any time. Callers treat
/// every error from this trait as a cache miss.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Get the bytes stored under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> VitrineResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value. The entry
    /// expires after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> VitrineResult<()>;

    /// Delete the entry under `key`. Returns whether an entry was removed.
    async fn delete(&self, key: &str) -> VitrineResult<bool>;

    /// Get store statistics.
    async fn stats(&self) -> VitrineResult<CacheStats>;

    /// Drop every expired entry. Returns how many were dropped.
    ///
    /// Stores that evict on their own keep the default.
    async fn purge_expired(&self) -> VitrineResult<u64> {
        Ok(0)
    }

    /// Flush and release the store. Further calls may fail.
    async fn close(&self) -> VitrineResult<()>;
}

/// Statistics about result store usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of gets that found a live entry.
    pub hits: u64,
    /// Number of gets that found nothing.
    pub misses: u64,
    /// Number of entries currently held, expired ones included until purged.
    pub entry_count: u64,
    /// Approximate payload size in bytes.
    pub memory_bytes: u64,
    /// Number of entries dropped because their TTL ran out.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vitrine_core::new_entity_id;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_product_record_identity() {
        let now = Utc::now();
        let product = Product {
            product_id: new_entity_id(),
            title: "Lamp".to_string(),
            slug: "lamp".to_string(),
            description: "A lamp".to_string(),
            price: 20.0,
            count_in_stock: 1,
            in_stock: true,
            rating: 3.5,
            brand: "Acme".to_string(),
            category: "Home".to_string(),
            image: None,
            created_by: new_entity_id(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(Product::collection(), "products");
        assert_eq!(product.record_id(), product.product_id);
        assert_eq!(product.modified_at(), now);
    }
}
