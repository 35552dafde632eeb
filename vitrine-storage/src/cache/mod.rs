//! Query result cache with watermark-checked freshness.
//!
//! Catalog reads are keyed by a [`QueryFingerprint`] of their validated
//! [`vitrine_core::QuerySpec`]. Each cached page is tagged with the
//! collection [`Watermark`] observed after the page was read from the record
//! source. A cached page is served only while the collection's current
//! watermark has not moved past that tag.
//!
//! # Degradation
//!
//! The result store and the watermark oracle are both treated as
//! unreliable. An unreachable store turns every read into a cold read; an
//! unreachable oracle turns every cached page into a stale one. Neither ever
//! surfaces as an error to the caller. Record source failures do.
//!
//! # Example
//!
//! ```ignore
//! let cache = CatalogQueryCache::new(store, catalog.clone(), oracle, CacheConfig::from_env()?);
//!
//! let read = cache.fetch(&spec).await?;
//! if read.served_from() == ServedFrom::Cache {
//!     tracing::debug!("served without touching the catalog");
//! }
//! ```

pub mod entry;
pub mod fingerprint;
pub mod freshness;
pub mod lmdb_backend;
pub mod memory_backend;
pub mod query_cache;
pub mod traits;
pub mod watermark;

pub use entry::{CacheEntry, QueryPage};
pub use fingerprint::{KeyScope, QueryFingerprint};
pub use freshness::{CatalogRead, Freshness, ServedFrom};
pub use lmdb_backend::{LmdbResultStore, LmdbStoreError};
pub use memory_backend::InMemoryResultStore;
pub use query_cache::{CacheConfig, CatalogQueryCache, QueryCacheStats};
pub use traits::{CacheStats, CatalogRecord, ResultStore};
pub use watermark::{RecordSourceOracle, Watermark, WatermarkOracle};
