//! Watermark-checked query cache.
//!
//! Sits between catalog callers and a [`RecordSource`]. A read goes
//! fingerprint → result store lookup → oracle check → (serve | refill).
//! Refills read the watermark only after the data query, so a write that
//! races the query either lands in the page or pushes the watermark past
//! the page's tag.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use vitrine_core::{
    pagination, ConfigError, QuerySpec, QuerySpecParams, VitrineResult, DEFAULT_PAGE_SIZE,
};

use super::entry::{CacheEntry, QueryPage};
use super::fingerprint::{KeyScope, QueryFingerprint};
use super::freshness::{CatalogRead, Freshness};
use super::traits::{CatalogRecord, ResultStore};
use super::watermark::{Watermark, WatermarkOracle};
use crate::RecordSource;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Longest accepted entry TTL (30 days).
pub const MAX_ENTRY_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

/// Configuration for the query cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL for cached pages, independent of watermark freshness.
    pub entry_ttl: Duration,
    /// Upper bound on any single result store or oracle call.
    pub store_timeout: Duration,
    /// Records per page.
    pub page_size: u64,
    /// How often the owner of the result store sweeps expired entries.
    pub purge_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(3600), // 1 hour
            store_timeout: Duration::from_millis(250),
            page_size: DEFAULT_PAGE_SIZE,
            purge_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Set the per-call timeout for the result store and oracle.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the expired-entry sweep interval.
    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval = interval;
        self
    }

    /// Create CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `VITRINE_CACHE_TTL_SECS`: Entry TTL in seconds (default: 3600)
    /// - `VITRINE_CACHE_TIMEOUT_MS`: Store/oracle call timeout (default: 250)
    /// - `VITRINE_PAGE_SIZE`: Records per page (default: 10)
    /// - `VITRINE_CACHE_PURGE_SECS`: Expired-entry sweep interval (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults;
    /// set keys must parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let entry_ttl = parse_u64(&lookup, "VITRINE_CACHE_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.entry_ttl);
        let store_timeout = parse_u64(&lookup, "VITRINE_CACHE_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.store_timeout);
        let page_size = parse_u64(&lookup, "VITRINE_PAGE_SIZE")?.unwrap_or(defaults.page_size);
        let purge_interval = parse_u64(&lookup, "VITRINE_CACHE_PURGE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.purge_interval);

        let config = Self {
            entry_ttl,
            store_timeout,
            page_size,
            purge_interval,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that the builder cannot enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "page_size".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.entry_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "entry_ttl".to_string(),
                value: "0s".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.entry_ttl > MAX_ENTRY_TTL {
            return Err(ConfigError::InvalidValue {
                field: "entry_ttl".to_string(),
                value: format!("{}s", self.entry_ttl.as_secs()),
                reason: format!("must be at most {}s", MAX_ENTRY_TTL.as_secs()),
            });
        }
        if self.store_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "store_timeout".to_string(),
                value: "0ms".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.purge_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "purge_interval".to_string(),
                value: "0s".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Snapshot of query cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryCacheStats {
    /// Reads served from a fresh cached page.
    pub hits: u64,
    /// Reads that found no usable entry in the result store.
    pub misses: u64,
    /// Reads that found an entry the watermark check rejected.
    pub stale: u64,
    /// Pages read from the record source and written back.
    pub refills: u64,
    /// Result store calls that failed or timed out.
    pub store_errors: u64,
    /// Oracle calls that failed or timed out.
    pub oracle_errors: u64,
    /// Pages returned without caching because no watermark could be read.
    pub uncached_refills: u64,
}

impl QueryCacheStats {
    /// Fraction of reads served from cache (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.stale;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    refills: AtomicU64,
    store_errors: AtomicU64,
    oracle_errors: AtomicU64,
    uncached_refills: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> QueryCacheStats {
        QueryCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            refills: self.refills.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            oracle_errors: self.oracle_errors.load(Ordering::Relaxed),
            uncached_refills: self.uncached_refills.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// QUERY CACHE
// ============================================================================

/// Cache of paginated catalog query results.
///
/// # Type Parameters
///
/// - `T`: The record type being read
/// - `C`: The result store holding encoded pages
/// - `S`: The record source pages are read from on miss
/// - `O`: The watermark oracle for the record collection
pub struct CatalogQueryCache<T, C, S, O>
where
    C: ResultStore + ?Sized,
    S: RecordSource<T> + ?Sized,
    O: WatermarkOracle<T> + ?Sized,
    T: CatalogRecord,
{
    store: Arc<C>,
    source: Arc<S>,
    oracle: Arc<O>,
    config: CacheConfig,
    scope: KeyScope,
    counters: Arc<Counters>,
    _record: PhantomData<fn() -> T>,
}

impl<T, C, S, O> CatalogQueryCache<T, C, S, O>
where
    C: ResultStore + ?Sized,
    S: RecordSource<T> + ?Sized,
    O: WatermarkOracle<T> + ?Sized,
    T: CatalogRecord,
{
    /// Create a new query cache.
    ///
    /// Keys are scoped by the page size and the source's epoch, so caches
    /// that share a result store never read each other's pages unless both
    /// agree.
    pub fn new(store: Arc<C>, source: Arc<S>, oracle: Arc<O>, config: CacheConfig) -> Self {
        let scope = KeyScope::new(T::collection(), config.page_size).with_epoch(source.epoch());
        Self {
            store,
            source,
            oracle,
            config,
            scope,
            counters: Arc::new(Counters::default()),
            _record: PhantomData,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the result store.
    pub fn store(&self) -> &C {
        &self.store
    }

    /// Get a reference to the record source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Result store partition this cache reads and writes.
    pub fn scope(&self) -> &KeyScope {
        &self.scope
    }

    /// Result store key a query is cached under.
    pub fn storage_key(&self, spec: &QuerySpec) -> String {
        QueryFingerprint::of(spec).storage_key(&self.scope)
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> QueryCacheStats {
        self.counters.snapshot()
    }

    /// Validate raw parameters, then [`fetch`](Self::fetch).
    pub async fn fetch_params(&self, params: QuerySpecParams) -> VitrineResult<CatalogRead<T>> {
        let spec = params.into_spec()?;
        self.fetch(&spec).await
    }

    /// Read one page of the catalog.
    ///
    /// Serves a cached page when the collection's current watermark has not
    /// moved past the page's tag; otherwise reads from the record source and
    /// writes the page back. Result store and oracle failures degrade to a
    /// record source read. Record source failures are returned.
    pub async fn fetch(&self, spec: &QuerySpec) -> VitrineResult<CatalogRead<T>> {
        let fingerprint = QueryFingerprint::of(spec);
        let key = fingerprint.storage_key(&self.scope);

        match self.lookup(&fingerprint, &key).await {
            Some(entry) => {
                let current = self.read_watermark().await;
                let verdict = Freshness::assess(entry.watermark, current);
                if verdict.is_servable() {
                    Counters::bump(&self.counters.hits);
                    debug!(
                        fingerprint = %fingerprint,
                        watermark = %entry.watermark,
                        "Query cache hit"
                    );
                    return Ok(CatalogRead::from_cache(
                        entry,
                        spec.page(),
                        self.config.page_size,
                    ));
                }
                Counters::bump(&self.counters.stale);
                debug!(
                    fingerprint = %fingerprint,
                    cached = %entry.watermark,
                    current = ?current,
                    verdict = verdict.as_str(),
                    "Cached page rejected"
                );
            }
            None => {
                Counters::bump(&self.counters.misses);
                debug!(fingerprint = %fingerprint, "Query cache miss");
            }
        }

        self.refill(spec, &fingerprint, &key).await
    }

    /// Look up and decode the entry under `key`. Every failure is a miss.
    async fn lookup(&self, fingerprint: &QueryFingerprint, key: &str) -> Option<CacheEntry<T>> {
        let bytes = match tokio::time::timeout(self.config.store_timeout, self.store.get(key)).await
        {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                Counters::bump(&self.counters.store_errors);
                warn!(fingerprint = %fingerprint, error = %e, "Result store get failed");
                return None;
            }
            Err(_) => {
                Counters::bump(&self.counters.store_errors);
                warn!(
                    fingerprint = %fingerprint,
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "Result store get timed out"
                );
                return None;
            }
        };

        match CacheEntry::<T>::decode(&bytes) {
            Ok(entry) if entry.belongs_to(fingerprint) => Some(entry),
            Ok(entry) => {
                warn!(
                    fingerprint = %fingerprint,
                    stored = %entry.fingerprint,
                    "Cached entry belongs to another query"
                );
                None
            }
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Cached entry undecodable");
                None
            }
        }
    }

    /// Current collection watermark, or `None` if the oracle failed.
    async fn read_watermark(&self) -> Option<Watermark> {
        match tokio::time::timeout(self.config.store_timeout, self.oracle.current_watermark())
            .await
        {
            Ok(Ok(watermark)) => Some(watermark),
            Ok(Err(e)) => {
                Counters::bump(&self.counters.oracle_errors);
                warn!(error = %e, "Watermark oracle failed");
                None
            }
            Err(_) => {
                Counters::bump(&self.counters.oracle_errors);
                warn!(
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "Watermark oracle timed out"
                );
                None
            }
        }
    }

    /// Read the page from the record source and write it back.
    async fn refill(
        &self,
        spec: &QuerySpec,
        fingerprint: &QueryFingerprint,
        key: &str,
    ) -> VitrineResult<CatalogRead<T>> {
        let filter = spec.filter();
        let sort = spec.sort();
        let page_size = self.config.page_size;

        let total_count = self.source.count(&filter).await?;
        let records = self
            .source
            .query(
                &filter,
                &sort,
                pagination::skip_for_page(spec.page(), page_size),
                page_size,
            )
            .await?;

        // Read only after the query.
        let Some(watermark) = self.read_watermark().await else {
            Counters::bump(&self.counters.uncached_refills);
            warn!(
                fingerprint = %fingerprint,
                "No watermark after refill, page not cached"
            );
            return Ok(CatalogRead::from_store(
                records,
                total_count,
                spec.page(),
                page_size,
                None,
            ));
        };

        let entry = CacheEntry::new(
            fingerprint,
            QueryPage {
                records,
                total_count,
            },
            watermark,
        );
        self.write_back(fingerprint, key, &entry).await;
        Counters::bump(&self.counters.refills);
        debug!(
            fingerprint = %fingerprint,
            watermark = %watermark,
            total_count,
            "Query cache refilled"
        );

        Ok(CatalogRead::from_store(
            entry.result.records,
            entry.result.total_count,
            spec.page(),
            page_size,
            Some(watermark),
        ))
    }

    /// Best-effort write of an entry. Failures are logged and dropped.
    async fn write_back(&self, fingerprint: &QueryFingerprint, key: &str, entry: &CacheEntry<T>) {
        let bytes = match entry.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Cache entry encode failed");
                return;
            }
        };

        match tokio::time::timeout(
            self.config.store_timeout,
            self.store.set(key, bytes, self.config.entry_ttl),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                Counters::bump(&self.counters.store_errors);
                warn!(fingerprint = %fingerprint, error = %e, "Result store set failed");
            }
            Err(_) => {
                Counters::bump(&self.counters.store_errors);
                warn!(fingerprint = %fingerprint, "Result store set timed out");
            }
        }
    }
}

impl<T, C, S, O> Clone for CatalogQueryCache<T, C, S, O>
where
    C: ResultStore + ?Sized,
    S: RecordSource<T> + ?Sized,
    O: WatermarkOracle<T> + ?Sized,
    T: CatalogRecord,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            source: Arc::clone(&self.source),
            oracle: Arc::clone(&self.oracle),
            config: self.config.clone(),
            scope: self.scope.clone(),
            counters: Arc::clone(&self.counters),
            _record: PhantomData,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
