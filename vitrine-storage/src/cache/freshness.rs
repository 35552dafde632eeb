//! Freshness verdicts and the read wrapper returned by the query cache.

use chrono::Utc;
use vitrine_core::{pagination, Timestamp};

use super::entry::CacheEntry;
use super::watermark::Watermark;

/// Verdict on whether a cached page may be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No write has landed since the page was cached.
    Fresh,
    /// The collection moved past the page's watermark.
    Stale,
    /// The current watermark could not be read.
    Unverified,
}

impl Freshness {
    /// Judge a cached page tagged `cached` against the collection's
    /// `current` watermark (`None` when the oracle could not answer).
    ///
    /// An `Empty` current watermark is fresh: a collection that has never
    /// held a record cannot have changed under any cached page. This holds
    /// only within one source history, which the storage key's epoch pins.
    pub fn assess(cached: Watermark, current: Option<Watermark>) -> Self {
        match current {
            None => Freshness::Unverified,
            Some(Watermark::Empty) => Freshness::Fresh,
            Some(current) if current <= cached => Freshness::Fresh,
            Some(_) => Freshness::Stale,
        }
    }

    /// Only fresh pages are served.
    pub fn is_servable(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
            Freshness::Unverified => "unverified",
        }
    }
}

/// Where a catalog read was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServedFrom {
    Cache,
    Store,
}

impl ServedFrom {
    /// Caller-facing message describing the source.
    pub fn message(&self) -> &'static str {
        match self {
            ServedFrom::Cache => "Data fetched from cache",
            ServedFrom::Store => "Data retrieved from database",
        }
    }
}

/// Result of a catalog read, carrying where it came from and the watermark
/// it was validated against.
#[derive(Debug, Clone)]
pub struct CatalogRead<T> {
    records: Vec<T>,
    total_count: u64,
    page: u64,
    page_size: u64,
    served_from: ServedFrom,
    watermark: Option<Watermark>,
    cached_at: Timestamp,
}

impl<T> CatalogRead<T> {
    /// A read answered from a cached entry.
    pub fn from_cache(entry: CacheEntry<T>, page: u64, page_size: u64) -> Self {
        Self {
            records: entry.result.records,
            total_count: entry.result.total_count,
            page,
            page_size,
            served_from: ServedFrom::Cache,
            watermark: Some(entry.watermark),
            cached_at: entry.stored_at,
        }
    }

    /// A read answered from the record source. `watermark` is `None` when
    /// the post-read watermark was unavailable and the page was not cached.
    pub fn from_store(
        records: Vec<T>,
        total_count: u64,
        page: u64,
        page_size: u64,
        watermark: Option<Watermark>,
    ) -> Self {
        Self {
            records,
            total_count,
            page,
            page_size,
            served_from: ServedFrom::Store,
            watermark,
            cached_at: Utc::now(),
        }
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    /// Consume the wrapper and return the records.
    pub fn into_records(self) -> Vec<T> {
        self.records
    }

    /// Number of records matching the filter, across all pages.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_pages(&self) -> u64 {
        pagination::total_pages(self.total_count, self.page_size)
    }

    pub fn served_from(&self) -> ServedFrom {
        self.served_from
    }

    pub fn is_cache_hit(&self) -> bool {
        self.served_from == ServedFrom::Cache
    }

    pub fn watermark(&self) -> Option<Watermark> {
        self.watermark
    }

    /// When the page was read from the record source.
    pub fn cached_at(&self) -> Timestamp {
        self.cached_at
    }
}
