//! Collection watermarks and the oracle that reads them.
//!
//! A watermark is the latest modification stamp across a record collection.
//! Cached pages are tagged with the watermark observed right after they were
//! read; a page stays valid while the collection's current watermark has
//! not moved past its tag.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vitrine_core::{CatalogFilter, Timestamp, VitrineResult};

use super::traits::CatalogRecord;
use crate::RecordSource;

/// Point in a collection's modification history.
///
/// Totally ordered with `Empty < At(_)`, and `At` ordered by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Watermark {
    /// The collection has never held a record.
    Empty,
    /// Latest modification stamp in the collection.
    At(Timestamp),
}

impl Watermark {
    /// Build a watermark from an optional latest stamp.
    pub fn from_latest(latest: Option<Timestamp>) -> Self {
        latest.map_or(Watermark::Empty, Watermark::At)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Watermark::Empty)
    }

    /// The stamp, if any.
    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Watermark::Empty => None,
            Watermark::At(ts) => Some(*ts),
        }
    }

    /// Check if this watermark is newer than another.
    pub fn is_newer_than(&self, other: &Watermark) -> bool {
        self > other
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Watermark::Empty
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watermark::Empty => f.write_str("empty"),
            Watermark::At(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

/// Source of the current watermark for a record collection.
#[async_trait]
pub trait WatermarkOracle<T: CatalogRecord>: Send + Sync {
    /// Read the collection's current watermark.
    async fn current_watermark(&self) -> VitrineResult<Watermark>;
}

/// Oracle that asks the record source for its latest modification stamp
/// across the whole collection.
pub struct RecordSourceOracle<S: ?Sized, T> {
    source: Arc<S>,
    _record: PhantomData<fn() -> T>,
}

impl<S: ?Sized, T> RecordSourceOracle<S, T> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            _record: PhantomData,
        }
    }
}

impl<S: ?Sized, T> Clone for RecordSourceOracle<S, T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<S, T> WatermarkOracle<T> for RecordSourceOracle<S, T>
where
    S: RecordSource<T> + ?Sized,
    T: CatalogRecord,
{
    async fn current_watermark(&self) -> VitrineResult<Watermark> {
        let latest = self
            .source
            .max_modified_timestamp(&CatalogFilter::unfiltered())
            .await?;
        Ok(Watermark::from_latest(latest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryCatalog, RecordWriter};
    use chrono::{Duration, Utc};
    use vitrine_core::{new_entity_id, Product};

    #[test]
    fn test_watermark_ordering() {
        let now = Utc::now();
        let w1 = Watermark::At(now);
        let w2 = Watermark::At(now + Duration::milliseconds(1));

        assert!(Watermark::Empty < w1);
        assert!(w2.is_newer_than(&w1));
        assert!(!w1.is_newer_than(&w2));
        assert!(!w1.is_newer_than(&w1));
        assert!(!Watermark::Empty.is_newer_than(&w1));
    }

    #[test]
    fn test_from_latest() {
        assert_eq!(Watermark::from_latest(None), Watermark::Empty);
        let now = Utc::now();
        assert_eq!(Watermark::from_latest(Some(now)), Watermark::At(now));
        assert_eq!(Watermark::At(now).timestamp(), Some(now));
        assert!(Watermark::default().is_empty());
    }

    #[test]
    fn test_watermark_serde_is_exact() {
        let wm = Watermark::At(Utc::now());
        let json = serde_json::to_string(&wm).expect("watermark should serialize");
        let back: Watermark = serde_json::from_str(&json).expect("watermark should deserialize");
        assert_eq!(wm, back);
    }

    #[tokio::test]
    async fn test_record_source_oracle() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let oracle: RecordSourceOracle<InMemoryCatalog, Product> =
            RecordSourceOracle::new(Arc::clone(&catalog));

        let w0 = oracle
            .current_watermark()
            .await
            .expect("current_watermark should succeed");
        assert_eq!(w0, Watermark::Empty);

        let now = Utc::now();
        let stored = catalog
            .insert(Product {
                product_id: new_entity_id(),
                title: "Desk".to_string(),
                slug: "desk".to_string(),
                description: "A desk".to_string(),
                price: 120.0,
                count_in_stock: 2,
                in_stock: true,
                rating: 4.1,
                brand: "Acme".to_string(),
                category: "Home".to_string(),
                image: None,
                created_by: new_entity_id(),
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("insert should succeed");

        let w1 = oracle
            .current_watermark()
            .await
            .expect("current_watermark should succeed");
        assert_eq!(w1, Watermark::At(stored.updated_at));
        assert!(w1.is_newer_than(&w0));
    }
}
