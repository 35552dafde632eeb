//! VITRINE Test Utilities
//!
//! Shared test infrastructure for the VITRINE workspace:
//! - Proptest generators for query parameters and products
//! - Catalog fixtures for common scenarios
//! - Failure doubles for the result store, oracle and record source
//! - Assertions for VITRINE-specific results

pub use vitrine_core::{
    CatalogFilter, EntityId, Product, QuerySpec, QuerySpecParams, SortOrder, SortSpec,
    StorageError, Timestamp, ValidationError, VitrineError, VitrineResult, SORTABLE_FIELDS,
};
pub use vitrine_storage::{
    CacheStats, CatalogRead, InMemoryCatalog, RecordSource, RecordWriter, ResultStore, ServedFrom,
    Watermark, WatermarkOracle,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use vitrine_core::CacheError;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for VITRINE types.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a valid UUIDv7 (timestamp-sortable).
    pub fn arb_uuid_v7() -> impl Strategy<Value = Uuid> {
        Just(()).prop_map(|_| Uuid::now_v7())
    }

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_category() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Electronics".to_string()),
            Just("Books".to_string()),
            Just("Home".to_string()),
            Just("Toys".to_string()),
        ]
    }

    pub fn arb_brand() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Acme".to_string()),
            Just("Globex".to_string()),
            Just("Initech".to_string()),
        ]
    }

    pub fn arb_sort_order() -> impl Strategy<Value = SortOrder> {
        prop_oneof![Just(SortOrder::Asc), Just(SortOrder::Desc)]
    }

    pub fn arb_sort_field() -> impl Strategy<Value = String> {
        proptest::sample::select(SORTABLE_FIELDS).prop_map(|field| field.to_string())
    }

    /// Price bounds with `min <= max`, on a cent grid.
    pub fn arb_price_bounds() -> impl Strategy<Value = (f64, f64)> {
        (0u32..100_000, 0u32..100_000).prop_map(|(a, b)| {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            (f64::from(lo) / 100.0, f64::from(hi) / 100.0)
        })
    }

    /// Parameters that always validate.
    pub fn arb_valid_params() -> impl Strategy<Value = QuerySpecParams> {
        (
            proptest::option::of(arb_category()),
            proptest::option::of(arb_brand()),
            proptest::option::of(any::<bool>()),
            proptest::option::of(arb_price_bounds()),
            proptest::option::of(1u64..50),
            proptest::option::of((arb_sort_field(), arb_sort_order())),
        )
            .prop_map(|(category, brand, in_stock, price, page, sort)| {
                let (min_price, max_price) = match price {
                    Some((min, max)) => (Some(min), Some(max)),
                    None => (None, None),
                };
                let (sort_field, sort_order) = match sort {
                    Some((field, order)) => (Some(field), Some(order)),
                    None => (None, None),
                };
                QuerySpecParams {
                    category,
                    brand,
                    in_stock,
                    min_price,
                    max_price,
                    page,
                    sort_field,
                    sort_order,
                }
            })
    }

    /// A validated query specification.
    pub fn arb_query_spec() -> impl Strategy<Value = QuerySpec> {
        arb_valid_params().prop_filter_map("params must validate", |p| p.into_spec().ok())
    }

    /// A product with arbitrary but valid field values.
    pub fn arb_product() -> impl Strategy<Value = Product> {
        (
            "[A-Z][a-z]{2,12}( [A-Z][a-z]{2,8})?",
            arb_category(),
            arb_brand(),
            0u32..100_000,
            0u32..500,
            0u32..=50,
            arb_timestamp(),
        )
            .prop_map(|(title, category, brand, cents, count, rating, stamp)| Product {
                product_id: Uuid::now_v7(),
                slug: vitrine_core::slugify(&title),
                description: format!("{} by {}", title, brand),
                title,
                price: f64::from(cents) / 100.0,
                count_in_stock: count,
                in_stock: count > 0,
                rating: f64::from(rating) / 10.0,
                brand,
                category,
                image: None,
                created_by: Uuid::now_v7(),
                created_at: stamp,
                updated_at: stamp,
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built catalogs and products for common test scenarios.

    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    /// A product in `category`, priced at `price`, owned by a fresh user.
    pub fn make_product(title: &str, category: &str, price: f64) -> Product {
        let now = Utc::now();
        Product {
            product_id: Uuid::now_v7(),
            title: title.to_string(),
            slug: vitrine_core::slugify(title),
            description: format!("{} description", title),
            price,
            count_in_stock: 5,
            in_stock: true,
            rating: 4.0,
            brand: "Acme".to_string(),
            category: category.to_string(),
            image: None,
            created_by: Uuid::now_v7(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Catalog of `count` electronics priced 10.0, 11.0, ... in insertion order.
    pub async fn electronics_catalog(count: usize) -> Arc<InMemoryCatalog> {
        let catalog = Arc::new(InMemoryCatalog::new());
        seed(&catalog, "Electronics", count, 10.0).await;
        catalog
    }

    /// Insert `count` products into `catalog`, priced from `base_price` upward.
    pub async fn seed(catalog: &InMemoryCatalog, category: &str, count: usize, base_price: f64) {
        for i in 0..count {
            let product = make_product(
                &format!("{} item {}", category, i),
                category,
                base_price + i as f64,
            );
            if let Err(e) = catalog.insert(product).await {
                panic!("seeding {} failed: {}", category, e);
            }
        }
    }

    /// Listing spec for electronics, page `page`, cheapest first.
    pub fn electronics_by_price(page: u64) -> QuerySpec {
        match QuerySpecParams::new()
            .with_category("Electronics")
            .with_page(page)
            .with_sort("price", SortOrder::Asc)
            .into_spec()
        {
            Ok(spec) => spec,
            Err(e) => panic!("electronics spec should be valid: {}", e),
        }
    }
}

// ============================================================================
// FAILURE DOUBLES
// ============================================================================

/// Result store whose every call fails as if the server were down.
#[derive(Debug, Default)]
pub struct UnreachableResultStore {
    calls: AtomicU64,
}

impl UnreachableResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of get/set/delete calls attempted.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn refuse<T>(&self) -> VitrineResult<T> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(CacheError::Unavailable {
            reason: "connection refused".to_string(),
        }
        .into())
    }
}

#[async_trait]
impl ResultStore for UnreachableResultStore {
    async fn get(&self, _key: &str) -> VitrineResult<Option<Vec<u8>>> {
        self.refuse()
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> VitrineResult<()> {
        self.refuse()
    }

    async fn delete(&self, _key: &str) -> VitrineResult<bool> {
        self.refuse()
    }

    async fn stats(&self) -> VitrineResult<CacheStats> {
        Ok(CacheStats::default())
    }

    async fn close(&self) -> VitrineResult<()> {
        Ok(())
    }
}

/// Result store that sleeps for `delay` before answering every get and set.
#[derive(Debug)]
pub struct SlowResultStore {
    delay: Duration,
}

impl SlowResultStore {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ResultStore for SlowResultStore {
    async fn get(&self, _key: &str) -> VitrineResult<Option<Vec<u8>>> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> VitrineResult<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn delete(&self, _key: &str) -> VitrineResult<bool> {
        Ok(false)
    }

    async fn stats(&self) -> VitrineResult<CacheStats> {
        Ok(CacheStats::default())
    }

    async fn close(&self) -> VitrineResult<()> {
        Ok(())
    }
}

/// Watermark oracle that always fails.
#[derive(Debug, Default)]
pub struct FailingOracle;

#[async_trait]
impl WatermarkOracle<Product> for FailingOracle {
    async fn current_watermark(&self) -> VitrineResult<Watermark> {
        Err(StorageError::QueryFailed {
            collection: "products",
            reason: "watermark query failed".to_string(),
        }
        .into())
    }
}

/// Record source whose every call fails.
#[derive(Debug, Default)]
pub struct FailingRecordSource;

impl FailingRecordSource {
    fn fail<T>() -> VitrineResult<T> {
        Err(StorageError::QueryFailed {
            collection: "products",
            reason: "primary store unreachable".to_string(),
        }
        .into())
    }
}

#[async_trait]
impl RecordSource<Product> for FailingRecordSource {
    async fn query(
        &self,
        _filter: &CatalogFilter,
        _sort: &SortSpec,
        _skip: u64,
        _limit: u64,
    ) -> VitrineResult<Vec<Product>> {
        Self::fail()
    }

    async fn count(&self, _filter: &CatalogFilter) -> VitrineResult<u64> {
        Self::fail()
    }

    async fn max_modified_timestamp(
        &self,
        _filter: &CatalogFilter,
    ) -> VitrineResult<Option<Timestamp>> {
        Self::fail()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for VITRINE-specific validation.

    use super::*;

    /// Assert that a read came from the result cache.
    #[track_caller]
    pub fn assert_from_cache<T>(read: &CatalogRead<T>) {
        assert_eq!(
            read.served_from(),
            ServedFrom::Cache,
            "Expected a cached read"
        );
    }

    /// Assert that a read came from the record store.
    #[track_caller]
    pub fn assert_from_store<T>(read: &CatalogRead<T>) {
        assert_eq!(
            read.served_from(),
            ServedFrom::Store,
            "Expected a record store read"
        );
    }

    /// Assert that records are ordered by price, cheapest first.
    #[track_caller]
    pub fn assert_price_ascending(products: &[Product]) {
        for pair in products.windows(2) {
            assert!(
                pair[0].price <= pair[1].price,
                "Prices out of order: {} before {}",
                pair[0].price,
                pair[1].price
            );
        }
    }

    /// Assert that a VitrineResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &VitrineResult<T>) {
        match result {
            Err(VitrineError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a VitrineResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &VitrineResult<T>) {
        match result {
            Err(VitrineError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
