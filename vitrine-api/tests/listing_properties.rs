//! Property tests for cached catalog listings.

use std::sync::Arc;

use proptest::prelude::*;
use vitrine_api::{AppState, CatalogService, ServiceConfig};
use vitrine_core::{total_pages, QuerySpecParams};
use vitrine_storage::{InMemoryCatalog, QueryFingerprint, RecordWriter};
use vitrine_test_utils::generators::{arb_product, arb_query_spec, arb_valid_params};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build")
}

async fn service_over(products: Vec<vitrine_core::Product>) -> CatalogService {
    let catalog = Arc::new(InMemoryCatalog::new());
    for product in products {
        catalog.insert(product).await.expect("insert should succeed");
    }
    CatalogService::new(
        AppState::with_catalog(&ServiceConfig::default(), catalog).expect("state should build"),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Two reads with no write in between return the same page, the second
    /// from cache.
    #[test]
    fn prop_repeat_read_is_cached_and_identical(
        products in prop::collection::vec(arb_product(), 0..30),
        params in arb_valid_params(),
    ) {
        let rt = runtime();
        let (first, second) = rt.block_on(async {
            let svc = service_over(products).await;
            let first = svc.filtered_products(params.clone()).await.expect("first read");
            let second = svc.filtered_products(params).await.expect("second read");
            (first, second)
        });

        prop_assert_eq!(&first.message, "Data retrieved from database");
        prop_assert_eq!(&second.message, "Data fetched from cache");
        prop_assert_eq!(&first.products, &second.products);
        prop_assert_eq!(first.total_items, second.total_items);
    }

    /// A page never holds more than the page size, and the page count covers
    /// the total.
    #[test]
    fn prop_page_shape(
        products in prop::collection::vec(arb_product(), 0..40),
        params in arb_valid_params(),
    ) {
        let rt = runtime();
        let page = rt.block_on(async {
            let svc = service_over(products).await;
            svc.filtered_products(params).await.expect("read")
        });

        prop_assert!(page.products.len() as u64 <= 10);
        prop_assert_eq!(page.total_pages, total_pages(page.total_items, 10));
        prop_assert!(page.products.len() as u64 <= page.total_items);
    }

    /// Every returned product satisfies the filter it was listed under.
    #[test]
    fn prop_products_match_filter(
        products in prop::collection::vec(arb_product(), 0..40),
        spec in arb_query_spec(),
    ) {
        let filter = spec.filter();
        let params = QuerySpecParams {
            category: spec.category().map(str::to_string),
            brand: spec.brand().map(str::to_string),
            in_stock: spec.in_stock(),
            min_price: spec.price().map(|p| p.min()),
            max_price: spec.price().map(|p| p.max()),
            page: Some(spec.page()),
            sort_field: Some(spec.sort_field().to_string()),
            sort_order: Some(spec.sort_order()),
        };
        let rt = runtime();
        let page = rt.block_on(async {
            let svc = service_over(products).await;
            svc.filtered_products(params).await.expect("read")
        });

        for product in &page.products {
            prop_assert!(filter.matches(product));
        }
    }

    /// Parameters that describe the same query share a fingerprint.
    #[test]
    fn prop_round_tripped_params_share_fingerprint(spec in arb_query_spec()) {
        let params = QuerySpecParams {
            category: spec.category().map(str::to_string),
            brand: spec.brand().map(str::to_string),
            in_stock: spec.in_stock(),
            min_price: spec.price().map(|p| p.min()),
            max_price: spec.price().map(|p| p.max()),
            page: Some(spec.page()),
            sort_field: Some(spec.sort_field().to_string()),
            sort_order: Some(spec.sort_order()),
        };
        let rebuilt = params.into_spec().expect("rebuilt params validate");
        prop_assert_eq!(QueryFingerprint::of(&rebuilt), QueryFingerprint::of(&spec));
    }
}
