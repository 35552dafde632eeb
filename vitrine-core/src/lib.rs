//! VITRINE Core - Catalog Types
//!
//! Product entities, validated query specifications, pagination arithmetic
//! and the error taxonomy shared by every other VITRINE crate.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod entities;
pub mod error;
pub mod pagination;
pub mod query;

pub use entities::{slugify, ImageRef, Product, SortValue};
pub use error::{
    CacheError, ConfigError, StorageError, ValidationError, VitrineError, VitrineResult,
};
pub use pagination::{skip_for_page, total_pages, DEFAULT_PAGE_SIZE};
pub use query::{
    CatalogFilter, PriceRange, QuerySpec, QuerySpecParams, SortOrder, SortSpec,
    DEFAULT_SORT_FIELD, DEFAULT_SORT_ORDER, SORTABLE_FIELDS,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_params() -> impl Strategy<Value = QuerySpecParams> {
        (
            proptest::option::of("[A-Za-z ]{0,12}"),
            proptest::option::of("[A-Za-z]{0,8}"),
            proptest::option::of(any::<bool>()),
            proptest::option::of((-1000.0f64..1000.0, -1000.0f64..1000.0)),
            proptest::option::of(0u64..20),
            proptest::option::of(proptest::sample::select(SORTABLE_FIELDS.to_vec())),
            proptest::option::of(prop_oneof![Just(SortOrder::Asc), Just(SortOrder::Desc)]),
        )
            .prop_map(|(category, brand, in_stock, price, page, field, order)| {
                QuerySpecParams {
                    category,
                    brand,
                    in_stock,
                    min_price: price.map(|(a, _)| a),
                    max_price: price.map(|(_, b)| b),
                    page,
                    sort_field: field.map(str::to_string),
                    sort_order: order,
                }
            })
    }

    proptest! {
        /// Validation accepts exactly the parameter sets that satisfy the
        /// pairing, ordering and page rules.
        #[test]
        fn prop_validation_matches_rules(params in arb_params()) {
            let price_ok = match (params.min_price, params.max_price) {
                (Some(min), Some(max)) => min <= max,
                (None, None) => true,
                _ => false,
            };
            let page_ok = params.page != Some(0);
            let result = params.clone().into_spec();
            prop_assert_eq!(result.is_ok(), price_ok && page_ok);
        }

        /// Validation is deterministic: the same params yield equal specs.
        #[test]
        fn prop_validation_is_deterministic(params in arb_params()) {
            let a = params.clone().into_spec();
            let b = params.into_spec();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_skip_is_page_offset(page in 1u64..10_000, size in 1u64..500) {
            prop_assert_eq!(skip_for_page(page, size), (page - 1) * size);
        }

        #[test]
        fn prop_total_pages_covers_total(total in 0u64..100_000, size in 1u64..500) {
            let pages = total_pages(total, size);
            prop_assert!(pages * size >= total);
            if total > 0 {
                prop_assert!((pages - 1) * size < total);
            } else {
                prop_assert_eq!(pages, 0);
            }
        }
    }
}
