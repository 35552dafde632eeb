//! Catalog query specifications.
//!
//! A [`QuerySpec`] is the validated, immutable description of one filtered,
//! sorted and paginated catalog read. It is only constructed through
//! [`QuerySpecParams::into_spec`], so every `QuerySpec` in the system already
//! satisfies the pairing and range rules below:
//!
//! - `minPrice` and `maxPrice` are both present or both absent
//! - price bounds are finite and `min <= max`
//! - `page >= 1`
//! - the sort field is one of [`SORTABLE_FIELDS`]

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::Product;
use crate::error::ValidationError;

/// Fields a catalog read may sort by (wire names).
pub const SORTABLE_FIELDS: &[&str] = &[
    "title",
    "slug",
    "price",
    "rating",
    "countInStock",
    "brand",
    "category",
    "createdAt",
    "updatedAt",
];

/// Sort field used when the caller does not name one.
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Sort order used when the caller does not name one.
pub const DEFAULT_SORT_ORDER: SortOrder = SortOrder::Desc;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ValidationError::InvalidValue {
                field: "sortOrder".to_string(),
                reason: format!("expected 'asc' or 'desc', got '{}'", other),
            }),
        }
    }
}

/// Closed price interval `[min, max]`.
///
/// Bounds are finite, ordered, and `-0.0` is normalized to `0.0`, so bitwise
/// equality and numeric equality agree.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PriceRange {
    min: f64,
    max: f64,
}

impl PriceRange {
    /// Build a validated price range.
    pub fn new(min: f64, max: f64) -> Result<Self, ValidationError> {
        for (field, value) in [("minPrice", min), ("maxPrice", max)] {
            if !value.is_finite() {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("must be a finite number, got {}", value),
                });
            }
        }
        if min > max {
            return Err(ValidationError::InvalidRange {
                field: "price".to_string(),
                reason: format!("minPrice {} exceeds maxPrice {}", min, max),
            });
        }
        Ok(Self {
            min: normalize_zero(min),
            max: normalize_zero(max),
        })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Whether `price` lies within the closed interval.
    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

fn normalize_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

impl PartialEq for PriceRange {
    fn eq(&self, other: &Self) -> bool {
        self.min.to_bits() == other.min.to_bits() && self.max.to_bits() == other.max.to_bits()
    }
}

impl Eq for PriceRange {}

impl Hash for PriceRange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.min.to_bits().hash(state);
        self.max.to_bits().hash(state);
    }
}

/// Raw, unvalidated query parameters as a caller supplies them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpecParams {
    pub category: Option<String>,
    pub brand: Option<String>,
    #[serde(rename = "instock", alias = "inStock")]
    pub in_stock: Option<bool>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub page: Option<u64>,
    pub sort_field: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl QuerySpecParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = Some(in_stock);
        self
    }

    pub fn with_price_range(mut self, min: f64, max: f64) -> Self {
        self.min_price = Some(min);
        self.max_price = Some(max);
        self
    }

    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_field = Some(field.into());
        self.sort_order = Some(order);
        self
    }

    /// Validate the parameters into an immutable [`QuerySpec`].
    ///
    /// Empty or whitespace-only category/brand values mean "no filter".
    pub fn into_spec(self) -> Result<QuerySpec, ValidationError> {
        let price = match (self.min_price, self.max_price) {
            (Some(min), Some(max)) => Some(PriceRange::new(min, max)?),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ValidationError::IncompletePriceRange {
                    present: "minPrice".to_string(),
                    missing: "maxPrice".to_string(),
                })
            }
            (None, Some(_)) => {
                return Err(ValidationError::IncompletePriceRange {
                    present: "maxPrice".to_string(),
                    missing: "minPrice".to_string(),
                })
            }
        };

        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(ValidationError::InvalidValue {
                field: "page".to_string(),
                reason: "page numbers start at 1".to_string(),
            });
        }

        let sort_field = match self.sort_field {
            Some(field) if !field.trim().is_empty() => field.trim().to_string(),
            _ => DEFAULT_SORT_FIELD.to_string(),
        };
        if !SORTABLE_FIELDS.contains(&sort_field.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "sortField".to_string(),
                reason: format!(
                    "'{}' is not sortable, expected one of {}",
                    sort_field,
                    SORTABLE_FIELDS.join(", ")
                ),
            });
        }

        Ok(QuerySpec {
            category: non_blank(self.category),
            brand: non_blank(self.brand),
            in_stock: self.in_stock,
            price,
            page,
            sort_field,
            sort_order: self.sort_order.unwrap_or(DEFAULT_SORT_ORDER),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validated description of a filtered, sorted, paginated catalog read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QuerySpec {
    category: Option<String>,
    brand: Option<String>,
    in_stock: Option<bool>,
    price: Option<PriceRange>,
    page: u64,
    sort_field: String,
    sort_order: SortOrder,
}

impl QuerySpec {
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    pub fn in_stock(&self) -> Option<bool> {
        self.in_stock
    }

    pub fn price(&self) -> Option<PriceRange> {
        self.price
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn sort_field(&self) -> &str {
        &self.sort_field
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// The same query on another page.
    pub fn at_page(&self, page: u64) -> Result<QuerySpec, ValidationError> {
        if page == 0 {
            return Err(ValidationError::InvalidValue {
                field: "page".to_string(),
                reason: "page numbers start at 1".to_string(),
            });
        }
        Ok(QuerySpec {
            page,
            ..self.clone()
        })
    }

    /// Filter part of the query (pagination and sort excluded).
    pub fn filter(&self) -> CatalogFilter {
        CatalogFilter {
            category: self.category.clone(),
            brand: self.brand.clone(),
            in_stock: self.in_stock,
            price: self.price,
        }
    }

    /// Sort part of the query.
    pub fn sort(&self) -> SortSpec {
        SortSpec {
            field: self.sort_field.clone(),
            order: self.sort_order,
        }
    }
}

/// Equality and range filters applied by a record source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub brand: Option<String>,
    pub in_stock: Option<bool>,
    pub price: Option<PriceRange>,
}

impl CatalogFilter {
    /// Filter matching every record in the collection.
    pub fn unfiltered() -> Self {
        Self::default()
    }

    pub fn is_unfiltered(&self) -> bool {
        self.category.is_none()
            && self.brand.is_none()
            && self.in_stock.is_none()
            && self.price.is_none()
    }

    /// Whether a product satisfies every present filter.
    pub fn matches(&self, product: &Product) -> bool {
        self.category
            .as_deref()
            .map_or(true, |c| product.category == c)
            && self.brand.as_deref().map_or(true, |b| product.brand == b)
            && self.in_stock.map_or(true, |s| product.in_stock == s)
            && self.price.map_or(true, |range| range.contains(product.price))
    }
}

/// Single-field sort.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    /// Order two products by this sort; ties break on product id ascending
    /// so that pages are stable across calls.
    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let by_field = match (a.sort_value(&self.field), b.sort_value(&self.field)) {
            (Some(x), Some(y)) => x.compare(&y),
            _ => Ordering::Equal,
        };
        let by_field = match self.order {
            SortOrder::Asc => by_field,
            SortOrder::Desc => by_field.reverse(),
        };
        by_field.then_with(|| a.product_id.cmp(&b.product_id))
    }
}
