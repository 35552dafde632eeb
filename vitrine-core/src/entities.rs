//! Catalog entity types

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{EntityId, Timestamp};

/// Reference to an image held by the external asset store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub url: String,
    pub public_id: String,
}

/// A catalog product.
///
/// `updated_at` is the record's modification stamp. Every write path must
/// move it forward, since the query cache derives its freshness watermark
/// from the maximum `updated_at` across the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub product_id: EntityId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub price: f64,
    pub count_in_stock: u32,
    pub in_stock: bool,
    pub rating: f64,
    pub brand: String,
    pub category: String,
    pub image: Option<ImageRef>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub created_by: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// A borrowed value a record can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortValue<'a> {
    Number(f64),
    Text(&'a str),
    Time(Timestamp),
}

impl SortValue<'_> {
    /// Total order over sort values. Values of different kinds order by kind.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Number(_) => 0,
            SortValue::Text(_) => 1,
            SortValue::Time(_) => 2,
        }
    }
}

impl Product {
    /// Value of the named sort field, using the wire (camelCase) field names.
    ///
    /// Returns `None` for fields that are not sortable.
    pub fn sort_value(&self, field: &str) -> Option<SortValue<'_>> {
        let value = match field {
            "title" => SortValue::Text(&self.title),
            "slug" => SortValue::Text(&self.slug),
            "brand" => SortValue::Text(&self.brand),
            "category" => SortValue::Text(&self.category),
            "price" => SortValue::Number(self.price),
            "rating" => SortValue::Number(self.rating),
            "countInStock" => SortValue::Number(f64::from(self.count_in_stock)),
            "createdAt" => SortValue::Time(self.created_at),
            "updatedAt" => SortValue::Time(self.updated_at),
            _ => return None,
        };
        Some(value)
    }
}

static SLUG_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid slug separator regex"));

/// Lowercase, dash-separated URL slug for a title.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    SLUG_SEPARATORS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}
