//! Catalog service request and response types

use serde::{Deserialize, Serialize};
use vitrine_core::{EntityId, ImageRef, Product};

use crate::error::{ApiError, ApiResult};

// ============================================================================
// CALLER IDENTITY
// ============================================================================

/// Role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// The authenticated caller of a write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub user_id: EntityId,
    pub role: Role,
}

impl Actor {
    pub fn user(user_id: EntityId) -> Self {
        Self {
            user_id,
            role: Role::User,
        }
    }

    pub fn admin(user_id: EntityId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    /// Whether this caller may modify `product`.
    pub fn may_modify(&self, product: &Product) -> bool {
        self.role == Role::Admin || product.created_by == self.user_id
    }
}

// ============================================================================
// PRODUCT REQUESTS
// ============================================================================

/// Request to create a new product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    /// Display title; the slug is derived from it
    pub title: String,
    pub description: String,
    pub price: f64,
    pub count_in_stock: u32,
    /// Availability flag. Defaults to `count_in_stock > 0`.
    #[serde(default, rename = "instock", alias = "inStock")]
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub rating: f64,
    pub brand: String,
    pub category: String,
    /// Image already uploaded to the asset store
    #[serde(default)]
    pub image: Option<ImageRef>,
}

impl CreateProductRequest {
    /// Check field-level constraints.
    pub fn validate(&self) -> ApiResult<()> {
        require_text("title", &self.title)?;
        require_text("description", &self.description)?;
        require_text("brand", &self.brand)?;
        require_text("category", &self.category)?;
        require_amount("price", self.price)?;
        require_rating(self.rating)?;
        Ok(())
    }
}

/// Request to update an existing product. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub count_in_stock: Option<u32>,
    #[serde(default, rename = "instock", alias = "inStock")]
    pub in_stock: Option<bool>,
    pub rating: Option<f64>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub image: Option<ImageRef>,
}

impl UpdateProductRequest {
    /// Check field-level constraints on the fields that are present.
    pub fn validate(&self) -> ApiResult<()> {
        if self.is_empty() {
            return Err(ApiError::validation_failed("Update contains no fields"));
        }
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(description) = &self.description {
            require_text("description", description)?;
        }
        if let Some(brand) = &self.brand {
            require_text("brand", brand)?;
        }
        if let Some(category) = &self.category {
            require_text("category", category)?;
        }
        if let Some(price) = self.price {
            require_amount("price", price)?;
        }
        if let Some(rating) = self.rating {
            require_rating(rating)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn require_text(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::missing_field(field));
    }
    Ok(())
}

fn require_amount(field: &str, value: f64) -> ApiResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::invalid_input(format!(
            "{} must be a finite, non-negative number",
            field
        ))
        .with_details(serde_json::json!({ "field": field })));
    }
    Ok(())
}

fn require_rating(value: f64) -> ApiResult<()> {
    if !value.is_finite() || !(0.0..=5.0).contains(&value) {
        return Err(ApiError::new(
            crate::error::ErrorCode::InvalidRange,
            "rating must be between 0 and 5",
        )
        .with_details(serde_json::json!({ "field": "rating" })));
    }
    Ok(())
}

// ============================================================================
// RESPONSES
// ============================================================================

/// One page of the filtered product listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct FilteredProductsResponse {
    /// Where the page came from, for observability only
    pub message: String,
    pub products: Vec<Product>,
    /// Matches across all pages
    pub total_items: u64,
    pub total_pages: u64,
    pub page: u64,
    /// Milliseconds since the Unix epoch when the page was read
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use chrono::Utc;
    use uuid::Uuid;

    fn create_request() -> CreateProductRequest {
        CreateProductRequest {
            title: "Smartphone".to_string(),
            description: "A high-quality smartphone".to_string(),
            price: 599.99,
            count_in_stock: 100,
            in_stock: None,
            rating: 4.5,
            brand: "Apple".to_string(),
            category: "Electronics".to_string(),
            image: None,
        }
    }

    #[test]
    fn test_create_request_valid() {
        assert!(create_request().validate().is_ok());
    }

    #[test]
    fn test_create_request_blank_title() {
        let req = CreateProductRequest {
            title: "   ".to_string(),
            ..create_request()
        };
        let err = req.validate().expect_err("blank title must fail");
        assert_eq!(err.code, ErrorCode::MissingField);
    }

    #[test]
    fn test_create_request_bad_price() {
        for price in [-1.0, f64::NAN, f64::INFINITY] {
            let req = CreateProductRequest {
                price,
                ..create_request()
            };
            let err = req.validate().expect_err("bad price must fail");
            assert_eq!(err.code, ErrorCode::InvalidInput);
        }
    }

    #[test]
    fn test_create_request_bad_rating() {
        let req = CreateProductRequest {
            rating: 6.0,
            ..create_request()
        };
        let err = req.validate().expect_err("rating above 5 must fail");
        assert_eq!(err.code, ErrorCode::InvalidRange);
    }

    #[test]
    fn test_create_request_wire_names() -> Result<(), serde_json::Error> {
        let req: CreateProductRequest = serde_json::from_value(serde_json::json!({
            "title": "Smartphone",
            "description": "Phone",
            "price": 10.0,
            "countInStock": 3,
            "instock": false,
            "brand": "Apple",
            "category": "Electronics"
        }))?;
        assert_eq!(req.in_stock, Some(false));
        assert_eq!(req.count_in_stock, 3);
        assert_eq!(req.rating, 0.0);
        Ok(())
    }

    #[test]
    fn test_update_request_empty() {
        let err = UpdateProductRequest::default()
            .validate()
            .expect_err("empty update must fail");
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn test_update_request_partial() {
        let req = UpdateProductRequest {
            price: Some(12.5),
            ..Default::default()
        };
        assert!(req.validate().is_ok());

        let req = UpdateProductRequest {
            brand: Some(String::new()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_actor_may_modify() {
        let owner = Uuid::now_v7();
        let now = Utc::now();
        let product = Product {
            product_id: Uuid::now_v7(),
            title: "Phone".to_string(),
            slug: "phone".to_string(),
            description: "Phone".to_string(),
            price: 1.0,
            count_in_stock: 1,
            in_stock: true,
            rating: 0.0,
            brand: "Acme".to_string(),
            category: "Electronics".to_string(),
            image: None,
            created_by: owner,
            created_at: now,
            updated_at: now,
        };

        assert!(Actor::user(owner).may_modify(&product));
        assert!(!Actor::user(Uuid::now_v7()).may_modify(&product));
        assert!(Actor::admin(Uuid::now_v7()).may_modify(&product));
    }

    #[test]
    fn test_response_wire_names() -> Result<(), serde_json::Error> {
        let response = FilteredProductsResponse {
            message: "Data fetched from cache".to_string(),
            products: Vec::new(),
            total_items: 0,
            total_pages: 0,
            page: 1,
            timestamp: 0,
        };
        let json = serde_json::to_value(&response)?;
        assert!(json.get("totalItems").is_some());
        assert!(json.get("totalPages").is_some());
        Ok(())
    }
}
