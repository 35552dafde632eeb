//! Catalog service: the cached product listing plus product writes.
//!
//! Listing reads go through the watermark-checked query cache. Writes go
//! straight to the catalog; they move its modification watermark, which is
//! all the cache needs to notice them.

use chrono::Utc;
use tracing::{debug, info, warn};
use vitrine_core::{
    new_entity_id, slugify, CatalogFilter, EntityId, Product, QuerySpecParams, SortOrder,
    SortSpec,
};
use vitrine_storage::{RecordSource, RecordWriter};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{Actor, CreateProductRequest, FilteredProductsResponse, UpdateProductRequest};

/// How many related products `similar_products` returns.
pub const SIMILAR_PRODUCTS_LIMIT: u64 = 3;

/// Product operations over shared service state.
#[derive(Clone)]
pub struct CatalogService {
    state: AppState,
}

impl CatalogService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// One page of products matching `params`.
    pub async fn filtered_products(
        &self,
        params: QuerySpecParams,
    ) -> ApiResult<FilteredProductsResponse> {
        let read = self.state.cache.fetch_params(params).await?;
        let message = read.served_from().message().to_string();
        let total_items = read.total_count();
        let total_pages = read.total_pages();
        let page = read.page();
        let timestamp = read.cached_at().timestamp_millis();

        Ok(FilteredProductsResponse {
            message,
            products: read.into_records(),
            total_items,
            total_pages,
            page,
            timestamp,
        })
    }

    /// Product with `id`, provided its slug is `slug`.
    pub async fn product_by_id_and_slug(&self, id: EntityId, slug: &str) -> ApiResult<Product> {
        match self.state.catalog.get(id).await? {
            Some(product) if product.slug == slug => Ok(product),
            _ => Err(ApiError::product_not_found(id)),
        }
    }

    /// Product with `id`.
    pub async fn product_by_id(&self, id: EntityId) -> ApiResult<Product> {
        self.state
            .catalog
            .get(id)
            .await?
            .ok_or_else(|| ApiError::product_not_found(id))
    }

    /// Up to three other products in the same category, newest first.
    pub async fn similar_products(&self, id: EntityId) -> ApiResult<Vec<Product>> {
        let product = self.product_by_id(id).await?;
        let filter = CatalogFilter {
            category: Some(product.category.clone()),
            ..CatalogFilter::unfiltered()
        };
        let sort = SortSpec::new("createdAt", SortOrder::Desc);

        // One extra so the product itself can be dropped.
        let candidates = self
            .state
            .catalog
            .query(&filter, &sort, 0, SIMILAR_PRODUCTS_LIMIT + 1)
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|p| p.product_id != id)
            .take(SIMILAR_PRODUCTS_LIMIT as usize)
            .collect())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create a product owned by `actor`.
    pub async fn create_product(
        &self,
        actor: &Actor,
        req: CreateProductRequest,
    ) -> ApiResult<Product> {
        req.validate()?;

        let now = Utc::now();
        let in_stock = req.in_stock.unwrap_or(req.count_in_stock > 0);
        let product = Product {
            product_id: new_entity_id(),
            slug: slugify(&req.title),
            title: req.title,
            description: req.description,
            price: req.price,
            count_in_stock: req.count_in_stock,
            in_stock,
            rating: req.rating,
            brand: req.brand,
            category: req.category,
            image: req.image,
            created_by: actor.user_id,
            created_at: now,
            updated_at: now,
        };

        let stored = self.state.catalog.insert(product).await?;
        info!(
            product_id = %stored.product_id,
            created_by = %stored.created_by,
            category = %stored.category,
            "Product created"
        );
        Ok(stored)
    }

    /// Apply `req` to product `id`. Only the owner or an admin may update.
    pub async fn update_product(
        &self,
        actor: &Actor,
        id: EntityId,
        req: UpdateProductRequest,
    ) -> ApiResult<Product> {
        req.validate()?;

        let mut product = self.product_by_id(id).await?;
        self.authorize(actor, &product)?;

        if let Some(title) = req.title {
            product.slug = slugify(&title);
            product.title = title;
        }
        if let Some(description) = req.description {
            product.description = description;
        }
        if let Some(price) = req.price {
            product.price = price;
        }
        if let Some(count) = req.count_in_stock {
            product.count_in_stock = count;
        }
        if let Some(in_stock) = req.in_stock {
            product.in_stock = in_stock;
        }
        if let Some(rating) = req.rating {
            product.rating = rating;
        }
        if let Some(brand) = req.brand {
            product.brand = brand;
        }
        if let Some(category) = req.category {
            product.category = category;
        }
        if let Some(image) = req.image {
            product.image = Some(image);
        }

        let stored = self.state.catalog.replace(product).await?;
        info!(product_id = %stored.product_id, actor = %actor.user_id, "Product updated");
        Ok(stored)
    }

    /// Remove product `id`. Only the owner or an admin may delete.
    pub async fn delete_product(&self, actor: &Actor, id: EntityId) -> ApiResult<Product> {
        let product = self.product_by_id(id).await?;
        self.authorize(actor, &product)?;

        let removed = self.state.catalog.remove(id).await?;
        if let Some(image) = &removed.image {
            // Asset store cleanup belongs to the asset service.
            debug!(public_id = %image.public_id, "Removed product had an image");
        }
        info!(product_id = %id, actor = %actor.user_id, "Product deleted");
        Ok(removed)
    }

    fn authorize(&self, actor: &Actor, product: &Product) -> ApiResult<()> {
        if actor.may_modify(product) {
            return Ok(());
        }
        warn!(
            product_id = %product.product_id,
            actor = %actor.user_id,
            "Write rejected for non-owner"
        );
        Err(ApiError::forbidden(
            "Only the product owner or an admin may modify this product",
        ))
    }
}
