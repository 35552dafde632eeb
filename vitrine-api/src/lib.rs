//! VITRINE API - Catalog Service Layer
//!
//! Wires the product catalog, the result store and the watermark-checked
//! query cache into a [`CatalogService`]. Also owns service configuration,
//! tracing setup and the mapping from core errors to structured
//! [`ApiError`]s that any transport in front of the service can relay.

pub mod catalog;
pub mod config;
pub mod error;
pub mod state;
pub mod telemetry;
pub mod types;

pub use catalog::{CatalogService, SIMILAR_PRODUCTS_LIMIT};
pub use config::{CacheBackendKind, ServiceConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::{ApiCache, AppState};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig, DEFAULT_LOG_FILTER};
pub use types::{
    Actor, CreateProductRequest, FilteredProductsResponse, Role, UpdateProductRequest,
};
