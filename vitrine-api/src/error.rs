//! Error Types for the VITRINE service layer
//!
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors, each with an HTTP status
//! - Conversion from the core `VitrineError` taxonomy
//!
//! Errors serialize as JSON so any transport in front of the service can
//! relay them unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use vitrine_core::{CacheError, ConfigError, StorageError, ValidationError, VitrineError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for service responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authorization Errors (403)
    // ========================================================================
    /// Caller is known but may not act on the resource
    Forbidden,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Field value is out of valid range
    InvalidRange,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested entity does not exist
    EntityNotFound,

    /// Requested product does not exist
    ProductNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Entity with the same identifier already exists
    EntityAlreadyExists,

    // ========================================================================
    // Server Errors (500, 503, 504)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Record store operation failed
    DatabaseError,

    /// A dependency is temporarily unavailable
    ServiceUnavailable,

    /// Operation timed out
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::Forbidden => 403,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidRange => 400,

            ErrorCode::EntityNotFound | ErrorCode::ProductNotFound => 404,

            ErrorCode::EntityAlreadyExists => 409,

            ErrorCode::ServiceUnavailable => 503,

            ErrorCode::Timeout => 504,

            ErrorCode::InternalError | ErrorCode::DatabaseError => 500,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Forbidden => "Access forbidden",

            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidRange => "Value is out of valid range",

            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::ProductNotFound => "Product not found",

            ErrorCode::EntityAlreadyExists => "Entity already exists",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::Timeout => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error returned by every service operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (offending field, record id)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create a Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Create a ValidationFailed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingField error.
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    /// Create an EntityNotFound error.
    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} with id {} not found", entity_type, id),
        )
    }

    /// Create a ProductNotFound error.
    pub fn product_not_found(product_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ProductNotFound,
            format!("Product {} not found", product_id),
        )
    }

    /// Create an EntityAlreadyExists error.
    pub fn entity_already_exists(entity_type: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityAlreadyExists,
            format!("{} {}", entity_type, reason),
        )
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a DatabaseError.
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Create a ServiceUnavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Create a Timeout error.
    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// CONVERSIONS FROM CORE ERRORS
// ============================================================================

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { collection, id } => {
                ApiError::entity_not_found(collection, id).with_details(serde_json::json!({
                    "collection": collection,
                    "id": id,
                }))
            }
            StorageError::InsertFailed { collection, reason } if reason == "already exists" => {
                ApiError::entity_already_exists(collection, reason)
            }
            other => {
                // Full reason goes to the log, not the caller.
                tracing::error!(error = %other, "Record store error");
                ApiError::database_error(ErrorCode::DatabaseError.default_message())
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let message = err.to_string();
        match err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(&field),
            ValidationError::InvalidValue { field, .. } => ApiError::invalid_input(message)
                .with_details(serde_json::json!({ "field": field })),
            ValidationError::IncompletePriceRange { present, missing } => {
                ApiError::validation_failed(message).with_details(serde_json::json!({
                    "present": present,
                    "missing": missing,
                }))
            }
            ValidationError::InvalidRange { field, .. } => {
                ApiError::new(ErrorCode::InvalidRange, message)
                    .with_details(serde_json::json!({ "field": field }))
            }
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        tracing::error!(error = %err, "Result store error");
        match err {
            CacheError::Unavailable { .. } => {
                ApiError::service_unavailable("Result store unavailable")
            }
            CacheError::Timeout { operation, .. } => ApiError::timeout(&operation),
            CacheError::Serialization { .. } | CacheError::Deserialization { .. } => {
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(err.to_string())
    }
}

impl From<VitrineError> for ApiError {
    fn from(err: VitrineError) -> Self {
        match err {
            VitrineError::Storage(e) => e.into(),
            VitrineError::Validation(e) => e.into(),
            VitrineError::Cache(e) => e.into(),
            VitrineError::Config(e) => e.into(),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for service operations.
pub type ApiResult<T> = Result<T, ApiError>;
