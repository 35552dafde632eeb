//! Error types for VITRINE operations

use thiserror::Error;
use uuid::Uuid;

/// Record store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found in {collection} with id {id}")]
    NotFound { collection: &'static str, id: Uuid },

    #[error("Insert failed for {collection}: {reason}")]
    InsertFailed {
        collection: &'static str,
        reason: String,
    },

    #[error("Update failed for {collection} with id {id}: {reason}")]
    UpdateFailed {
        collection: &'static str,
        id: Uuid,
        reason: String,
    },

    #[error("Query failed on {collection}: {reason}")]
    QueryFailed {
        collection: &'static str,
        reason: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Incomplete price range: {present} given without {missing}")]
    IncompletePriceRange { present: String, missing: String },

    #[error("Invalid range for {field}: {reason}")]
    InvalidRange { field: String, reason: String },
}

/// Result cache errors.
///
/// These never escape a catalog read: the query cache downgrades them to a
/// miss. They are still typed so backends and operators can report them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Result store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Result store {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Failed to serialize cache entry: {reason}")]
    Serialization { reason: String },

    #[error("Failed to deserialize cache entry: {reason}")]
    Deserialization { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all VITRINE errors.
#[derive(Debug, Clone, Error)]
pub enum VitrineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for VITRINE operations.
pub type VitrineResult<T> = Result<T, VitrineError>;

// =============================================================================
// TESTS
// =============================================================================
