//! Store error types

use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid value: {0}")]
    Invalid(String),

    #[error("Schema validation failed: {}", .0.join("; "))]
    SchemaInvalid(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
