//! Error types for document table operations
//!
//! The cache itself has no fallible operations. Errors come from addressing
//! documents that do not exist, from configuration, and from a cached ID that
//! no longer resolves (which means a mutation path skipped reconciliation).

use crate::document::DocId;
use thiserror::Error;

/// Main error type for the document table
#[derive(Error, Debug)]
pub enum DocStoreError {
    /// A mutation addressed a document id that is not stored
    #[error("Document not found: {id}")]
    DocumentNotFound { id: DocId },

    /// A cached id could not be resolved against the store
    #[error("Stale cache entry for query {key}: document {id} no longer exists")]
    StaleCacheEntry { key: String, id: DocId },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for document table operations
pub type Result<T> = std::result::Result<T, DocStoreError>;

impl From<String> for DocStoreError {
    fn from(s: String) -> Self {
        DocStoreError::Other(s)
    }
}

impl From<&str> for DocStoreError {
    fn from(s: &str) -> Self {
        DocStoreError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for DocStoreError {
    fn from(e: serde_json::Error) -> Self {
        DocStoreError::SerializationError(e.to_string())
    }
}
