//! Error types for schema management

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema management errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Index not found: {index}")]
    IndexNotFound { index: String },

    #[error("Index already exists: {index}")]
    IndexAlreadyExists { index: String },

    #[error("Invalid index name '{name}': {reason}")]
    InvalidIndexName { name: String, reason: String },

    #[error("Malformed mapping: {0}")]
    MalformedMapping(String),

    #[error("Connection error during {operation}: {message}")]
    Connection { operation: String, message: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl SchemaError {
    /// Wrap a transport-level failure raised by a connection implementation
    pub fn connection(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Connection {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error means "the index or field is absent"
    pub fn is_not_found(&self) -> bool {
        matches!(self, SchemaError::IndexNotFound { .. })
    }

    /// Whether this error was raised while reading a mapping tree
    pub fn is_malformed(&self) -> bool {
        matches!(self, SchemaError::MalformedMapping(_))
    }
}
