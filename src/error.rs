//! Error types for the namespace.

use thiserror::Error;

/// Main error type for namespace operations.
#[derive(Debug, Error)]
pub enum NamespaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Directory already exists: {0}")]
    DuplicateDirectory(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,
}

impl From<serde_json::Error> for NamespaceError {
    fn from(e: serde_json::Error) -> Self {
        NamespaceError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for NamespaceError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        NamespaceError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for NamespaceError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        NamespaceError::Deserialization(e.to_string())
    }
}

/// Result type for namespace operations.
pub type Result<T> = std::result::Result<T, NamespaceError>;
