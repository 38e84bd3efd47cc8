//! Storage error types

use thiserror::Error;

/// Errors from a [`super::KeyStore`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Stored bytes could not be decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A record could not be encoded for storage
    #[error("encoding error: {0}")]
    Encoding(String),

    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),
}

impl StorageError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
