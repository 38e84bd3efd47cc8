//! Engine errors

use latchkey_core::{ConfigError, ProtocolAddress, RatchetError, SenderKeyName, StorageError};
use thiserror::Error;

/// Errors returned by [`crate::Engine`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The ratchet rejected the operation
    #[error(transparent)]
    Ratchet(#[from] RatchetError),

    /// The store failed
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// The engine was built with an unusable configuration
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// No session exists for this device
    #[error("no session with {address}")]
    NoSession {
        /// Remote device
        address: ProtocolAddress,
    },

    /// No sender key record exists for this group sender
    #[error("no sender key for {name}")]
    NoSenderKey {
        /// Group sender
        name: SenderKeyName,
    },
}

impl EngineError {
    /// Returns true if the affected identity's state cannot be used again
    /// without resetting it.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Ratchet(err) => err.is_fatal(),
            Self::Config(_) => true,
            Self::Storage(_) | Self::NoSession { .. } | Self::NoSenderKey { .. } => false,
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_transient())
    }
}

impl From<StorageError> for EngineError {
    /// Undecodable stored bytes are corrupt state. Encoder and I/O failures
    /// stay storage errors.
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Serialization(reason) => {
                Self::Ratchet(RatchetError::MalformedStructure { reason })
            },
            other => Self::Storage(other),
        }
    }
}
