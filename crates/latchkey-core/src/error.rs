//! Error types for ratchet operations
//!
//! Every decrypt failure is a typed outcome local to one message. Only
//! `MalformedStructure` and `ChainExhausted` mean the state itself can no
//! longer be used.

use latchkey_crypto::CryptoError;
use thiserror::Error;

/// Errors from session and sender key operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RatchetError {
    /// Message header could not be parsed or carries an unusable ratchet key
    #[error("invalid header: {reason}")]
    InvalidHeader {
        /// What was wrong with the header
        reason: String,
    },

    /// Message iteration is further ahead than the skip bound allows
    #[error("message gap too large: at iteration {current}, got {requested} (max skip {max_skip})")]
    ExcessiveMessageGap {
        /// Current chain iteration
        current: u32,
        /// Iteration carried by the message
        requested: u32,
        /// Configured skip bound
        max_skip: u32,
    },

    /// Message key for a past iteration is not cached: replay, duplicate, or
    /// evicted
    #[error("duplicate or stale message: iteration {iteration}, chain at {current}")]
    DuplicateOrStaleMessage {
        /// Iteration carried by the message
        iteration: u32,
        /// Current chain iteration
        current: u32,
    },

    /// No sender key state for this key id (distribution not received, or
    /// rotated out)
    #[error("unknown sender key id {key_id}")]
    UnknownSenderKey {
        /// Key id carried by the message
        key_id: u32,
    },

    /// Sender key message signature did not verify
    #[error("invalid sender key signature")]
    SignatureInvalid,

    /// Message MAC or AEAD tag did not verify
    #[error("message authentication failed")]
    AuthenticationFailed,

    /// Persisted state is corrupt beyond recovery
    #[error("malformed structure: {reason}")]
    MalformedStructure {
        /// What could not be reconstructed
        reason: String,
    },

    /// Chain iteration counter would overflow
    #[error("chain exhausted at iteration {iteration}")]
    ChainExhausted {
        /// Iteration at which the overflow was detected
        iteration: u32,
    },

    /// Tried to encrypt with a sender key that only holds the public half
    #[error("sender key {key_id} has no private signing key")]
    MissingSigningKey {
        /// Key id of the remote-only state
        key_id: u32,
    },

    /// Record holds no state to encrypt with
    #[error("no current state in record")]
    NoCurrentState,

    /// An outgoing structure could not be encoded
    #[error("could not encode: {reason}")]
    EncodingFailed {
        /// Encoder failure
        reason: String,
    },
}

impl RatchetError {
    /// Returns true if the state that produced this error cannot be used again.
    ///
    /// Everything else is local to the one message that triggered it.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MalformedStructure { .. } | Self::ChainExhausted { .. } => true,

            Self::InvalidHeader { .. }
            | Self::ExcessiveMessageGap { .. }
            | Self::DuplicateOrStaleMessage { .. }
            | Self::UnknownSenderKey { .. }
            | Self::SignatureInvalid
            | Self::AuthenticationFailed
            | Self::MissingSigningKey { .. }
            | Self::NoCurrentState
            | Self::EncodingFailed { .. } => false,
        }
    }

    pub(crate) fn invalid_header(reason: impl Into<String>) -> Self {
        Self::InvalidHeader { reason: reason.into() }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedStructure { reason: reason.into() }
    }
}

impl From<CryptoError> for RatchetError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::ChainExhausted { iteration } => Self::ChainExhausted { iteration },
            CryptoError::AuthenticationFailed => Self::AuthenticationFailed,
            CryptoError::InvalidKeyLength { .. } => Self::malformed(err.to_string()),
        }
    }
}
