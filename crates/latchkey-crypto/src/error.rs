//! Error types for the symmetric primitives

use thiserror::Error;

/// Errors from key derivation and symmetric encryption
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Chain iteration counter would overflow
    #[error("chain exhausted at iteration {iteration}")]
    ChainExhausted {
        /// Iteration at which the overflow was detected
        iteration: u32,
    },

    /// AEAD tag or message MAC did not verify
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Key material had the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },
}
