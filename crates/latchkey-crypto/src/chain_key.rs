//! Chain and root keys
//!
//! # Security Properties
//!
//! - Forward Secrecy: advancing replaces the chain value with a one-way HMAC of
//!   itself; the old value is zeroized
//! - Determinism: the same value and iteration always produce the same
//!   successor and message key

use std::fmt;

use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    kdf::{self, KEY_SIZE},
    message_key::MessageKey,
};

/// Ratcheting seed for a sequence of message keys.
///
/// The value at iteration `i` is only ever produced from the value at `i - 1`.
/// There is deliberately no operation that moves a chain backwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ChainKey {
    iteration: u32,
    value: [u8; KEY_SIZE],
}

impl ChainKey {
    /// Create a chain key at the given iteration.
    pub fn new(value: [u8; KEY_SIZE], iteration: u32) -> Self {
        Self { iteration, value }
    }

    /// Create a chain key from untrusted bytes (e.g. a persisted structure).
    pub fn from_slice(value: &[u8], iteration: u32) -> Result<Self, CryptoError> {
        let value = <[u8; KEY_SIZE]>::try_from(value)
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: value.len(),
            })?;
        Ok(Self { iteration, value })
    }

    /// Current iteration.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Raw chain value, for persistence.
    pub fn value(&self) -> &[u8; KEY_SIZE] {
        &self.value
    }

    /// Chain key for the next iteration.
    pub fn next(&self) -> Result<Self, CryptoError> {
        kdf::derive_next_chain_key(self)
    }

    /// Message key for the current iteration.
    pub fn message_key(&self) -> MessageKey {
        kdf::derive_message_key(self)
    }

    /// Derive the message key for the current iteration and step forward.
    ///
    /// On error the chain is left untouched.
    pub fn advance(&mut self) -> Result<MessageKey, CryptoError> {
        let next = self.next()?;
        let message_key = self.message_key();

        self.value.zeroize();
        *self = next;

        Ok(message_key)
    }
}

impl fmt::Debug for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainKey").field("iteration", &self.iteration).finish_non_exhaustive()
    }
}

impl Drop for ChainKey {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// Root of a pairwise session's key schedule.
///
/// Every Diffie-Hellman ratchet step mixes a fresh DH output into the root
/// key, producing the next root key and a new chain key.
#[derive(Clone, PartialEq, Eq)]
pub struct RootKey {
    value: [u8; KEY_SIZE],
}

impl RootKey {
    /// Wrap a 32-byte root key.
    pub fn new(value: [u8; KEY_SIZE]) -> Self {
        Self { value }
    }

    /// Create a root key from untrusted bytes.
    pub fn from_slice(value: &[u8]) -> Result<Self, CryptoError> {
        let value = <[u8; KEY_SIZE]>::try_from(value)
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: value.len(),
            })?;
        Ok(Self { value })
    }

    /// Raw root value, for persistence.
    pub fn value(&self) -> &[u8; KEY_SIZE] {
        &self.value
    }

    /// Mix a DH output into the root key.
    ///
    /// Returns the next root key and a chain key starting at iteration 0.
    pub fn create_chain(&self, dh_output: &[u8; KEY_SIZE]) -> (Self, ChainKey) {
        let (root, chain) = kdf::derive_root_step(&self.value, dh_output);
        (Self::new(root), ChainKey::new(chain, 0))
    }
}

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootKey(..)")
    }
}

impl Drop for RootKey {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}
