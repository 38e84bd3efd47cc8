//! Single-use message keys

use std::fmt;

use zeroize::Zeroize;

use crate::error::CryptoError;

/// Length of the AEAD cipher key.
pub const CIPHER_KEY_SIZE: usize = 32;

/// Length of the HMAC key.
pub const MAC_KEY_SIZE: usize = 32;

/// Length of the `XChaCha20` nonce.
pub const IV_SIZE: usize = 24;

/// Key material for exactly one message.
///
/// Derived deterministically from a [`crate::ChainKey`] at a given iteration.
/// The owner must drop it after one encryption or decryption; caches hand it
/// out by value so the same key cannot be taken twice.
#[derive(Clone, PartialEq, Eq)]
pub struct MessageKey {
    iteration: u32,
    cipher_key: [u8; CIPHER_KEY_SIZE],
    mac_key: [u8; MAC_KEY_SIZE],
    iv: [u8; IV_SIZE],
}

impl MessageKey {
    pub(crate) fn new(
        iteration: u32,
        cipher_key: [u8; CIPHER_KEY_SIZE],
        mac_key: [u8; MAC_KEY_SIZE],
        iv: [u8; IV_SIZE],
    ) -> Self {
        Self { iteration, cipher_key, mac_key, iv }
    }

    /// Rebuild a message key from persisted parts.
    ///
    /// Only used when restoring a skipped-key cache; fresh keys always come
    /// from [`crate::derive_message_key`].
    pub fn from_parts(
        iteration: u32,
        cipher_key: &[u8],
        mac_key: &[u8],
        iv: &[u8],
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            iteration,
            cipher_key: to_array(cipher_key)?,
            mac_key: to_array(mac_key)?,
            iv: to_array(iv)?,
        })
    }

    /// Chain iteration this key belongs to.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// 32-byte `XChaCha20-Poly1305` key.
    pub fn cipher_key(&self) -> &[u8; CIPHER_KEY_SIZE] {
        &self.cipher_key
    }

    /// 32-byte HMAC-SHA256 key.
    pub fn mac_key(&self) -> &[u8; MAC_KEY_SIZE] {
        &self.mac_key
    }

    /// 24-byte nonce.
    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }
}

impl fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageKey").field("iteration", &self.iteration).finish_non_exhaustive()
    }
}

impl Drop for MessageKey {
    fn drop(&mut self) {
        self.cipher_key.zeroize();
        self.mac_key.zeroize();
        self.iv.zeroize();
    }
}

fn to_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], CryptoError> {
    <[u8; N]>::try_from(bytes)
        .map_err(|_| CryptoError::InvalidKeyLength { expected: N, actual: bytes.len() })
}
