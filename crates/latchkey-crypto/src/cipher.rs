//! Message encryption using `XChaCha20-Poly1305` plus a truncated HMAC
//!
//! All functions are pure. The nonce is the message key's IV, which is unique
//! per (chain, iteration) because every message key is used once.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{error::CryptoError, message_key::MessageKey};

type HmacSha256 = Hmac<Sha256>;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Truncated message MAC size (8 bytes)
pub const MAC_SIZE: usize = 8;

/// Encrypt `plaintext`, authenticating `aad` alongside it.
///
/// Returns ciphertext with the 16-byte Poly1305 tag appended.
pub fn seal(key: &MessageKey, plaintext: &[u8], aad: &[u8]) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(key.cipher_key().into());

    let Ok(ciphertext) =
        cipher.encrypt(XNonce::from_slice(key.iv()), Payload { msg: plaintext, aad })
    else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    ciphertext
}

/// Decrypt `ciphertext` produced by [`seal`] with the same key and `aad`.
///
/// # Errors
///
/// - `AuthenticationFailed`: tag mismatch (wrong key, tampered ciphertext or
///   associated data)
pub fn open(key: &MessageKey, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.cipher_key().into());

    cipher
        .decrypt(XNonce::from_slice(key.iv()), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// HMAC-SHA256 over the concatenation of `parts`, truncated to
/// [`MAC_SIZE`] bytes.
pub fn compute_mac(key: &MessageKey, parts: &[&[u8]]) -> [u8; MAC_SIZE] {
    let mac = keyed_mac(key, parts);
    let full = mac.finalize().into_bytes();

    let mut out = [0u8; MAC_SIZE];
    out.copy_from_slice(&full[..MAC_SIZE]);
    out
}

/// Constant-time check of a truncated MAC produced by [`compute_mac`].
pub fn verify_mac(key: &MessageKey, parts: &[&[u8]], expected: &[u8]) -> Result<(), CryptoError> {
    if expected.len() != MAC_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }

    keyed_mac(key, parts)
        .verify_truncated_left(expected)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

fn keyed_mac(key: &MessageKey, parts: &[&[u8]]) -> HmacSha256 {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(key.mac_key()) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    for part in parts {
        mac.update(part);
    }
    mac
}
