//! Latchkey Cryptographic Primitives
//!
//! Symmetric building blocks for the Latchkey ratchet engine. Everything here
//! is a pure function or a plain value type: no I/O, no randomness, no global
//! state. Callers that need fresh key material (ratchet key pairs, chain
//! seeds) generate it themselves and pass the bytes in.
//!
//! # Key Lifecycle
//!
//! ```text
//! Shared secret (external handshake)
//!        │
//!        ▼ HKDF
//! RootKey ──DH ratchet──▶ RootKey'
//!        │
//!        ▼
//! ChainKey[i] ──HMAC(0x02)──▶ ChainKey[i+1]
//!        │
//!        ▼ HMAC(0x01) + HKDF
//! MessageKey[i] = cipher key | MAC key | IV
//!        │
//!        ▼
//! XChaCha20-Poly1305 + truncated HMAC
//! ```
//!
//! A chain key only ever moves forward. Message keys are derived lazily, used
//! for exactly one message, and wiped on drop. Keys derived ahead of time to
//! absorb reordering live in a bounded [`MessageKeyCache`] until they are
//! consumed or evicted.
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain advancement is one-way HMAC; no API goes from iteration `i` back to
//!   `i - 1`
//! - Chain and message key bytes are zeroized on drop
//!
//! Authenticity:
//! - XChaCha20-Poly1305 AEAD with caller-supplied associated data
//! - Truncated HMAC-SHA256 binds both identities to pairwise messages

#![forbid(unsafe_code)]

pub mod cache;
pub mod chain_key;
pub mod cipher;
pub mod error;
pub mod kdf;
pub mod message_key;

pub use cache::MessageKeyCache;
pub use chain_key::{ChainKey, RootKey};
pub use cipher::{MAC_SIZE, TAG_SIZE, compute_mac, open, seal, verify_mac};
pub use error::CryptoError;
pub use kdf::{derive_initial_keys, derive_message_key, derive_next_chain_key};
pub use message_key::MessageKey;
