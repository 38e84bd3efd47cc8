//! Persisted state structures
//!
//! Every state type converts to and from a plain serde structure. Structures
//! are what the store sees; they are encoded as CBOR.
//!
//! # Compatibility
//!
//! Records written by older versions may lack fields. Absent collections load
//! as empty, absent scalars load as their documented default. Loading never
//! fails because an optional field is missing. It fails when key material is
//! absent or unusable (a key of the wrong length, a curve point that does not
//! decode), since no default key is meaningful.

use latchkey_crypto::{ChainKey, MessageKey};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{error::RatchetError, storage::StorageError};

/// Chain key as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainKeyStructure {
    /// Current iteration (default 0)
    #[serde(default)]
    pub iteration: u32,
    /// 32-byte chain value
    #[serde(default, with = "serde_bytes")]
    pub key: Vec<u8>,
}

impl ChainKeyStructure {
    /// Snapshot a live chain key.
    pub fn from_chain_key(chain_key: &ChainKey) -> Self {
        Self { iteration: chain_key.iteration(), key: chain_key.value().to_vec() }
    }

    /// Rebuild the chain key.
    pub fn to_chain_key(&self) -> Result<ChainKey, RatchetError> {
        Ok(ChainKey::from_slice(&self.key, self.iteration)?)
    }
}

/// Cached message key as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageKeyStructure {
    /// Chain iteration the key belongs to
    #[serde(default)]
    pub iteration: u32,
    /// AEAD key
    #[serde(default, with = "serde_bytes")]
    pub cipher_key: Vec<u8>,
    /// MAC key
    #[serde(default, with = "serde_bytes")]
    pub mac_key: Vec<u8>,
    /// AEAD nonce
    #[serde(default, with = "serde_bytes")]
    pub iv: Vec<u8>,
}

impl MessageKeyStructure {
    /// Snapshot a cached message key.
    pub fn from_message_key(key: &MessageKey) -> Self {
        Self {
            iteration: key.iteration(),
            cipher_key: key.cipher_key().to_vec(),
            mac_key: key.mac_key().to_vec(),
            iv: key.iv().to_vec(),
        }
    }

    /// Rebuild the message key.
    pub fn to_message_key(&self) -> Result<MessageKey, RatchetError> {
        Ok(MessageKey::from_parts(self.iteration, &self.cipher_key, &self.mac_key, &self.iv)?)
    }
}

/// Encode a structure as CBOR.
///
/// A failure here says nothing about stored data, so it is reported as
/// [`StorageError::Encoding`].
pub fn to_bytes<T: Serialize>(structure: &T) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(structure, &mut bytes)
        .map_err(|e| StorageError::Encoding(format!("CBOR encode failed: {e}")))?;
    Ok(bytes)
}

/// Decode a CBOR structure.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::de::from_reader(bytes)
        .map_err(|e| StorageError::Serialization(format!("CBOR decode failed: {e}")))
}

/// Convert a persisted byte field into a fixed-size array.
pub(crate) fn fixed<const N: usize>(bytes: &[u8], field: &str) -> Result<[u8; N], RatchetError> {
    <[u8; N]>::try_from(bytes).map_err(|_| {
        RatchetError::malformed(format!("{field}: expected {N} bytes, got {}", bytes.len()))
    })
}
