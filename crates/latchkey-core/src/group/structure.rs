//! Persisted sender key structures

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::structure::{ChainKeyStructure, MessageKeyStructure};

/// Signing key as persisted: always the public half, the private half only
/// for our own chains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderSigningKeyStructure {
    /// Ed25519 public key
    #[serde(default, with = "serde_bytes")]
    pub public: Vec<u8>,
    /// Ed25519 secret seed (absent for remote chains)
    #[serde(default)]
    pub private: Option<ByteBuf>,
}

/// One sender key chain as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderKeyStateStructure {
    /// Chain identifier (default 0)
    #[serde(default)]
    pub key_id: u32,
    /// Chain key
    #[serde(default)]
    pub chain_key: ChainKeyStructure,
    /// Signing key
    #[serde(default)]
    pub signing_key: SenderSigningKeyStructure,
    /// Parked message keys, oldest first (default empty)
    #[serde(default)]
    pub sender_message_keys: Vec<MessageKeyStructure>,
}

/// Sender key record as persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderKeyRecordStructure {
    /// States, most recent first (default empty)
    #[serde(default)]
    pub sender_key_states: Vec<SenderKeyStateStructure>,
}
