//! Persisted pairwise session structures

use serde::{Deserialize, Serialize};

use super::message::SESSION_VERSION;
use crate::structure::{ChainKeyStructure, MessageKeyStructure};

fn default_session_version() -> u32 {
    u32::from(SESSION_VERSION)
}

/// One pairwise session as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStructure {
    /// Message version (default 3)
    #[serde(default = "default_session_version")]
    pub session_version: u32,
    /// Our identity public key
    #[serde(default, with = "serde_bytes")]
    pub local_identity_public: Vec<u8>,
    /// Peer identity public key
    #[serde(default, with = "serde_bytes")]
    pub remote_identity_public: Vec<u8>,
    /// Our registration id (default 0)
    #[serde(default)]
    pub local_registration_id: u32,
    /// Peer registration id (default 0)
    #[serde(default)]
    pub remote_registration_id: u32,
    /// Root key
    #[serde(default, with = "serde_bytes")]
    pub root_key: Vec<u8>,
    /// Length of our previous sending chain (default 0)
    #[serde(default)]
    pub previous_counter: u32,
    /// Our sending chain
    #[serde(default)]
    pub sender_chain: Option<SenderChainStructure>,
    /// Receiving chains, most recent first (default empty)
    #[serde(default)]
    pub receiver_chains: Vec<ReceiverChainStructure>,
    /// Skipped message keys, oldest first (default empty)
    #[serde(default)]
    pub skipped_message_keys: Vec<SkippedKeyStructure>,
}

/// Sending chain as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderChainStructure {
    /// Secret half of our current ratchet key pair
    #[serde(default, with = "serde_bytes")]
    pub ratchet_key_private: Vec<u8>,
    /// Chain key
    #[serde(default)]
    pub chain_key: ChainKeyStructure,
}

/// Receiving chain as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverChainStructure {
    /// Peer ratchet public key this chain belongs to
    #[serde(default, with = "serde_bytes")]
    pub ratchet_key: Vec<u8>,
    /// Chain key
    #[serde(default)]
    pub chain_key: ChainKeyStructure,
}

/// Skipped message key, tagged with its receiving chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedKeyStructure {
    /// Peer ratchet public key of the chain the key was derived on
    #[serde(default, with = "serde_bytes")]
    pub ratchet_key: Vec<u8>,
    /// The message key
    #[serde(default)]
    pub message_key: MessageKeyStructure,
}

/// Session record as persisted: current session plus archived ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecordStructure {
    /// Active session, if any
    #[serde(default)]
    pub current_session: Option<SessionStructure>,
    /// Archived sessions, most recent first (default empty)
    #[serde(default)]
    pub previous_sessions: Vec<SessionStructure>,
}
