//! One sender key chain

use latchkey_crypto::{ChainKey, MessageKey, MessageKeyCache};

use super::{
    message::SenderKeyDistribution,
    signing::SenderSigningKey,
    structure::{SenderKeyStateStructure, SenderSigningKeyStructure},
};
use crate::{
    config::RatchetConfig,
    env::Environment,
    error::RatchetError,
    ratchet,
    structure::{ChainKeyStructure, MessageKeyStructure, fixed},
};

/// Key ids are kept within 31 bits.
const KEY_ID_MASK: u32 = 0x7FFF_FFFF;

/// A sender's chain as seen by one device.
///
/// The sender's own state carries an owned signing key; every other member
/// holds a public-only copy built from the sender's distribution.
#[derive(Debug, Clone)]
pub struct SenderKeyState {
    key_id: u32,
    chain_key: ChainKey,
    signing_key: SenderSigningKey,
    message_keys: MessageKeyCache,
    max_skip: u32,
}

impl SenderKeyState {
    /// State for an existing chain.
    pub fn new(
        key_id: u32,
        chain_key: ChainKey,
        signing_key: SenderSigningKey,
        config: &RatchetConfig,
    ) -> Self {
        Self {
            key_id,
            chain_key,
            signing_key,
            message_keys: MessageKeyCache::new(config.max_message_keys),
            max_skip: config.max_skip,
        }
    }

    /// Fresh chain with a random key id, chain seed and owned signing key.
    pub fn generate(env: &impl Environment, config: &RatchetConfig) -> Self {
        let key_id = env.random_u32() & KEY_ID_MASK;
        let chain_key = ChainKey::new(env.random_key(), 0);
        let signing_key = SenderSigningKey::generate(env);
        Self::new(key_id, chain_key, signing_key, config)
    }

    /// Chain identifier.
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    /// Current chain key.
    pub fn chain_key(&self) -> &ChainKey {
        &self.chain_key
    }

    /// Step the sending chain and return the key for the next message.
    pub(crate) fn next_sending_key(&mut self) -> Result<MessageKey, RatchetError> {
        Ok(self.chain_key.advance()?)
    }

    /// Signing key.
    pub fn signing_key(&self) -> &SenderSigningKey {
        &self.signing_key
    }

    /// Park a message key for a late message.
    pub fn add_sender_message_key(&mut self, key: MessageKey) {
        self.message_keys.put(key);
    }

    /// Take the parked key for `iteration`, if any.
    pub fn remove_sender_message_key(&mut self, iteration: u32) -> Option<MessageKey> {
        self.message_keys.take(iteration)
    }

    /// Whether a key for `iteration` is parked.
    pub fn has_sender_message_key(&self, iteration: u32) -> bool {
        self.message_keys.contains(iteration)
    }

    /// Number of parked keys.
    pub fn sender_message_key_count(&self) -> usize {
        self.message_keys.len()
    }

    /// Message key for an incoming message at `iteration`.
    ///
    /// Advances the chain or consumes a parked key. A gap beyond `max_skip`
    /// fails before anything changes.
    pub fn resolve_message_key(&mut self, iteration: u32) -> Result<MessageKey, RatchetError> {
        ratchet::resolve_message_key(
            &mut self.chain_key,
            &mut self.message_keys,
            &(),
            iteration,
            self.max_skip,
        )
    }

    /// Distribution message describing the chain from its current iteration.
    pub fn distribution(&self) -> SenderKeyDistribution {
        SenderKeyDistribution {
            key_id: self.key_id,
            iteration: self.chain_key.iteration(),
            chain_key: *self.chain_key.value(),
            signing_key: self.signing_key.public_bytes(),
        }
    }

    /// Snapshot for persistence.
    pub fn to_structure(&self) -> SenderKeyStateStructure {
        SenderKeyStateStructure {
            key_id: self.key_id,
            chain_key: ChainKeyStructure::from_chain_key(&self.chain_key),
            signing_key: SenderSigningKeyStructure {
                public: self.signing_key.public_bytes().to_vec(),
                private: self
                    .signing_key
                    .private_bytes()
                    .map(|bytes| serde_bytes::ByteBuf::from(bytes.to_vec())),
            },
            sender_message_keys: self
                .message_keys
                .keys()
                .map(MessageKeyStructure::from_message_key)
                .collect(),
        }
    }

    /// Rebuild from a persisted structure.
    ///
    /// A structure written before skipped keys were persisted has no
    /// `sender_message_keys` and loads with an empty cache.
    pub fn from_structure(
        structure: &SenderKeyStateStructure,
        config: &RatchetConfig,
    ) -> Result<Self, RatchetError> {
        let public: [u8; 32] = fixed(&structure.signing_key.public, "signing_key.public")?;
        let private: Option<[u8; 32]> = structure
            .signing_key
            .private
            .as_ref()
            .map(|bytes| fixed(bytes, "signing_key.private"))
            .transpose()?;
        let signing_key = SenderSigningKey::from_bytes(&public, private.as_ref())?;

        let mut state =
            Self::new(structure.key_id, structure.chain_key.to_chain_key()?, signing_key, config);
        for key in &structure.sender_message_keys {
            state.add_sender_message_key(key.to_message_key()?);
        }
        Ok(state)
    }
}
