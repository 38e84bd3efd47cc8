//! Pairwise Double Ratchet session

use std::{collections::VecDeque, fmt};

use latchkey_crypto::{
    ChainKey, MessageKeyCache, RootKey, compute_mac, derive_initial_keys, open, seal, verify_mac,
};
use tracing::{debug, info};
use zeroize::Zeroize;

use super::{
    keys::RatchetKeyPair,
    message::{MessageHeader, SESSION_VERSION, SessionMessage},
    structure::{
        ReceiverChainStructure, SenderChainStructure, SessionStructure, SkippedKeyStructure,
    },
};
use crate::{
    config::RatchetConfig,
    env::Environment,
    error::RatchetError,
    ratchet::resolve_message_key,
    structure::{ChainKeyStructure, MessageKeyStructure, fixed},
};

/// Inputs produced by the session handshake.
///
/// The handshake itself (prekeys, identity verification) happens outside
/// this crate; both sides must arrive at the same `shared_secret`.
#[derive(Clone)]
pub struct SessionParams {
    /// Secret agreed by the handshake
    pub shared_secret: Vec<u8>,
    /// Our identity public key
    pub local_identity: [u8; 32],
    /// Peer identity public key
    pub remote_identity: [u8; 32],
    /// Our registration id
    pub local_registration_id: u32,
    /// Peer registration id
    pub remote_registration_id: u32,
}

impl fmt::Debug for SessionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionParams")
            .field("local_registration_id", &self.local_registration_id)
            .field("remote_registration_id", &self.remote_registration_id)
            .finish_non_exhaustive()
    }
}

impl Drop for SessionParams {
    fn drop(&mut self) {
        self.shared_secret.zeroize();
    }
}

#[derive(Debug, Clone)]
struct SenderChain {
    ratchet_key: RatchetKeyPair,
    chain_key: ChainKey,
}

#[derive(Debug, Clone)]
struct ReceiverChain {
    ratchet_key: [u8; 32],
    chain_key: ChainKey,
}

/// State of one pairwise session.
///
/// # Invariants
///
/// - Receiving chains are ordered most recent first and bounded by
///   `max_receiver_chains`; a pruned chain takes its skipped keys with it
/// - Every skipped key is tagged with the ratchet key of a retained chain
/// - A failed [`Self::decrypt`] leaves the state unchanged
#[derive(Debug, Clone)]
pub struct SessionState {
    version: u8,
    local_identity: [u8; 32],
    remote_identity: [u8; 32],
    local_registration_id: u32,
    remote_registration_id: u32,
    root_key: RootKey,
    sender_chain: SenderChain,
    receiver_chains: VecDeque<ReceiverChain>,
    skipped_keys: MessageKeyCache<[u8; 32]>,
    previous_counter: u32,
    max_skip: u32,
    max_receiver_chains: usize,
}

impl SessionState {
    /// Start a session as the party that sends first.
    ///
    /// `their_ratchet_key` is the peer's ratchet public key from the
    /// handshake. We immediately perform the first DH step so our first
    /// message already carries a fresh ratchet key.
    pub fn initiate(
        env: &impl Environment,
        config: &RatchetConfig,
        params: &SessionParams,
        their_ratchet_key: [u8; 32],
    ) -> Result<Self, RatchetError> {
        let (root_key, initial_chain) = derive_initial_keys(&params.shared_secret);

        let our_ratchet_key = RatchetKeyPair::generate(env);
        let dh_output = our_ratchet_key.agree(&their_ratchet_key)?;
        let (root_key, sending_chain) = root_key.create_chain(&dh_output);

        let mut receiver_chains = VecDeque::new();
        receiver_chains
            .push_front(ReceiverChain { ratchet_key: their_ratchet_key, chain_key: initial_chain });

        info!(
            remote_registration_id = params.remote_registration_id,
            "initiated pairwise session"
        );

        Ok(Self {
            version: SESSION_VERSION,
            local_identity: params.local_identity,
            remote_identity: params.remote_identity,
            local_registration_id: params.local_registration_id,
            remote_registration_id: params.remote_registration_id,
            root_key,
            sender_chain: SenderChain { ratchet_key: our_ratchet_key, chain_key: sending_chain },
            receiver_chains,
            skipped_keys: MessageKeyCache::new(config.max_message_keys),
            previous_counter: 0,
            max_skip: config.max_skip,
            max_receiver_chains: config.max_receiver_chains,
        })
    }

    /// Start a session as the party whose ratchet key the initiator used.
    ///
    /// Until the first message from the initiator arrives we can still send
    /// on the initial chain under `our_ratchet_key`.
    pub fn respond(
        config: &RatchetConfig,
        params: &SessionParams,
        our_ratchet_key: RatchetKeyPair,
    ) -> Self {
        let (root_key, initial_chain) = derive_initial_keys(&params.shared_secret);

        info!(
            remote_registration_id = params.remote_registration_id,
            "responded to pairwise session"
        );

        Self {
            version: SESSION_VERSION,
            local_identity: params.local_identity,
            remote_identity: params.remote_identity,
            local_registration_id: params.local_registration_id,
            remote_registration_id: params.remote_registration_id,
            root_key,
            sender_chain: SenderChain { ratchet_key: our_ratchet_key, chain_key: initial_chain },
            receiver_chains: VecDeque::new(),
            skipped_keys: MessageKeyCache::new(config.max_message_keys),
            previous_counter: 0,
            max_skip: config.max_skip,
            max_receiver_chains: config.max_receiver_chains,
        }
    }

    /// Encrypt one message on the sending chain.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<SessionMessage, RatchetError> {
        let mut chain_key = self.sender_chain.chain_key.clone();
        let message_key = chain_key.advance()?;

        let header = MessageHeader {
            ratchet_key: self.sender_chain.ratchet_key.public_key(),
            iteration: message_key.iteration(),
            previous_counter: self.previous_counter,
        };
        let header_bytes = header.encode();

        let ciphertext = seal(&message_key, plaintext, &header_bytes);
        let parts: [&[u8]; 4] =
            [&self.local_identity, &self.remote_identity, &header_bytes, &ciphertext];
        let mac = compute_mac(&message_key, &parts);

        self.sender_chain.chain_key = chain_key;
        Ok(SessionMessage { header, ciphertext, mac })
    }

    /// Decrypt one message, ratcheting forward if it carries a new ratchet key.
    ///
    /// All work happens on a copy that replaces `self` only once the MAC and
    /// AEAD tag have verified.
    pub fn decrypt(
        &mut self,
        env: &impl Environment,
        message: &SessionMessage,
    ) -> Result<Vec<u8>, RatchetError> {
        let mut candidate = self.clone();
        let plaintext = candidate.decrypt_in_place(env, message)?;
        *self = candidate;
        Ok(plaintext)
    }

    fn decrypt_in_place(
        &mut self,
        env: &impl Environment,
        message: &SessionMessage,
    ) -> Result<Vec<u8>, RatchetError> {
        let header = message.header;

        if !self.has_receiver_chain(&header.ratchet_key) {
            self.skip_current_receiver_chain(header.previous_counter)?;
            self.ratchet_step(env, header.ratchet_key)?;
        }

        let max_skip = self.max_skip;
        let chain = self
            .receiver_chains
            .iter_mut()
            .find(|chain| chain.ratchet_key == header.ratchet_key)
            .ok_or_else(|| RatchetError::invalid_header("no receiving chain for ratchet key"))?;

        let message_key = resolve_message_key(
            &mut chain.chain_key,
            &mut self.skipped_keys,
            &header.ratchet_key,
            header.iteration,
            max_skip,
        )?;

        let header_bytes = header.encode();
        let parts: [&[u8]; 4] =
            [&self.remote_identity, &self.local_identity, &header_bytes, &message.ciphertext];
        verify_mac(&message_key, &parts, &message.mac)?;

        Ok(open(&message_key, &message.ciphertext, &header_bytes)?)
    }

    /// Park the rest of the most recent receiving chain before leaving it.
    ///
    /// The peer tells us how long that chain got (`previous_counter`), so
    /// messages still in flight on it remain decryptable.
    fn skip_current_receiver_chain(&mut self, until: u32) -> Result<(), RatchetError> {
        let Some(chain) = self.receiver_chains.front_mut() else {
            return Ok(());
        };

        let current = chain.chain_key.iteration();
        if until <= current {
            return Ok(());
        }
        if until - current > self.max_skip {
            return Err(RatchetError::ExcessiveMessageGap {
                current,
                requested: until,
                max_skip: self.max_skip,
            });
        }

        while chain.chain_key.iteration() < until {
            let skipped = chain.chain_key.advance()?;
            if let Some(evicted) = self.skipped_keys.put_tagged(chain.ratchet_key, skipped) {
                debug!(evicted = evicted.iteration(), "skipped message key evicted");
            }
        }
        Ok(())
    }

    fn ratchet_step(
        &mut self,
        env: &impl Environment,
        their_ratchet_key: [u8; 32],
    ) -> Result<(), RatchetError> {
        let receiving_dh = self.sender_chain.ratchet_key.agree(&their_ratchet_key)?;
        let (root_key, receiving_chain) = self.root_key.create_chain(&receiving_dh);

        let our_ratchet_key = RatchetKeyPair::generate(env);
        let sending_dh = our_ratchet_key.agree(&their_ratchet_key)?;
        let (root_key, sending_chain) = root_key.create_chain(&sending_dh);

        self.previous_counter = self.sender_chain.chain_key.iteration();
        self.root_key = root_key;
        self.sender_chain = SenderChain { ratchet_key: our_ratchet_key, chain_key: sending_chain };
        self.receiver_chains
            .push_front(ReceiverChain {
                ratchet_key: their_ratchet_key,
                chain_key: receiving_chain,
            });

        while self.receiver_chains.len() > self.max_receiver_chains {
            if let Some(retired) = self.receiver_chains.pop_back() {
                self.skipped_keys.retain_tags(|tag| *tag != retired.ratchet_key);
                debug!(iteration = retired.chain_key.iteration(), "pruned receiving chain");
            }
        }

        debug!(
            previous_counter = self.previous_counter,
            receiver_chains = self.receiver_chains.len(),
            "DH ratchet step"
        );
        Ok(())
    }

    /// Whether we hold a receiving chain for this peer ratchet key.
    pub fn has_receiver_chain(&self, ratchet_key: &[u8; 32]) -> bool {
        self.receiver_chains.iter().any(|chain| &chain.ratchet_key == ratchet_key)
    }

    /// Message version.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Our identity public key.
    pub fn local_identity(&self) -> &[u8; 32] {
        &self.local_identity
    }

    /// Peer identity public key.
    pub fn remote_identity(&self) -> &[u8; 32] {
        &self.remote_identity
    }

    /// Our registration id.
    pub fn local_registration_id(&self) -> u32 {
        self.local_registration_id
    }

    /// Peer registration id.
    pub fn remote_registration_id(&self) -> u32 {
        self.remote_registration_id
    }

    /// Our current ratchet public key.
    pub fn sender_ratchet_key(&self) -> [u8; 32] {
        self.sender_chain.ratchet_key.public_key()
    }

    /// Iteration the next outgoing message will use.
    pub fn sender_iteration(&self) -> u32 {
        self.sender_chain.chain_key.iteration()
    }

    /// Length of our previous sending chain.
    pub fn previous_counter(&self) -> u32 {
        self.previous_counter
    }

    /// Number of retained receiving chains.
    pub fn receiver_chain_count(&self) -> usize {
        self.receiver_chains.len()
    }

    /// Number of cached skipped message keys.
    pub fn skipped_key_count(&self) -> usize {
        self.skipped_keys.len()
    }

    /// Snapshot for persistence.
    pub fn to_structure(&self) -> SessionStructure {
        SessionStructure {
            session_version: u32::from(self.version),
            local_identity_public: self.local_identity.to_vec(),
            remote_identity_public: self.remote_identity.to_vec(),
            local_registration_id: self.local_registration_id,
            remote_registration_id: self.remote_registration_id,
            root_key: self.root_key.value().to_vec(),
            previous_counter: self.previous_counter,
            sender_chain: Some(SenderChainStructure {
                ratchet_key_private: self.sender_chain.ratchet_key.secret_bytes().to_vec(),
                chain_key: ChainKeyStructure::from_chain_key(&self.sender_chain.chain_key),
            }),
            receiver_chains: self
                .receiver_chains
                .iter()
                .map(|chain| ReceiverChainStructure {
                    ratchet_key: chain.ratchet_key.to_vec(),
                    chain_key: ChainKeyStructure::from_chain_key(&chain.chain_key),
                })
                .collect(),
            skipped_message_keys: self
                .skipped_keys
                .iter()
                .map(|(ratchet_key, key)| SkippedKeyStructure {
                    ratchet_key: ratchet_key.to_vec(),
                    message_key: MessageKeyStructure::from_message_key(key),
                })
                .collect(),
        }
    }

    /// Rebuild a session from its persisted structure.
    ///
    /// Limits come from `config`, not from the structure. Receiving chains
    /// beyond the limit are dropped together with their skipped keys.
    pub fn from_structure(
        structure: &SessionStructure,
        config: &RatchetConfig,
    ) -> Result<Self, RatchetError> {
        let version = u8::try_from(structure.session_version)
            .ok()
            .filter(|&v| v == SESSION_VERSION)
            .ok_or_else(|| {
                RatchetError::malformed(format!(
                    "unsupported session version {}",
                    structure.session_version
                ))
            })?;

        let sender = structure
            .sender_chain
            .as_ref()
            .ok_or_else(|| RatchetError::malformed("session has no sender chain"))?;
        let mut secret = fixed::<32>(&sender.ratchet_key_private, "ratchet_key_private")?;
        let sender_chain = SenderChain {
            ratchet_key: RatchetKeyPair::from_secret_bytes(secret),
            chain_key: sender.chain_key.to_chain_key()?,
        };
        secret.zeroize();

        let mut receiver_chains = VecDeque::new();
        for chain in structure.receiver_chains.iter().take(config.max_receiver_chains) {
            receiver_chains.push_back(ReceiverChain {
                ratchet_key: fixed(&chain.ratchet_key, "receiver ratchet_key")?,
                chain_key: chain.chain_key.to_chain_key()?,
            });
        }

        let mut skipped_keys = MessageKeyCache::new(config.max_message_keys);
        for skipped in &structure.skipped_message_keys {
            let ratchet_key: [u8; 32] = fixed(&skipped.ratchet_key, "skipped ratchet_key")?;
            if !receiver_chains.iter().any(|chain| chain.ratchet_key == ratchet_key) {
                continue;
            }
            skipped_keys.put_tagged(ratchet_key, skipped.message_key.to_message_key()?);
        }

        Ok(Self {
            version,
            local_identity: fixed(&structure.local_identity_public, "local_identity_public")?,
            remote_identity: fixed(&structure.remote_identity_public, "remote_identity_public")?,
            local_registration_id: structure.local_registration_id,
            remote_registration_id: structure.remote_registration_id,
            root_key: RootKey::new(fixed(&structure.root_key, "root_key")?),
            sender_chain,
            receiver_chains,
            skipped_keys,
            previous_counter: structure.previous_counter,
            max_skip: config.max_skip,
            max_receiver_chains: config.max_receiver_chains,
        })
    }
}
