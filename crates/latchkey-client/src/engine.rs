//! Engine facade
//!
//! Every call follows the same shape: take the identity's lock, load its
//! record from the store, run the state machine, store the result. Records
//! are never cached between calls, so the store is the single source of truth
//! and a failed store leaves the previous record authoritative.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use latchkey_core::{
    Environment, KeyStore, ProtocolAddress, RatchetConfig, RatchetError, RatchetKeyPair,
    SenderKeyDistribution, SenderKeyMessage, SenderKeyName, SenderKeyRecord, SenderKeyState,
    SessionMessage, SessionParams, SessionRecord, SessionState,
};

use crate::error::EngineError;

/// Ratchet engine over a caller-supplied store.
///
/// Operations on the same identity (remote device or group sender) are
/// serialized; operations on different identities run in parallel.
pub struct Engine<S: KeyStore, E: Environment> {
    store: S,
    env: E,
    config: RatchetConfig,
    locks: Mutex<HashMap<IdentityKey, Arc<Mutex<()>>>>,
}

/// Whose state an operation touches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey {
    Session(ProtocolAddress),
    SenderKey(SenderKeyName),
}

impl<S: KeyStore, E: Environment> Engine<S, E> {
    /// Create an engine, rejecting unusable configuration.
    pub fn new(store: S, env: E, config: RatchetConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { store, env, config, locks: Mutex::new(HashMap::new()) })
    }

    /// Active configuration.
    pub fn config(&self) -> &RatchetConfig {
        &self.config
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of identities with an operation in flight.
    pub fn active_identities(&self) -> usize {
        self.lock_map().len()
    }

    /// Start a session with `address` as the initiator.
    ///
    /// An existing session is archived, not replaced.
    pub fn initiate_session(
        &self,
        address: &ProtocolAddress,
        params: &SessionParams,
        their_ratchet_key: [u8; 32],
    ) -> Result<(), EngineError> {
        self.with_identity(IdentityKey::Session(address.clone()), || {
            let mut record = self
                .load_session_record(address)?
                .unwrap_or_else(|| SessionRecord::new(&self.config));
            let state = SessionState::initiate(&self.env, &self.config, params, their_ratchet_key)?;
            record.promote_state(state);

            self.store.store_session(address, &record.to_structure())?;
            tracing::info!(%address, archived = record.archived_count(), "session initiated");
            Ok(())
        })
    }

    /// Start a session with `address` as the responder.
    ///
    /// `our_ratchet_key` is the key pair whose public half the initiator used.
    pub fn respond_session(
        &self,
        address: &ProtocolAddress,
        params: &SessionParams,
        our_ratchet_key: RatchetKeyPair,
    ) -> Result<(), EngineError> {
        self.with_identity(IdentityKey::Session(address.clone()), || {
            let mut record = self
                .load_session_record(address)?
                .unwrap_or_else(|| SessionRecord::new(&self.config));
            record.promote_state(SessionState::respond(&self.config, params, our_ratchet_key));

            self.store.store_session(address, &record.to_structure())?;
            tracing::info!(%address, archived = record.archived_count(), "session accepted");
            Ok(())
        })
    }

    /// Whether a usable session with `address` exists.
    pub fn has_session(&self, address: &ProtocolAddress) -> Result<bool, EngineError> {
        Ok(self.load_session_record(address)?.is_some_and(|record| record.has_current_session()))
    }

    /// Forget every session with `address`.
    pub fn delete_session(&self, address: &ProtocolAddress) -> Result<(), EngineError> {
        self.with_identity(IdentityKey::Session(address.clone()), || {
            self.store.delete_session(address)?;
            tracing::info!(%address, "session deleted");
            Ok(())
        })
    }

    /// Encrypt a message to `address`. Returns wire bytes.
    pub fn encrypt(
        &self,
        address: &ProtocolAddress,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        self.with_identity(IdentityKey::Session(address.clone()), || {
            let mut record = self
                .load_session_record(address)?
                .filter(SessionRecord::has_current_session)
                .ok_or_else(|| EngineError::NoSession { address: address.clone() })?;

            let message = record.encrypt(plaintext)?;
            self.store.store_session(address, &record.to_structure())?;

            tracing::debug!(
                %address,
                iteration = message.header.iteration,
                "encrypted pairwise message"
            );
            Ok(message.to_bytes())
        })
    }

    /// Decrypt wire bytes from `address`.
    ///
    /// Nothing is stored unless decryption succeeds.
    pub fn decrypt(
        &self,
        address: &ProtocolAddress,
        bytes: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        let message = SessionMessage::from_bytes(bytes).inspect_err(|err| {
            tracing::warn!(%address, error = %err, "rejected pairwise message");
        })?;

        self.with_identity(IdentityKey::Session(address.clone()), || {
            let mut record = self
                .load_session_record(address)?
                .ok_or_else(|| EngineError::NoSession { address: address.clone() })?;

            let plaintext = record.decrypt(&self.env, &message).map_err(|err| {
                tracing::warn!(
                    %address,
                    iteration = message.header.iteration,
                    error = %err,
                    "rejected pairwise message"
                );
                map_session_error(err, address)
            })?;

            self.store.store_session(address, &record.to_structure())?;
            Ok(plaintext)
        })
    }

    /// Our sender key for a group, created on first use.
    ///
    /// Returns the distribution to hand to every group member.
    pub fn create_sender_key(
        &self,
        name: &SenderKeyName,
    ) -> Result<SenderKeyDistribution, EngineError> {
        self.with_identity(IdentityKey::SenderKey(name.clone()), || {
            let mut record = self
                .load_sender_key_record(name)?
                .unwrap_or_else(|| SenderKeyRecord::new(&self.config));

            let owned = record.current_state().filter(|state| state.signing_key().is_owned());
            if let Some(state) = owned {
                return Ok(state.distribution());
            }

            let state = SenderKeyState::generate(&self.env, &self.config);
            let distribution = state.distribution();
            record.set_state(state);

            self.store.store_sender_key(name, &record.to_structure())?;
            tracing::info!(%name, key_id = distribution.key_id, "sender key created");
            Ok(distribution)
        })
    }

    /// Start a fresh chain for our sender key.
    ///
    /// Older chains stay in the record (bounded) but are no longer used for
    /// sending.
    pub fn rotate_sender_key(
        &self,
        name: &SenderKeyName,
    ) -> Result<SenderKeyDistribution, EngineError> {
        self.with_identity(IdentityKey::SenderKey(name.clone()), || {
            let mut record = self
                .load_sender_key_record(name)?
                .unwrap_or_else(|| SenderKeyRecord::new(&self.config));

            let state = SenderKeyState::generate(&self.env, &self.config);
            let distribution = state.distribution();
            record.add_state(state);

            self.store.store_sender_key(name, &record.to_structure())?;
            tracing::info!(
                %name,
                key_id = distribution.key_id,
                retained = record.len(),
                "sender key rotated"
            );
            Ok(distribution)
        })
    }

    /// Accept a sender's distribution.
    ///
    /// Re-processing a distribution whose key id and signing key are already
    /// known changes nothing.
    pub fn process_distribution(
        &self,
        name: &SenderKeyName,
        distribution: &SenderKeyDistribution,
    ) -> Result<(), EngineError> {
        let state = distribution.clone().into_state(&self.config)?;

        self.with_identity(IdentityKey::SenderKey(name.clone()), || {
            let mut record = self
                .load_sender_key_record(name)?
                .unwrap_or_else(|| SenderKeyRecord::new(&self.config));

            if !record.add_state(state) {
                return Ok(());
            }

            self.store.store_sender_key(name, &record.to_structure())?;
            tracing::info!(
                %name,
                key_id = distribution.key_id,
                "sender key distribution processed"
            );
            Ok(())
        })
    }

    /// Encrypt a group message with our sender key. Returns wire bytes.
    pub fn group_encrypt(
        &self,
        name: &SenderKeyName,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        self.with_identity(IdentityKey::SenderKey(name.clone()), || {
            let mut record = self
                .load_sender_key_record(name)?
                .filter(|record| !record.is_empty())
                .ok_or_else(|| EngineError::NoSenderKey { name: name.clone() })?;

            let message = record.encrypt(plaintext)?;
            self.store.store_sender_key(name, &record.to_structure())?;

            tracing::debug!(
                %name,
                key_id = message.key_id,
                iteration = message.iteration,
                "encrypted group message"
            );
            Ok(message.to_bytes())
        })
    }

    /// Verify and decrypt a group message from the sender `name`.
    ///
    /// Nothing is stored unless decryption succeeds.
    pub fn group_decrypt(
        &self,
        name: &SenderKeyName,
        bytes: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        let message = SenderKeyMessage::from_bytes(bytes).inspect_err(|err| {
            tracing::warn!(%name, error = %err, "rejected group message");
        })?;

        self.with_identity(IdentityKey::SenderKey(name.clone()), || {
            // No record yet means the sender's distribution has not arrived.
            let mut record = self
                .load_sender_key_record(name)?
                .ok_or(RatchetError::UnknownSenderKey { key_id: message.key_id })?;

            let plaintext = record.decrypt(&message).inspect_err(|err| {
                tracing::warn!(
                    %name,
                    key_id = message.key_id,
                    iteration = message.iteration,
                    error = %err,
                    "rejected group message"
                );
            })?;

            self.store.store_sender_key(name, &record.to_structure())?;
            Ok(plaintext)
        })
    }

    fn load_session_record(
        &self,
        address: &ProtocolAddress,
    ) -> Result<Option<SessionRecord>, EngineError> {
        let Some(structure) = self.store.load_session(address)? else {
            return Ok(None);
        };
        Ok(Some(SessionRecord::from_structure(&structure, &self.config)?))
    }

    fn load_sender_key_record(
        &self,
        name: &SenderKeyName,
    ) -> Result<Option<SenderKeyRecord>, EngineError> {
        let Some(structure) = self.store.load_sender_key(name)? else {
            return Ok(None);
        };
        Ok(Some(SenderKeyRecord::from_structure(&structure, &self.config)?))
    }

    /// Run `op` holding the lock for `key`.
    ///
    /// The last caller to release an identity removes its entry, so the map
    /// only holds identities with an operation in flight.
    fn with_identity<T>(
        &self,
        key: IdentityKey,
        op: impl FnOnce() -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let lock = Arc::clone(self.lock_map().entry(key.clone()).or_default());

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            op()
        };

        // Clones are only taken and dropped under the map lock, so a count of
        // one means nobody else holds or waits on this identity.
        let mut locks = self.lock_map();
        drop(lock);
        if let Entry::Occupied(entry) = locks.entry(key)
            && Arc::strong_count(entry.get()) == 1
        {
            entry.remove();
        }
        result
    }

    // The map is only touched by single inserts and removes; a poisoned map is
    // still consistent.
    fn lock_map(&self) -> MutexGuard<'_, HashMap<IdentityKey, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn map_session_error(err: RatchetError, address: &ProtocolAddress) -> EngineError {
    match err {
        RatchetError::NoCurrentState => EngineError::NoSession { address: address.clone() },
        other => EngineError::Ratchet(other),
    }
}
