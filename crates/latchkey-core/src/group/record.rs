//! Sender key record: every chain one sender has used in one group

use std::collections::VecDeque;

use latchkey_crypto::{open, seal};
use tracing::{debug, warn};

use super::{
    message::{SenderKeyMessage, associated_data, encode_body},
    state::SenderKeyState,
    structure::SenderKeyRecordStructure,
};
use crate::{config::RatchetConfig, error::RatchetError};

/// Sender key states for one `(group, sender)` pair, most recent first.
///
/// Each rotation prepends a state. Once the record is full the oldest state
/// is evicted and messages under its key id fail with `UnknownSenderKey`.
#[derive(Debug, Clone)]
pub struct SenderKeyRecord {
    states: VecDeque<SenderKeyState>,
    max_states: usize,
}

impl SenderKeyRecord {
    /// Empty record.
    pub fn new(config: &RatchetConfig) -> Self {
        Self { states: VecDeque::new(), max_states: config.max_sender_key_states }
    }

    /// Whether the record holds no state.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of retained states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Key ids of the retained states, most recent first.
    pub fn key_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.states.iter().map(SenderKeyState::key_id)
    }

    /// Most recent state.
    pub fn current_state(&self) -> Option<&SenderKeyState> {
        self.states.front()
    }

    /// State for a key id.
    pub fn state_for_key_id(&self, key_id: u32) -> Option<&SenderKeyState> {
        self.states.iter().find(|state| state.key_id() == key_id)
    }

    /// Add a state at the front.
    ///
    /// A state whose key id and signing key are already known is ignored, so
    /// a redelivered distribution cannot rewind the chain. A known key id with
    /// a different signing key replaces the old state.
    ///
    /// Key ids are random, so there is no ordering to compare against. A key
    /// id that is not retained counts as new even if it was evicted earlier:
    /// it goes to the front and the oldest retained state is evicted.
    ///
    /// Returns false if the state was ignored.
    pub fn add_state(&mut self, state: SenderKeyState) -> bool {
        let key_id = state.key_id();

        if let Some(pos) = self.states.iter().position(|s| s.key_id() == key_id) {
            let known = self.states.get(pos).map(|s| s.signing_key().public_bytes());
            if known == Some(state.signing_key().public_bytes()) {
                debug!(key_id, "sender key already known, ignoring");
                return false;
            }
            warn!(key_id, "sender key id reused with a different signing key, replacing");
            self.states.remove(pos);
        }

        self.states.push_front(state);

        while self.states.len() > self.max_states {
            if let Some(evicted) = self.states.pop_back() {
                warn!(key_id = evicted.key_id(), "evicted oldest sender key state");
            }
        }
        true
    }

    /// Replace every state with this one.
    pub fn set_state(&mut self, state: SenderKeyState) {
        self.states.clear();
        self.states.push_front(state);
    }

    /// Encrypt on the current chain.
    ///
    /// The record must hold our own (owned) state at the front.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<SenderKeyMessage, RatchetError> {
        let state = self.states.front_mut().ok_or(RatchetError::NoCurrentState)?;
        let key_id = state.key_id();
        if !state.signing_key().is_owned() {
            return Err(RatchetError::MissingSigningKey { key_id });
        }

        let mut candidate = state.clone();
        let message_key = candidate.next_sending_key()?;
        let iteration = message_key.iteration();

        let ciphertext = seal(&message_key, plaintext, &associated_data(key_id, iteration));
        let body = encode_body(key_id, iteration, &ciphertext);
        let signature = candidate.signing_key().sign(key_id, &body)?;

        *state = candidate;
        Ok(SenderKeyMessage { key_id, iteration, ciphertext, signature })
    }

    /// Verify and decrypt a group message.
    ///
    /// The signature is checked before any key is derived. The matching state
    /// is updated only if decryption succeeds.
    pub fn decrypt(&mut self, message: &SenderKeyMessage) -> Result<Vec<u8>, RatchetError> {
        let key_id = message.key_id;
        let slot = self
            .states
            .iter_mut()
            .find(|state| state.key_id() == key_id)
            .ok_or(RatchetError::UnknownSenderKey { key_id })?;

        slot.signing_key().verify(&message.body(), &message.signature)?;

        let mut candidate = slot.clone();
        let message_key = candidate.resolve_message_key(message.iteration)?;
        let plaintext =
            open(&message_key, &message.ciphertext, &associated_data(key_id, message.iteration))?;

        *slot = candidate;
        Ok(plaintext)
    }

    /// Snapshot for persistence.
    pub fn to_structure(&self) -> SenderKeyRecordStructure {
        SenderKeyRecordStructure {
            sender_key_states: self.states.iter().map(SenderKeyState::to_structure).collect(),
        }
    }

    /// Rebuild a record from its persisted structure.
    pub fn from_structure(
        structure: &SenderKeyRecordStructure,
        config: &RatchetConfig,
    ) -> Result<Self, RatchetError> {
        let states = structure
            .sender_key_states
            .iter()
            .take(config.max_sender_key_states)
            .map(|state| SenderKeyState::from_structure(state, config))
            .collect::<Result<VecDeque<_>, _>>()?;

        Ok(Self { states, max_states: config.max_sender_key_states })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SeededEnv;

    fn sender_and_receiver(
        env: &SeededEnv,
        config: &RatchetConfig,
    ) -> (SenderKeyRecord, SenderKeyRecord) {
        let own = SenderKeyState::generate(env, config);
        let remote = own.distribution().into_state(config).unwrap();

        let mut sender = SenderKeyRecord::new(config);
        sender.set_state(own);
        let mut receiver = SenderKeyRecord::new(config);
        receiver.add_state(remote);
        (sender, receiver)
    }

    #[test]
    fn round_trip() {
        let env = SeededEnv::new(20);
        let config = RatchetConfig::default();
        let (mut sender, mut receiver) = sender_and_receiver(&env, &config);

        let message = sender.encrypt(b"group hello").unwrap();
        assert_eq!(receiver.decrypt(&message).unwrap(), b"group hello");
    }

    #[test]
    fn receiver_cannot_encrypt() {
        let env = SeededEnv::new(21);
        let config = RatchetConfig::default();
        let (_, mut receiver) = sender_and_receiver(&env, &config);

        let before = receiver.to_structure();
        let err = receiver.encrypt(b"x").unwrap_err();
        assert!(matches!(err, RatchetError::MissingSigningKey { .. }));
        assert_eq!(receiver.to_structure(), before);
    }

    #[test]
    fn encrypt_moves_the_chain_forward_only() {
        let env = SeededEnv::new(26);
        let config = RatchetConfig::default();
        let (mut sender, _) = sender_and_receiver(&env, &config);

        let iterations: Vec<u32> =
            (0..4).map(|_| sender.encrypt(b"m").unwrap().iteration).collect();
        assert_eq!(iterations, vec![0, 1, 2, 3]);

        let current = sender.current_state().unwrap();
        assert_eq!(current.chain_key().iteration(), 4);
    }

    #[test]
    fn forged_signature_rejected_without_mutation() {
        let env = SeededEnv::new(22);
        let config = RatchetConfig::default();
        let (mut sender, mut receiver) = sender_and_receiver(&env, &config);

        let message = sender.encrypt(b"m").unwrap();
        let mut forged = message.clone();
        forged.signature[0] ^= 1;

        let before = receiver.to_structure();
        assert_eq!(receiver.decrypt(&forged).unwrap_err(), RatchetError::SignatureInvalid);
        assert_eq!(receiver.to_structure(), before);
        assert_eq!(receiver.decrypt(&message).unwrap(), b"m");
    }

    #[test]
    fn out_of_order_then_replay() {
        let env = SeededEnv::new(23);
        let config = RatchetConfig::default();
        let (mut sender, mut receiver) = sender_and_receiver(&env, &config);

        let m0 = sender.encrypt(b"0").unwrap();
        let m1 = sender.encrypt(b"1").unwrap();
        let m2 = sender.encrypt(b"2").unwrap();

        assert_eq!(receiver.decrypt(&m2).unwrap(), b"2");
        assert_eq!(receiver.decrypt(&m0).unwrap(), b"0");
        assert_eq!(receiver.decrypt(&m1).unwrap(), b"1");

        let err = receiver.decrypt(&m1).unwrap_err();
        assert_eq!(err, RatchetError::DuplicateOrStaleMessage { iteration: 1, current: 3 });
    }

    #[test]
    fn redelivered_distribution_is_ignored() {
        let env = SeededEnv::new(24);
        let config = RatchetConfig::default();
        let own = SenderKeyState::generate(&env, &config);
        let distribution = own.distribution();

        let mut sender = SenderKeyRecord::new(&config);
        sender.set_state(own);
        let mut receiver = SenderKeyRecord::new(&config);
        assert!(receiver.add_state(distribution.clone().into_state(&config).unwrap()));

        let m0 = sender.encrypt(b"0").unwrap();
        receiver.decrypt(&m0).unwrap();

        assert!(!receiver.add_state(distribution.into_state(&config).unwrap()));
        assert_eq!(receiver.len(), 1);
        assert!(matches!(
            receiver.decrypt(&m0).unwrap_err(),
            RatchetError::DuplicateOrStaleMessage { .. }
        ));
    }

    #[test]
    fn oldest_state_evicted() {
        let env = SeededEnv::new(25);
        let config = RatchetConfig { max_sender_key_states: 2, ..RatchetConfig::default() };
        let mut record = SenderKeyRecord::new(&config);

        let ids: Vec<u32> = (0..3)
            .map(|_| {
                let state = SenderKeyState::generate(&env, &config);
                let id = state.key_id();
                record.add_state(state);
                id
            })
            .collect();

        assert_eq!(record.key_ids().collect::<Vec<_>>(), vec![ids[2], ids[1]]);
        assert!(record.state_for_key_id(ids[0]).is_none());
    }

    #[test]
    fn evicted_key_id_redelivered_counts_as_new() {
        let env = SeededEnv::new(27);
        let config = RatchetConfig { max_sender_key_states: 2, ..RatchetConfig::default() };
        let mut record = SenderKeyRecord::new(&config);

        let states: Vec<SenderKeyState> =
            (0..3).map(|_| SenderKeyState::generate(&env, &config)).collect();
        let stale = states[0].distribution();
        for state in states.iter().cloned() {
            record.add_state(state);
        }
        assert!(record.state_for_key_id(stale.key_id).is_none());

        assert!(record.add_state(stale.clone().into_state(&config).unwrap()));
        assert_eq!(
            record.key_ids().collect::<Vec<_>>(),
            vec![stale.key_id, states[2].key_id()]
        );
        assert!(record.state_for_key_id(states[1].key_id()).is_none());
    }
}
