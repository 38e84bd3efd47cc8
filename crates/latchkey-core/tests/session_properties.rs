//! Property-based tests for pairwise sessions
//!
//! 1. **Round-trip**: every message decrypts to its plaintext
//! 2. **Any order**: a shuffled batch within the skip bound decrypts exactly
//!    once per message
//! 3. **Replay**: a second delivery is always `DuplicateOrStaleMessage`
//! 4. **No mutation on failure**: a rejected message leaves the persisted
//!    structure byte-identical

use latchkey_core::{
    RatchetConfig, RatchetError, RatchetKeyPair, SessionParams, SessionState, testing::SeededEnv,
};
use proptest::prelude::*;

fn params(local: u8, remote: u8) -> SessionParams {
    SessionParams {
        shared_secret: b"handshake output shared by both".to_vec(),
        local_identity: [local; 32],
        remote_identity: [remote; 32],
        local_registration_id: u32::from(local),
        remote_registration_id: u32::from(remote),
    }
}

fn session_pair(seed: u64, config: &RatchetConfig) -> (SeededEnv, SessionState, SessionState) {
    let env = SeededEnv::new(seed);
    let bob_ratchet = RatchetKeyPair::generate(&env);
    let bob_public = bob_ratchet.public_key();
    let bob = SessionState::respond(config, &params(2, 1), bob_ratchet);
    let alice = SessionState::initiate(&env, config, &params(1, 2), bob_public).unwrap();
    (env, alice, bob)
}

#[test]
fn out_of_order_three_one_two() {
    let config = RatchetConfig::default();
    let (env, mut alice, mut bob) = session_pair(1, &config);

    let m1 = alice.encrypt(b"one").unwrap();
    let m2 = alice.encrypt(b"two").unwrap();
    let m3 = alice.encrypt(b"three").unwrap();

    assert_eq!(bob.decrypt(&env, &m3).unwrap(), b"three");
    assert_eq!(bob.decrypt(&env, &m1).unwrap(), b"one");
    assert_eq!(bob.decrypt(&env, &m2).unwrap(), b"two");
    assert_eq!(bob.skipped_key_count(), 0);

    for message in [&m1, &m2, &m3] {
        assert!(matches!(
            bob.decrypt(&env, message).unwrap_err(),
            RatchetError::DuplicateOrStaleMessage { .. }
        ));
    }
}

#[test]
fn gap_beyond_bound_rejected_without_mutation() {
    let config = RatchetConfig { max_skip: 10, ..RatchetConfig::default() };
    let (env, mut alice, mut bob) = session_pair(2, &config);

    let first = alice.encrypt(b"first").unwrap();
    bob.decrypt(&env, &first).unwrap();

    let mut far = None;
    for i in 0..12u8 {
        far = Some(alice.encrypt(&[i]).unwrap());
    }
    let far = far.unwrap();

    let before = bob.to_structure();
    let err = bob.decrypt(&env, &far).unwrap_err();
    assert_eq!(err, RatchetError::ExcessiveMessageGap { current: 1, requested: 12, max_skip: 10 });
    assert!(!err.is_fatal());
    assert_eq!(bob.to_structure(), before);
}

#[test]
fn forged_ratchet_key_leaves_session_intact() {
    let config = RatchetConfig::default();
    let (env, mut alice, mut bob) = session_pair(3, &config);

    let genuine = alice.encrypt(b"genuine").unwrap();
    let mut forged = genuine.clone();
    forged.header.ratchet_key = RatchetKeyPair::generate(&SeededEnv::new(99)).public_key();

    let before = bob.to_structure();
    assert!(bob.decrypt(&env, &forged).is_err());
    assert_eq!(bob.to_structure(), before);
    assert_eq!(bob.decrypt(&env, &genuine).unwrap(), b"genuine");
}

#[test]
fn long_conversation_stays_in_sync() {
    let config = RatchetConfig::default();
    let (env, mut alice, mut bob) = session_pair(4, &config);

    for round in 0..50u32 {
        let text = round.to_be_bytes();
        if round % 3 == 0 {
            let m = bob.encrypt(&text).unwrap();
            assert_eq!(alice.decrypt(&env, &m).unwrap(), text);
        } else {
            let m = alice.encrypt(&text).unwrap();
            assert_eq!(bob.decrypt(&env, &m).unwrap(), text);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_round_trip(
        plaintexts in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..256), 1..10),
        seed in any::<u64>(),
    ) {
        let config = RatchetConfig::default();
        let (env, mut alice, mut bob) = session_pair(seed, &config);

        for plaintext in &plaintexts {
            let message = alice.encrypt(plaintext).unwrap();
            let decrypted = bob.decrypt(&env, &message).unwrap();
            prop_assert_eq!(&decrypted, plaintext);
        }
    }

    #[test]
    fn prop_any_order_decrypts_exactly_once(
        order in Just((0..20usize).collect::<Vec<_>>()).prop_shuffle(),
        seed in any::<u64>(),
    ) {
        let config = RatchetConfig::default();
        let (env, mut alice, mut bob) = session_pair(seed, &config);

        let messages: Vec<_> =
            (0..20u8).map(|i| alice.encrypt(&[i]).unwrap()).collect();

        for &index in &order {
            let plaintext = bob.decrypt(&env, &messages[index]).unwrap();
            prop_assert_eq!(plaintext, vec![index as u8]);
        }
        for &index in &order {
            let err = bob.decrypt(&env, &messages[index]).unwrap_err();
            let is_duplicate = matches!(err, RatchetError::DuplicateOrStaleMessage { .. });
            prop_assert!(is_duplicate);
        }
        prop_assert_eq!(bob.skipped_key_count(), 0);
    }

    #[test]
    fn prop_tampering_never_mutates(
        flip_at in 0usize..64,
        seed in any::<u64>(),
    ) {
        let config = RatchetConfig::default();
        let (env, mut alice, mut bob) = session_pair(seed, &config);

        let message = alice.encrypt(b"an ordinary message body").unwrap();
        let mut bytes = message.to_bytes();
        let index = flip_at % bytes.len();
        bytes[index] ^= 0x01;

        let before = bob.to_structure();
        if let Ok(parsed) = latchkey_core::SessionMessage::from_bytes(&bytes) {
            prop_assert!(bob.decrypt(&env, &parsed).is_err());
        }
        prop_assert_eq!(bob.to_structure(), before);

        let decrypted = bob.decrypt(&env, &message).unwrap();
        prop_assert_eq!(decrypted, b"an ordinary message body".to_vec());
    }
}
