//! End-to-end engine tests
//!
//! Two or more engines, each with its own store, exchanging wire bytes the
//! way real devices would.

use latchkey_client::{
    Engine, EngineError, MemoryStore, ProtocolAddress, RatchetConfig, RatchetError,
    RatchetKeyPair, SenderKeyDistribution, SenderKeyName, SessionParams,
};
use latchkey_core::testing::SeededEnv;

type TestEngine = Engine<MemoryStore, SeededEnv>;

struct Device {
    engine: TestEngine,
    address: ProtocolAddress,
    identity: [u8; 32],
}

impl Device {
    fn new(name: &str, seed: u64, config: RatchetConfig) -> Self {
        let engine = Engine::new(MemoryStore::new(), SeededEnv::new(seed), config).unwrap();
        let identity = [seed as u8; 32];
        Self { engine, address: ProtocolAddress::new(name, 1), identity }
    }

    fn params(&self, peer: &Device, shared_secret: &[u8]) -> SessionParams {
        SessionParams {
            shared_secret: shared_secret.to_vec(),
            local_identity: self.identity,
            remote_identity: peer.identity,
            local_registration_id: 1,
            remote_registration_id: 1,
        }
    }
}

/// Bob responds with a fresh ratchet key, Alice initiates against it.
fn connect(alice: &Device, bob: &Device, shared_secret: &[u8], seed: u64) {
    let bob_ratchet = RatchetKeyPair::generate(&SeededEnv::new(seed));
    let bob_public = bob_ratchet.public_key();

    bob.engine
        .respond_session(&alice.address, &bob.params(alice, shared_secret), bob_ratchet)
        .unwrap();
    alice
        .engine
        .initiate_session(&bob.address, &alice.params(bob, shared_secret), bob_public)
        .unwrap();
}

fn pair(config: RatchetConfig) -> (Device, Device) {
    let alice = Device::new("alice", 1, config.clone());
    let bob = Device::new("bob", 2, config);
    connect(&alice, &bob, b"first handshake secret", 100);
    (alice, bob)
}

#[test]
fn pairwise_round_trip_both_directions() {
    let (alice, bob) = pair(RatchetConfig::default());

    let wire = alice.engine.encrypt(&bob.address, b"hi bob").unwrap();
    assert_eq!(bob.engine.decrypt(&alice.address, &wire).unwrap(), b"hi bob");

    let reply = bob.engine.encrypt(&alice.address, b"hi alice").unwrap();
    assert_eq!(alice.engine.decrypt(&bob.address, &reply).unwrap(), b"hi alice");
}

#[test]
fn out_of_order_delivery_decrypts_each_once() {
    let (alice, bob) = pair(RatchetConfig::default());

    let m1 = alice.engine.encrypt(&bob.address, b"1").unwrap();
    let m2 = alice.engine.encrypt(&bob.address, b"2").unwrap();
    let m3 = alice.engine.encrypt(&bob.address, b"3").unwrap();

    assert_eq!(bob.engine.decrypt(&alice.address, &m3).unwrap(), b"3");
    assert_eq!(bob.engine.decrypt(&alice.address, &m1).unwrap(), b"1");
    assert_eq!(bob.engine.decrypt(&alice.address, &m2).unwrap(), b"2");

    let replay = bob.engine.decrypt(&alice.address, &m2).unwrap_err();
    assert!(matches!(replay, EngineError::Ratchet(RatchetError::DuplicateOrStaleMessage { .. })));
    assert!(!replay.is_fatal());
}

#[test]
fn rejected_message_does_not_touch_store() {
    let config = RatchetConfig { max_skip: 3, ..RatchetConfig::default() };
    let (alice, bob) = pair(config);

    let first = alice.engine.encrypt(&bob.address, b"first").unwrap();
    bob.engine.decrypt(&alice.address, &first).unwrap();
    let stored = bob.engine.store().raw_session(&alice.address).unwrap();

    let mut last = Vec::new();
    for i in 0..5u8 {
        last = alice.engine.encrypt(&bob.address, &[i]).unwrap();
    }
    let err = bob.engine.decrypt(&alice.address, &last).unwrap_err();
    assert!(matches!(err, EngineError::Ratchet(RatchetError::ExcessiveMessageGap { .. })));
    assert_eq!(bob.engine.store().raw_session(&alice.address).unwrap(), stored);

    let mut tampered = first.clone();
    let end = tampered.len() - 1;
    tampered[end] ^= 0xFF;
    assert!(bob.engine.decrypt(&alice.address, &tampered).is_err());
    assert_eq!(bob.engine.store().raw_session(&alice.address).unwrap(), stored);
}

#[test]
fn garbage_bytes_are_invalid_header() {
    let (alice, bob) = pair(RatchetConfig::default());
    let err = bob.engine.decrypt(&alice.address, b"definitely not a message").unwrap_err();
    assert!(matches!(err, EngineError::Ratchet(RatchetError::InvalidHeader { .. })));
}

#[test]
fn rehandshake_keeps_old_session_for_in_flight_messages() {
    let (alice, bob) = pair(RatchetConfig::default());

    let in_flight = alice.engine.encrypt(&bob.address, b"sent on old session").unwrap();

    connect(&alice, &bob, b"second handshake secret", 200);
    let fresh = alice.engine.encrypt(&bob.address, b"sent on new session").unwrap();

    assert_eq!(bob.engine.decrypt(&alice.address, &fresh).unwrap(), b"sent on new session");
    assert_eq!(bob.engine.decrypt(&alice.address, &in_flight).unwrap(), b"sent on old session");
}

#[test]
fn deleted_session_is_gone() {
    let (alice, bob) = pair(RatchetConfig::default());
    assert!(alice.engine.has_session(&bob.address).unwrap());

    alice.engine.delete_session(&bob.address).unwrap();
    assert!(!alice.engine.has_session(&bob.address).unwrap());
    assert!(matches!(
        alice.engine.encrypt(&bob.address, b"x").unwrap_err(),
        EngineError::NoSession { .. }
    ));
}

#[test]
fn corrupt_stored_session_is_fatal() {
    let (alice, bob) = pair(RatchetConfig::default());
    alice.engine.store().insert_raw_session(bob.address.clone(), vec![0xA1, 0x00]);

    let err = alice.engine.encrypt(&bob.address, b"x").unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn group_messages_reach_every_member() {
    let config = RatchetConfig::default();
    let alice = Device::new("alice", 11, config.clone());
    let bob = Device::new("bob", 12, config.clone());
    let carol = Device::new("carol", 13, config);

    let name = SenderKeyName::new("family", alice.address.clone());
    let distribution = alice.engine.create_sender_key(&name).unwrap();

    // Distributions travel over pairwise sessions in practice
    let wire = distribution.to_bytes().unwrap();
    for member in [&bob, &carol] {
        let received = SenderKeyDistribution::from_bytes(&wire).unwrap();
        member.engine.process_distribution(&name, &received).unwrap();
    }

    let message = alice.engine.group_encrypt(&name, b"dinner at 7").unwrap();
    assert_eq!(bob.engine.group_decrypt(&name, &message).unwrap(), b"dinner at 7");
    assert_eq!(carol.engine.group_decrypt(&name, &message).unwrap(), b"dinner at 7");
}

#[test]
fn group_rotation_evicts_oldest() {
    let config = RatchetConfig { max_sender_key_states: 2, ..RatchetConfig::default() };
    let alice = Device::new("alice", 21, config.clone());
    let bob = Device::new("bob", 22, config);
    let name = SenderKeyName::new("team", alice.address.clone());

    let mut messages = Vec::new();
    let first = alice.engine.create_sender_key(&name).unwrap();
    bob.engine.process_distribution(&name, &first).unwrap();
    messages.push((first.key_id, alice.engine.group_encrypt(&name, b"gen 0").unwrap()));

    for generation in 1..3u8 {
        let rotated = alice.engine.rotate_sender_key(&name).unwrap();
        bob.engine.process_distribution(&name, &rotated).unwrap();
        let text = format!("gen {generation}");
        let message = alice.engine.group_encrypt(&name, text.as_bytes()).unwrap();
        messages.push((rotated.key_id, message));
    }

    let (evicted, oldest) = &messages[0];
    assert_eq!(
        bob.engine.group_decrypt(&name, oldest).unwrap_err(),
        EngineError::Ratchet(RatchetError::UnknownSenderKey { key_id: *evicted })
    );
    assert_eq!(bob.engine.group_decrypt(&name, &messages[1].1).unwrap(), b"gen 1");
    assert_eq!(bob.engine.group_decrypt(&name, &messages[2].1).unwrap(), b"gen 2");
}

#[test]
fn redelivered_distribution_cannot_reopen_replay_window() {
    let config = RatchetConfig::default();
    let alice = Device::new("alice", 31, config.clone());
    let bob = Device::new("bob", 32, config);
    let name = SenderKeyName::new("g", alice.address.clone());

    let distribution = alice.engine.create_sender_key(&name).unwrap();
    bob.engine.process_distribution(&name, &distribution).unwrap();

    let message = alice.engine.group_encrypt(&name, b"once").unwrap();
    assert_eq!(bob.engine.group_decrypt(&name, &message).unwrap(), b"once");

    bob.engine.process_distribution(&name, &distribution).unwrap();
    assert!(matches!(
        bob.engine.group_decrypt(&name, &message).unwrap_err(),
        EngineError::Ratchet(RatchetError::DuplicateOrStaleMessage { .. })
    ));
}

#[test]
fn group_decrypt_without_distribution() {
    let bob = Device::new("bob", 41, RatchetConfig::default());
    let alice = Device::new("alice", 42, RatchetConfig::default());
    let name = SenderKeyName::new("g", alice.address.clone());
    let distribution = alice.engine.create_sender_key(&name).unwrap();

    let message = alice.engine.group_encrypt(&name, b"x").unwrap();
    let err = bob.engine.group_decrypt(&name, &message).unwrap_err();
    assert_eq!(
        err,
        EngineError::Ratchet(RatchetError::UnknownSenderKey { key_id: distribution.key_id })
    );
    assert!(!err.is_fatal());
    assert_eq!(bob.engine.store().sender_key_count(), 0);

    bob.engine.process_distribution(&name, &distribution).unwrap();
    assert_eq!(bob.engine.group_decrypt(&name, &message).unwrap(), b"x");
}

#[test]
fn unknown_senders_leave_no_engine_state() {
    let (alice, bob) = pair(RatchetConfig::default());
    let carol = Device::new("carol", 43, RatchetConfig::default());
    let wire = alice.engine.encrypt(&bob.address, b"not for carol").unwrap();
    let group_wire = {
        let name = SenderKeyName::new("g", alice.address.clone());
        alice.engine.create_sender_key(&name).unwrap();
        alice.engine.group_encrypt(&name, b"x").unwrap()
    };

    for n in 0..2_000u32 {
        let stranger = ProtocolAddress::new(format!("stranger{n}"), n);
        assert_eq!(
            carol.engine.decrypt(&stranger, &wire).unwrap_err(),
            EngineError::NoSession { address: stranger.clone() }
        );

        let name = SenderKeyName::new("g", stranger);
        assert!(matches!(
            carol.engine.group_decrypt(&name, &group_wire).unwrap_err(),
            EngineError::Ratchet(RatchetError::UnknownSenderKey { .. })
        ));
    }

    assert_eq!(carol.engine.active_identities(), 0);
    assert_eq!(carol.engine.store().session_count(), 0);
    assert_eq!(carol.engine.store().sender_key_count(), 0);
}

#[test]
fn receiver_cannot_send_on_remote_sender_key() {
    let bob = Device::new("bob", 51, RatchetConfig::default());
    let alice = Device::new("alice", 52, RatchetConfig::default());
    let name = SenderKeyName::new("g", alice.address.clone());

    let distribution = alice.engine.create_sender_key(&name).unwrap();
    bob.engine.process_distribution(&name, &distribution).unwrap();

    assert!(matches!(
        bob.engine.group_encrypt(&name, b"forged").unwrap_err(),
        EngineError::Ratchet(RatchetError::MissingSigningKey { .. })
    ));
}

#[test]
fn concurrent_identities_do_not_interfere() {
    let config = RatchetConfig::default();
    let hub = Device::new("hub", 61, config.clone());
    let peers: Vec<Device> =
        (0..4).map(|i| Device::new(&format!("peer{i}"), 70 + i, config.clone())).collect();
    for (i, peer) in peers.iter().enumerate() {
        connect(peer, &hub, format!("secret {i}").as_bytes(), 300 + i as u64);
    }

    let outgoing: Vec<Vec<Vec<u8>>> = peers
        .iter()
        .map(|peer| {
            (0..20u8).map(|n| peer.engine.encrypt(&hub.address, &[n]).unwrap()).collect()
        })
        .collect();

    std::thread::scope(|scope| {
        for (peer, messages) in peers.iter().zip(&outgoing) {
            let hub = &hub;
            scope.spawn(move || {
                for (n, wire) in messages.iter().enumerate() {
                    let plaintext = hub.engine.decrypt(&peer.address, wire).unwrap();
                    assert_eq!(plaintext, vec![n as u8]);
                }
            });
        }
    });
    assert_eq!(hub.engine.active_identities(), 0);
}

#[test]
fn concurrent_same_identity_is_serialized() {
    let (alice, bob) = pair(RatchetConfig::default());
    let messages: Vec<Vec<u8>> =
        (0..40u8).map(|n| alice.engine.encrypt(&bob.address, &[n]).unwrap()).collect();

    let decrypted = std::sync::atomic::AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for chunk in messages.chunks(10) {
            let bob = &bob;
            let alice_address = &alice.address;
            let decrypted = &decrypted;
            scope.spawn(move || {
                for wire in chunk {
                    bob.engine.decrypt(alice_address, wire).unwrap();
                    decrypted.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(decrypted.into_inner(), 40);
    assert_eq!(bob.engine.active_identities(), 0);
    for wire in &messages {
        assert!(bob.engine.decrypt(&alice.address, wire).is_err());
    }
}
