//! Fuzz target for pairwise delivery under an adversarial network
//!
//! Alice sends a batch of messages; the fuzzer picks the delivery order,
//! duplicates and bit flips.
//!
//! # Invariants
//!
//! - Each genuine message decrypts at most once, to its own plaintext
//! - A rejected delivery leaves Bob's state unchanged
//! - After the batch, a fresh message still decrypts

#![no_main]

use arbitrary::Arbitrary;
use latchkey_core::{
    RatchetConfig, RatchetKeyPair, SessionMessage, SessionParams, SessionState,
    testing::SeededEnv,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: u64,
    message_count: u8,
    deliveries: Vec<Delivery>,
}

#[derive(Debug, Arbitrary)]
struct Delivery {
    index: u8,
    flip: Option<(u16, u8)>,
}

fn params(local: u8, remote: u8) -> SessionParams {
    SessionParams {
        shared_secret: vec![7; 32],
        local_identity: [local; 32],
        remote_identity: [remote; 32],
        local_registration_id: 0,
        remote_registration_id: 0,
    }
}

fuzz_target!(|scenario: Scenario| {
    let env = SeededEnv::new(scenario.seed);
    let config = RatchetConfig { max_skip: 64, ..RatchetConfig::default() };

    let bob_ratchet = RatchetKeyPair::generate(&env);
    let bob_public = bob_ratchet.public_key();
    let mut bob = SessionState::respond(&config, &params(2, 1), bob_ratchet);
    let Ok(mut alice) = SessionState::initiate(&env, &config, &params(1, 2), bob_public) else {
        return;
    };

    let count = usize::from(scenario.message_count % 100) + 1;
    let mut wires = Vec::with_capacity(count);
    for i in 0..count {
        let Ok(message) = alice.encrypt(&[i as u8]) else { return };
        wires.push(message.to_bytes());
    }

    let mut delivered = vec![false; count];
    for delivery in scenario.deliveries {
        let index = usize::from(delivery.index) % count;
        let mut bytes = wires[index].clone();
        if let Some((position, mask)) = delivery.flip {
            let position = usize::from(position) % bytes.len();
            bytes[position] ^= mask;
        }

        let Ok(message) = SessionMessage::from_bytes(&bytes) else { continue };
        let before = bob.to_structure();
        match bob.decrypt(&env, &message) {
            Ok(plaintext) => {
                assert_eq!(bytes, wires[index], "tampered message accepted");
                assert!(!delivered[index], "message {index} decrypted twice");
                assert_eq!(plaintext, vec![index as u8]);
                delivered[index] = true;
            },
            Err(_) => assert_eq!(bob.to_structure(), before),
        }
    }

    if let Ok(message) = alice.encrypt(b"after") {
        if let Ok(plaintext) = bob.decrypt(&env, &message) {
            assert_eq!(plaintext, b"after");
        }
    }
});
