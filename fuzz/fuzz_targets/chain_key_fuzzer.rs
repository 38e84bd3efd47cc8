//! Fuzz target for chain key advancement and the skipped key cache
//!
//! # Invariants
//!
//! - Iteration strictly increases by one per advance
//! - Fast-forwarding through `next()` and `advance()` yields the same keys
//! - A key taken from the cache is gone afterwards
//! - The cache never exceeds its capacity

#![no_main]

use arbitrary::Arbitrary;
use latchkey_crypto::{ChainKey, MessageKeyCache, open, seal};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Scenario {
    seed: [u8; 32],
    start: u32,
    capacity: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Arbitrary)]
enum Operation {
    Advance,
    /// Derive and cache `count` keys ahead
    Skip { count: u8 },
    Take { iteration_offset: u8 },
    Seal { plaintext: Vec<u8>, aad: Vec<u8> },
}

fuzz_target!(|scenario: Scenario| {
    let mut chain = ChainKey::new(scenario.seed, scenario.start);
    let capacity = usize::from(scenario.capacity);
    let mut cache = MessageKeyCache::new(capacity);

    for operation in scenario.operations {
        match operation {
            Operation::Advance => {
                let before = chain.iteration();
                let expected = chain.next().ok();
                match chain.advance() {
                    Ok(key) => {
                        assert_eq!(key.iteration(), before);
                        assert_eq!(Some(chain.iteration()), expected.map(|c| c.iteration()));
                    },
                    // Only at the end of the iteration space
                    Err(_) => assert_eq!(before, u32::MAX),
                }
            },
            Operation::Skip { count } => {
                for _ in 0..count {
                    let Ok(key) = chain.advance() else { break };
                    cache.put(key);
                }
                assert!(cache.len() <= capacity);
            },
            Operation::Take { iteration_offset } => {
                let iteration = chain.iteration().saturating_sub(u32::from(iteration_offset));
                if cache.take(iteration).is_some() {
                    assert!(!cache.contains(iteration));
                }
            },
            Operation::Seal { plaintext, aad } => {
                let key = chain.message_key();
                let sealed = seal(&key, &plaintext, &aad);
                assert_eq!(open(&key, &sealed, &aad).ok(), Some(plaintext));
            },
        }
    }
});
