//! Fuzz target for every decoder that sees untrusted bytes
//!
//! Wire messages come from the network; persisted structures come from a
//! store that may be corrupt. Neither may panic.
//!
//! # Invariants
//!
//! - Decoders return `Ok` or `Err`, never panic
//! - A decoded session or group message re-encodes to the input bytes
//! - A decoded structure loads into state or fails as malformed

#![no_main]

use latchkey_core::{
    RatchetConfig, SenderKeyDistribution, SenderKeyMessage, SenderKeyRecord, SessionMessage,
    SessionRecord, group::SenderKeyRecordStructure, session::SessionRecordStructure,
    structure::from_bytes,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = RatchetConfig::default();

    if let Ok(message) = SessionMessage::from_bytes(data) {
        assert_eq!(message.to_bytes(), data);
    }

    if let Ok(message) = SenderKeyMessage::from_bytes(data) {
        assert_eq!(message.to_bytes(), data);
    }

    if let Ok(distribution) = SenderKeyDistribution::from_bytes(data) {
        let _ = distribution.into_state(&config);
    }

    if let Ok(structure) = from_bytes::<SessionRecordStructure>(data) {
        if let Err(err) = SessionRecord::from_structure(&structure, &config) {
            assert!(err.is_fatal(), "{err}");
        }
    }

    if let Ok(structure) = from_bytes::<SenderKeyRecordStructure>(data) {
        if let Err(err) = SenderKeyRecord::from_structure(&structure, &config) {
            assert!(err.is_fatal(), "{err}");
        }
    }
});
