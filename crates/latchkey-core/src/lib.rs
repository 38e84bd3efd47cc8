//! Latchkey core: the ratchet state machines.
//!
//! This crate holds the stateful half of the engine: pairwise Double Ratchet
//! sessions, group sender-key chains, their persisted structures and the
//! store contract through which callers keep them.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────────────────┐
//!                 │   SessionRecord           │  current + archived sessions
//!                 │   └─ SessionState         │  root key, DH ratchet,
//!                 │        sending chain      │  receiving chains,
//!                 │        receiving chains   │  skipped keys
//!                 └───────────────────────────┘
//!                 ┌───────────────────────────┐
//!                 │   SenderKeyRecord         │  most recent first, bounded
//!                 │   └─ SenderKeyState       │  key id, chain key,
//!                 │        signing key        │  signing key, skipped keys
//!                 └───────────────────────────┘
//!                              │ to_structure / from_structure
//!                              ▼
//!                 ┌───────────────────────────┐
//!                 │   KeyStore (caller)       │  load / store structures
//!                 └───────────────────────────┘
//! ```
//!
//! Every state machine here is pure: no I/O and no clock. Randomness comes in
//! through [`env::Environment`] so that tests can replay a run exactly.
//!
//! # Failure Isolation
//!
//! Decryption works on a copy of the affected state and commits only on
//! success. A rejected message (replay, forged header, gap too large, bad MAC)
//! leaves the state exactly as it was, so it never affects later or
//! already-cached messages.

#![forbid(unsafe_code)]

pub mod address;
pub mod config;
pub mod env;
pub mod error;
pub mod group;
mod ratchet;
pub mod session;
pub mod storage;
pub mod structure;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use address::{ProtocolAddress, SenderKeyName};
pub use config::{ConfigError, RatchetConfig};
pub use env::Environment;
pub use error::RatchetError;
pub use group::{
    SenderKeyDistribution, SenderKeyMessage, SenderKeyRecord, SenderKeyState, SenderSigningKey,
};
pub use session::{
    MessageHeader, RatchetKeyPair, SessionMessage, SessionParams, SessionRecord, SessionState,
};
pub use storage::{ChaoticStore, KeyStore, MemoryStore, StorageError};
