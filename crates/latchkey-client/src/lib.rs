//! Latchkey client engine
//!
//! The facade applications talk to. It owns nothing but configuration and a
//! handle to the caller's store; all ratchet state lives in the store and is
//! loaded per call.
//!
//! # Components
//!
//! - [`Engine`]: pairwise and group encrypt/decrypt, session setup, sender key
//!   creation, rotation and distribution
//! - [`SystemEnv`]: production randomness from the OS
//! - [`EngineError`]: typed failures, with [`EngineError::is_fatal`] telling
//!   corrupt state apart from a single bad message
//!
//! # Concurrency
//!
//! Calls for the same remote device or group sender are serialized by a
//! per-identity lock; calls for different identities do not contend. The
//! engine does no I/O of its own.

#![forbid(unsafe_code)]

mod engine;
mod error;
mod system_env;

pub use engine::Engine;
pub use error::EngineError;
pub use latchkey_core::{
    Environment, KeyStore, MemoryStore, ProtocolAddress, RatchetConfig, RatchetError,
    RatchetKeyPair, SenderKeyDistribution, SenderKeyName, SessionParams,
};
pub use system_env::SystemEnv;
