//! Pairwise sessions
//!
//! A session combines a DH ratchet (new X25519 key pair whenever the peer
//! shows a new ratchet key) with symmetric chains for sending and receiving.
//!
//! ```text
//!   root ──DH──► root' ──DH──► root'' ...
//!                  │              │
//!               receiving      sending
//!                chain          chain
//!                  │              │
//!               msg keys       msg keys
//! ```

mod keys;
mod message;
mod record;
mod state;
pub mod structure;

pub use keys::RatchetKeyPair;
pub use message::{HEADER_SIZE, MessageHeader, SESSION_VERSION, SessionMessage};
pub use record::SessionRecord;
pub use state::{SessionParams, SessionState};
pub use structure::{
    ReceiverChainStructure, SenderChainStructure, SessionRecordStructure, SessionStructure,
    SkippedKeyStructure,
};
