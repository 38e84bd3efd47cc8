//! Group messaging with sender keys
//!
//! Each sender keeps one symmetric chain per group and hands its current
//! chain key plus a signing public key to every member once. After that a
//! group message costs one encryption and one signature regardless of group
//! size.
//!
//! Rotation (membership change, suspected compromise) starts a fresh chain
//! under a new key id. Recipients keep a bounded number of older chains so
//! in-flight messages still decrypt.

mod message;
mod record;
mod signing;
mod state;
pub mod structure;

pub use message::{SENDER_KEY_VERSION, SenderKeyDistribution, SenderKeyMessage};
pub use record::SenderKeyRecord;
pub use signing::SenderSigningKey;
pub use state::SenderKeyState;
pub use structure::{SenderKeyRecordStructure, SenderKeyStateStructure, SenderSigningKeyStructure};
