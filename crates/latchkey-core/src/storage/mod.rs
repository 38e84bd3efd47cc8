//! Storage contract for ratchet state
//!
//! The engine loads a record, works on it in memory and stores the result.
//! The trait is synchronous; it is called while the per-identity lock is
//! held, so implementations see at most one writer per identity at a time.

mod chaotic;
mod error;
mod memory;

pub use chaotic::ChaoticStore;
pub use error::StorageError;
pub use memory::MemoryStore;

use crate::{
    address::{ProtocolAddress, SenderKeyName},
    group::SenderKeyRecordStructure,
    session::SessionRecordStructure,
};

/// Persistence for session and sender key records
///
/// Must be Clone (shared between engine handles), Send + Sync (engines are
/// used from many threads) and synchronous. Implementations typically share
/// internal state via Arc, so clones see the same records.
///
/// # Invariants
///
/// - Read-your-writes per identity: a `load_*` after a successful `store_*`
///   for the same key returns what was stored
/// - A failed `store_*` leaves the previously stored record in place
pub trait KeyStore: Clone + Send + Sync + 'static {
    /// Session record for a remote device. `None` if never stored.
    fn load_session(
        &self,
        address: &ProtocolAddress,
    ) -> Result<Option<SessionRecordStructure>, StorageError>;

    /// Store a session record, replacing any previous one.
    fn store_session(
        &self,
        address: &ProtocolAddress,
        record: &SessionRecordStructure,
    ) -> Result<(), StorageError>;

    /// Remove a session record. Removing an absent record is not an error.
    fn delete_session(&self, address: &ProtocolAddress) -> Result<(), StorageError>;

    /// Sender key record for a group sender. `None` if never stored.
    fn load_sender_key(
        &self,
        name: &SenderKeyName,
    ) -> Result<Option<SenderKeyRecordStructure>, StorageError>;

    /// Store a sender key record, replacing any previous one.
    fn store_sender_key(
        &self,
        name: &SenderKeyName,
        record: &SenderKeyRecordStructure,
    ) -> Result<(), StorageError>;
}
