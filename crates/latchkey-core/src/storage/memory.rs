//! In-memory key store

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{KeyStore, StorageError};
use crate::{
    address::{ProtocolAddress, SenderKeyName},
    group::SenderKeyRecordStructure,
    session::SessionRecordStructure,
    structure::{from_bytes, to_bytes},
};

/// In-memory store for tests, simulations and short-lived clients
///
/// Records are kept CBOR-encoded, exactly as a persistent store would hold
/// them, so every load goes through the same decoding path. Clones share the
/// same maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    sessions: HashMap<ProtocolAddress, Vec<u8>>,
    sender_keys: HashMap<SenderKeyName, Vec<u8>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored session records.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Number of stored sender key records.
    pub fn sender_key_count(&self) -> usize {
        self.lock().sender_keys.len()
    }

    /// Raw encoded session record, as persisted.
    pub fn raw_session(&self, address: &ProtocolAddress) -> Option<Vec<u8>> {
        self.lock().sessions.get(address).cloned()
    }

    /// Overwrite a session record with arbitrary bytes.
    ///
    /// Lets tests plant records written by older versions, or corrupt ones.
    pub fn insert_raw_session(&self, address: ProtocolAddress, bytes: Vec<u8>) {
        self.lock().sessions.insert(address, bytes);
    }

    // Every mutation is a single insert or remove; a poisoned map is still
    // consistent.
    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyStore for MemoryStore {
    fn load_session(
        &self,
        address: &ProtocolAddress,
    ) -> Result<Option<SessionRecordStructure>, StorageError> {
        self.lock().sessions.get(address).map(|bytes| from_bytes(bytes)).transpose()
    }

    fn store_session(
        &self,
        address: &ProtocolAddress,
        record: &SessionRecordStructure,
    ) -> Result<(), StorageError> {
        let bytes = to_bytes(record)?;
        self.lock().sessions.insert(address.clone(), bytes);
        Ok(())
    }

    fn delete_session(&self, address: &ProtocolAddress) -> Result<(), StorageError> {
        self.lock().sessions.remove(address);
        Ok(())
    }

    fn load_sender_key(
        &self,
        name: &SenderKeyName,
    ) -> Result<Option<SenderKeyRecordStructure>, StorageError> {
        self.lock().sender_keys.get(name).map(|bytes| from_bytes(bytes)).transpose()
    }

    fn store_sender_key(
        &self,
        name: &SenderKeyName,
        record: &SenderKeyRecordStructure,
    ) -> Result<(), StorageError> {
        let bytes = to_bytes(record)?;
        self.lock().sender_keys.insert(name.clone(), bytes);
        Ok(())
    }
}
