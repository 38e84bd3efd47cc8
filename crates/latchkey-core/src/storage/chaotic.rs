//! Fault-injecting store wrapper for chaos tests
//!
//! Delegates to an inner store but fails a seeded, reproducible fraction of
//! operations with [`StorageError::Io`]. A failed write never reaches the
//! inner store, so the previously persisted record survives untouched.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use super::{KeyStore, StorageError};
use crate::{
    address::{ProtocolAddress, SenderKeyName},
    group::SenderKeyRecordStructure,
    session::SessionRecordStructure,
};

/// Store wrapper that randomly fails operations
#[derive(Clone)]
pub struct ChaoticStore<S: KeyStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<AtomicUsize>,
    failure_count: Arc<AtomicUsize>,
}

/// Linear congruential generator; reproducible for a given seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: KeyStore> ChaoticStore<S> {
    /// Wrap a store with the default seed.
    ///
    /// `failure_rate` is clamped to [0.0, 1.0].
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap a store with an explicit seed.
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Arc::new(Mutex::new(ChaoticRng { state: seed })),
            operation_count: Arc::new(AtomicUsize::new(0)),
            failure_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying store, for checking invariants after chaos.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Operations attempted so far.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Operations failed so far.
    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::Relaxed)
    }

    fn inject(&self, operation: &str) -> Result<(), StorageError> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);

        let roll = self.rng.lock().unwrap_or_else(PoisonError::into_inner).next();
        if roll < self.failure_rate {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
            return Err(StorageError::Io(format!("injected failure in {operation}")));
        }
        Ok(())
    }
}

impl<S: KeyStore> KeyStore for ChaoticStore<S> {
    fn load_session(
        &self,
        address: &ProtocolAddress,
    ) -> Result<Option<SessionRecordStructure>, StorageError> {
        self.inject("load_session")?;
        self.inner.load_session(address)
    }

    fn store_session(
        &self,
        address: &ProtocolAddress,
        record: &SessionRecordStructure,
    ) -> Result<(), StorageError> {
        self.inject("store_session")?;
        self.inner.store_session(address, record)
    }

    fn delete_session(&self, address: &ProtocolAddress) -> Result<(), StorageError> {
        self.inject("delete_session")?;
        self.inner.delete_session(address)
    }

    fn load_sender_key(
        &self,
        name: &SenderKeyName,
    ) -> Result<Option<SenderKeyRecordStructure>, StorageError> {
        self.inject("load_sender_key")?;
        self.inner.load_sender_key(name)
    }

    fn store_sender_key(
        &self,
        name: &SenderKeyName,
        record: &SenderKeyRecordStructure,
    ) -> Result<(), StorageError> {
        self.inject("store_sender_key")?;
        self.inner.store_sender_key(name, record)
    }
}
