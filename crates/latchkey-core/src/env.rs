//! Environment abstraction for deterministic testing.
//!
//! Decouples ratchet logic from the system RNG. Production callers plug in an
//! OS-backed implementation; tests use the seeded environment in `testing` so that
//! every generated key pair, key id and chain seed is reproducible.

/// Source of randomness for key generation.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - The method is infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same seed, a deterministic implementation produces the same
    ///   sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates 32 random bytes, the size of every key in the engine.
    fn random_key(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.random_bytes(&mut bytes);
        bytes
    }

    /// Generates a random `u32`.
    fn random_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }
}
