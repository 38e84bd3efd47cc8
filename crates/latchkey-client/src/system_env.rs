//! Production environment backed by the OS RNG.

use latchkey_core::Environment;

/// Environment drawing randomness from the operating system.
///
/// # Panics
///
/// Panics if the OS RNG fails. A client without working randomness cannot
/// generate ratchet keys safely, and continuing would be worse than stopping.
#[derive(Clone, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - cannot generate keys");
    }
}
