//! X25519 ratchet key pairs

use std::fmt;

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::{env::Environment, error::RatchetError};

/// One side's current DH ratchet key pair.
///
/// The secret half is zeroized on drop by `x25519-dalek`.
#[derive(Clone)]
pub struct RatchetKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl RatchetKeyPair {
    /// Generate a fresh key pair.
    pub fn generate(env: &impl Environment) -> Self {
        let mut bytes = env.random_key();
        let pair = Self::from_secret_bytes(bytes);
        bytes.zeroize();
        pair
    }

    /// Rebuild a key pair from its secret scalar.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Public half, as sent in message headers.
    pub fn public_key(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Secret half, for persistence.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// X25519 agreement with a peer's ratchet public key.
    ///
    /// Rejects low-order points, which would make the output independent of
    /// our secret.
    pub fn agree(&self, their_public: &[u8; 32]) -> Result<[u8; 32], RatchetError> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*their_public));
        if !shared.was_contributory() {
            return Err(RatchetError::invalid_header("non-contributory ratchet key"));
        }
        Ok(shared.to_bytes())
    }
}

impl fmt::Debug for RatchetKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatchetKeyPair")
            .field("public", &format_args!("{:02x?}", &self.public.as_bytes()[..4]))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SeededEnv;

    #[test]
    fn agreement_is_symmetric() {
        let env = SeededEnv::new(5);
        let alice = RatchetKeyPair::generate(&env);
        let bob = RatchetKeyPair::generate(&env);

        assert_eq!(
            alice.agree(&bob.public_key()).unwrap(),
            bob.agree(&alice.public_key()).unwrap()
        );
    }

    #[test]
    fn secret_bytes_rebuild_same_pair() {
        let pair = RatchetKeyPair::generate(&SeededEnv::new(9));
        let rebuilt = RatchetKeyPair::from_secret_bytes(pair.secret_bytes());
        assert_eq!(pair.public_key(), rebuilt.public_key());
    }

    #[test]
    fn low_order_point_rejected() {
        let pair = RatchetKeyPair::generate(&SeededEnv::new(1));
        let err = pair.agree(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, RatchetError::InvalidHeader { .. }));
    }
}
