//! Sender key signing keys

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use zeroize::Zeroize;

use crate::{env::Environment, error::RatchetError};

/// Ed25519 key authenticating one sender key chain.
///
/// The sender holds the full key pair; every recipient holds only the public
/// half, which is enough to verify but not to forge.
#[derive(Clone)]
pub enum SenderSigningKey {
    /// Our own chain: we can sign
    Owned(SigningKey),
    /// A remote chain: verify only
    PublicOnly(VerifyingKey),
}

impl SenderSigningKey {
    /// Generate a fresh owned key pair.
    pub fn generate(env: &impl Environment) -> Self {
        let mut seed = env.random_key();
        let key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self::Owned(key)
    }

    /// Rebuild from persisted bytes; `private` wins when present.
    pub fn from_bytes(public: &[u8; 32], private: Option<&[u8; 32]>) -> Result<Self, RatchetError> {
        if let Some(private) = private {
            let key = SigningKey::from_bytes(private);
            if key.verifying_key().as_bytes() != public {
                return Err(RatchetError::malformed("signing key pair mismatch"));
            }
            return Ok(Self::Owned(key));
        }

        VerifyingKey::from_bytes(public)
            .map(Self::PublicOnly)
            .map_err(|_| RatchetError::malformed("invalid signing public key"))
    }

    /// Public half.
    pub fn public_key(&self) -> VerifyingKey {
        match self {
            Self::Owned(key) => key.verifying_key(),
            Self::PublicOnly(key) => *key,
        }
    }

    /// Public half as bytes.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public_key().to_bytes()
    }

    /// Private half as bytes, if we own the key.
    pub fn private_bytes(&self) -> Option<[u8; 32]> {
        match self {
            Self::Owned(key) => Some(key.to_bytes()),
            Self::PublicOnly(_) => None,
        }
    }

    /// Whether this key can sign.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// Public-only copy, as handed to recipients.
    pub fn to_public(&self) -> Self {
        Self::PublicOnly(self.public_key())
    }

    /// Sign a message body.
    pub fn sign(&self, key_id: u32, message: &[u8]) -> Result<[u8; 64], RatchetError> {
        match self {
            Self::Owned(key) => Ok(key.sign(message).to_bytes()),
            Self::PublicOnly(_) => Err(RatchetError::MissingSigningKey { key_id }),
        }
    }

    /// Verify a signature over a message body.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), RatchetError> {
        let signature = Signature::from_bytes(signature);
        self.public_key()
            .verify_strict(message, &signature)
            .map_err(|_| RatchetError::SignatureInvalid)
    }
}

impl fmt::Debug for SenderSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_owned() { "Owned" } else { "PublicOnly" };
        f.debug_struct("SenderSigningKey")
            .field("kind", &kind)
            .field("public", &format_args!("{:02x?}", &self.public_bytes()[..4]))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SeededEnv;

    #[test]
    fn owned_signs_public_verifies() {
        let owned = SenderSigningKey::generate(&SeededEnv::new(3));
        let public = owned.to_public();

        let signature = owned.sign(1, b"body").unwrap();
        assert!(public.verify(b"body", &signature).is_ok());
        assert_eq!(public.verify(b"other", &signature), Err(RatchetError::SignatureInvalid));
    }

    #[test]
    fn public_only_cannot_sign() {
        let public = SenderSigningKey::generate(&SeededEnv::new(4)).to_public();
        assert_eq!(public.sign(77, b"x"), Err(RatchetError::MissingSigningKey { key_id: 77 }));
    }

    #[test]
    fn bytes_round_trip() {
        let owned = SenderSigningKey::generate(&SeededEnv::new(5));
        let private = owned.private_bytes().unwrap();

        let rebuilt = SenderSigningKey::from_bytes(&owned.public_bytes(), Some(&private)).unwrap();
        assert!(rebuilt.is_owned());
        assert_eq!(rebuilt.public_bytes(), owned.public_bytes());

        let err = SenderSigningKey::from_bytes(&[9; 32], Some(&private)).unwrap_err();
        assert!(err.is_fatal());
    }
}
