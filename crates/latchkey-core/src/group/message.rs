//! Group message and distribution encodings

use std::fmt;

use latchkey_crypto::{ChainKey, TAG_SIZE};
use serde::{Deserialize, Serialize};

use super::{signing::SenderSigningKey, state::SenderKeyState};
use crate::{
    config::RatchetConfig,
    error::RatchetError,
    structure::{self, fixed},
};

/// Current sender key message version.
pub const SENDER_KEY_VERSION: u8 = 3;

/// version + key id + iteration
const BODY_HEADER_SIZE: usize = 1 + 4 + 4;

const SIGNATURE_SIZE: usize = 64;

/// Encrypted group message.
///
/// ```text
/// ┌─────────┬────────┬───────────┬────────────┬───────────┐
/// │ version │ key id │ iteration │ ciphertext │ signature │
/// │ 1       │ 4 (BE) │ 4 (BE)    │ var        │ 64        │
/// └─────────┴────────┴───────────┴────────────┴───────────┘
/// ```
///
/// The signature covers everything before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderKeyMessage {
    /// Sender key chain this message belongs to
    pub key_id: u32,
    /// Chain iteration the message was encrypted at
    pub iteration: u32,
    /// AEAD ciphertext including tag
    pub ciphertext: Vec<u8>,
    /// Ed25519 signature over the body
    pub signature: [u8; SIGNATURE_SIZE],
}

impl SenderKeyMessage {
    /// Signed portion of the message. Also the AEAD associated data prefix.
    pub fn body(&self) -> Vec<u8> {
        encode_body(self.key_id, self.iteration, &self.ciphertext)
    }

    /// Serialize for the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.body();
        out.extend_from_slice(&self.signature);
        out
    }

    /// Parse from the wire. The signature is not checked here.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RatchetError> {
        if bytes.len() < BODY_HEADER_SIZE + TAG_SIZE + SIGNATURE_SIZE {
            return Err(RatchetError::invalid_header(format!(
                "sender key message too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0] != SENDER_KEY_VERSION {
            return Err(RatchetError::invalid_header(format!(
                "unsupported sender key version {}",
                bytes[0]
            )));
        }

        let signature_start = bytes.len() - SIGNATURE_SIZE;
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(&bytes[signature_start..]);

        Ok(Self {
            key_id: read_u32(&bytes[1..5]),
            iteration: read_u32(&bytes[5..9]),
            ciphertext: bytes[BODY_HEADER_SIZE..signature_start].to_vec(),
            signature,
        })
    }
}

pub(crate) fn encode_body(key_id: u32, iteration: u32, ciphertext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(BODY_HEADER_SIZE + ciphertext.len() + SIGNATURE_SIZE);
    out.push(SENDER_KEY_VERSION);
    out.extend_from_slice(&key_id.to_be_bytes());
    out.extend_from_slice(&iteration.to_be_bytes());
    out.extend_from_slice(ciphertext);
    out
}

/// Associated data bound into each group ciphertext.
pub(crate) fn associated_data(key_id: u32, iteration: u32) -> [u8; BODY_HEADER_SIZE] {
    let mut out = [0u8; BODY_HEADER_SIZE];
    out[0] = SENDER_KEY_VERSION;
    out[1..5].copy_from_slice(&key_id.to_be_bytes());
    out[5..9].copy_from_slice(&iteration.to_be_bytes());
    out
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}

/// Everything a recipient needs to follow one sender key chain.
///
/// Sent to each group member over a pairwise session. Carries the public
/// half of the signing key only.
#[derive(Clone, PartialEq, Eq)]
pub struct SenderKeyDistribution {
    /// Chain identifier
    pub key_id: u32,
    /// Iteration the chain key is at
    pub iteration: u32,
    /// Chain value at `iteration`
    pub chain_key: [u8; 32],
    /// Ed25519 public key
    pub signing_key: [u8; 32],
}

#[derive(Serialize, Deserialize)]
struct DistributionStructure {
    #[serde(default)]
    version: u8,
    key_id: u32,
    #[serde(default)]
    iteration: u32,
    #[serde(with = "serde_bytes")]
    chain_key: Vec<u8>,
    #[serde(with = "serde_bytes")]
    signing_key: Vec<u8>,
}

impl SenderKeyDistribution {
    /// Encode as CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RatchetError> {
        structure::to_bytes(&DistributionStructure {
            version: SENDER_KEY_VERSION,
            key_id: self.key_id,
            iteration: self.iteration,
            chain_key: self.chain_key.to_vec(),
            signing_key: self.signing_key.to_vec(),
        })
        .map_err(|e| RatchetError::EncodingFailed { reason: e.to_string() })
    }

    /// Decode from CBOR.
    ///
    /// Undecodable bytes are an invalid message, not corrupt local state.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RatchetError> {
        let decoded: DistributionStructure = structure::from_bytes(bytes)
            .map_err(|e| RatchetError::invalid_header(format!("distribution: {e}")))?;

        if decoded.version != SENDER_KEY_VERSION {
            return Err(RatchetError::invalid_header(format!(
                "unsupported distribution version {}",
                decoded.version
            )));
        }

        let invalid = |e: RatchetError| RatchetError::invalid_header(e.to_string());
        Ok(Self {
            key_id: decoded.key_id,
            iteration: decoded.iteration,
            chain_key: fixed(&decoded.chain_key, "chain_key").map_err(invalid)?,
            signing_key: fixed(&decoded.signing_key, "signing_key").map_err(invalid)?,
        })
    }

    /// Receiving state for this chain.
    pub fn into_state(self, config: &RatchetConfig) -> Result<SenderKeyState, RatchetError> {
        let signing_key = SenderSigningKey::from_bytes(&self.signing_key, None)
            .map_err(|_| RatchetError::invalid_header("invalid signing key in distribution"))?;

        Ok(SenderKeyState::new(
            self.key_id,
            ChainKey::new(self.chain_key, self.iteration),
            signing_key,
            config,
        ))
    }
}

impl fmt::Debug for SenderKeyDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderKeyDistribution")
            .field("key_id", &self.key_id)
            .field("iteration", &self.iteration)
            .finish_non_exhaustive()
    }
}
