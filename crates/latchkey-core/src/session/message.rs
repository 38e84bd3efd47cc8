//! Pairwise message wire format
//!
//! ```text
//! ┌─────────┬──────────────────┬───────────┬──────────────────┐
//! │ version │ ratchet key      │ iteration │ previous counter │  header (41)
//! │ 1       │ 32               │ 4 (BE)    │ 4 (BE)           │
//! ├─────────┴──────────────────┴───────────┴──────────────────┤
//! │ ciphertext (AEAD, tag included)                           │
//! ├───────────────────────────────────────────────────────────┤
//! │ MAC (8)                                                   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! The encoded header is both the AEAD associated data and part of the MAC
//! input, so no header field can be altered without detection.

use latchkey_crypto::{MAC_SIZE, TAG_SIZE};

use crate::error::RatchetError;

/// Current pairwise message version.
pub const SESSION_VERSION: u8 = 3;

/// Encoded header size.
pub const HEADER_SIZE: usize = 1 + 32 + 4 + 4;

/// Plaintext header of a pairwise message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Sender's current ratchet public key
    pub ratchet_key: [u8; 32],
    /// Iteration of the sending chain this message was encrypted at
    pub iteration: u32,
    /// Length of the sender's previous sending chain
    pub previous_counter: u32,
}

impl MessageHeader {
    /// Encode as the fixed 41-byte layout.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = SESSION_VERSION;
        out[1..33].copy_from_slice(&self.ratchet_key);
        out[33..37].copy_from_slice(&self.iteration.to_be_bytes());
        out[37..41].copy_from_slice(&self.previous_counter.to_be_bytes());
        out
    }

    /// Decode and validate a header.
    pub fn decode(bytes: &[u8]) -> Result<Self, RatchetError> {
        if bytes.len() != HEADER_SIZE {
            return Err(RatchetError::invalid_header(format!(
                "header is {} bytes, expected {HEADER_SIZE}",
                bytes.len()
            )));
        }
        if bytes[0] != SESSION_VERSION {
            return Err(RatchetError::invalid_header(format!(
                "unsupported version {}",
                bytes[0]
            )));
        }

        let mut ratchet_key = [0u8; 32];
        ratchet_key.copy_from_slice(&bytes[1..33]);
        if ratchet_key == [0u8; 32] {
            return Err(RatchetError::invalid_header("empty ratchet key"));
        }

        Ok(Self {
            ratchet_key,
            iteration: read_u32(&bytes[33..37]),
            previous_counter: read_u32(&bytes[37..41]),
        })
    }
}

/// Encrypted pairwise message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMessage {
    /// Plaintext header
    pub header: MessageHeader,
    /// AEAD ciphertext including tag
    pub ciphertext: Vec<u8>,
    /// Truncated HMAC over identities, header and ciphertext
    pub mac: [u8; MAC_SIZE],
}

impl SessionMessage {
    /// Serialize for the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.ciphertext.len() + MAC_SIZE);
        out.extend_from_slice(&self.header.encode());
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.mac);
        out
    }

    /// Parse from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RatchetError> {
        if bytes.len() < HEADER_SIZE + TAG_SIZE + MAC_SIZE {
            return Err(RatchetError::invalid_header(format!(
                "message too short: {} bytes",
                bytes.len()
            )));
        }

        let header = MessageHeader::decode(&bytes[..HEADER_SIZE])?;
        let mac_start = bytes.len() - MAC_SIZE;

        let mut mac = [0u8; MAC_SIZE];
        mac.copy_from_slice(&bytes[mac_start..]);

        Ok(Self { header, ciphertext: bytes[HEADER_SIZE..mac_start].to_vec(), mac })
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}
