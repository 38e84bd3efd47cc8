//! HMAC/HKDF key derivation
//!
//! Chain steps follow the usual Signal-family construction: the chain value
//! keys an HMAC over a one-byte constant. `0x01` seeds the message key,
//! `0x02` produces the next chain value. The message key seed is then expanded
//! with HKDF into cipher key, MAC key and IV.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{
    chain_key::{ChainKey, RootKey},
    error::CryptoError,
    message_key::{CIPHER_KEY_SIZE, IV_SIZE, MAC_KEY_SIZE, MessageKey},
};

type HmacSha256 = Hmac<Sha256>;

/// Size of chain, root and message keys.
pub const KEY_SIZE: usize = 32;

/// HMAC input for deriving a message key seed
const MESSAGE_KEY_SEED: &[u8] = &[0x01];

/// HMAC input for deriving the next chain key
const CHAIN_KEY_SEED: &[u8] = &[0x02];

/// HKDF info for expanding a message key seed
const MESSAGE_KEYS_LABEL: &[u8] = b"LatchkeyMessageKeys";

/// HKDF info for the DH ratchet root step
const RATCHET_LABEL: &[u8] = b"LatchkeyRatchet";

/// HKDF info for turning a handshake secret into the first root and chain key
const INITIAL_KEYS_LABEL: &[u8] = b"LatchkeyInitialKeys";

const MESSAGE_KEY_MATERIAL_SIZE: usize = CIPHER_KEY_SIZE + MAC_KEY_SIZE + IV_SIZE;

/// Chain key for the next iteration.
///
/// Fails only if the iteration counter is already at `u32::MAX`.
pub fn derive_next_chain_key(chain: &ChainKey) -> Result<ChainKey, CryptoError> {
    let iteration = chain
        .iteration()
        .checked_add(1)
        .ok_or(CryptoError::ChainExhausted { iteration: chain.iteration() })?;

    Ok(ChainKey::new(hmac_sha256(chain.value(), CHAIN_KEY_SEED), iteration))
}

/// Message key for the chain's current iteration.
pub fn derive_message_key(chain: &ChainKey) -> MessageKey {
    let mut seed = hmac_sha256(chain.value(), MESSAGE_KEY_SEED);

    let mut material = [0u8; MESSAGE_KEY_MATERIAL_SIZE];
    expand(None, &seed, MESSAGE_KEYS_LABEL, &mut material);
    seed.zeroize();

    let mut cipher_key = [0u8; CIPHER_KEY_SIZE];
    let mut mac_key = [0u8; MAC_KEY_SIZE];
    let mut iv = [0u8; IV_SIZE];
    cipher_key.copy_from_slice(&material[..CIPHER_KEY_SIZE]);
    mac_key.copy_from_slice(&material[CIPHER_KEY_SIZE..CIPHER_KEY_SIZE + MAC_KEY_SIZE]);
    iv.copy_from_slice(&material[CIPHER_KEY_SIZE + MAC_KEY_SIZE..]);
    material.zeroize();

    MessageKey::new(chain.iteration(), cipher_key, mac_key, iv)
}

/// First root key and chain key from an externally agreed shared secret.
///
/// The shared secret is whatever the (out of scope) handshake produced. Both
/// parties must feed in identical bytes.
pub fn derive_initial_keys(shared_secret: &[u8]) -> (RootKey, ChainKey) {
    let mut material = [0u8; 2 * KEY_SIZE];
    expand(None, shared_secret, INITIAL_KEYS_LABEL, &mut material);

    let (root, chain) = split_pair(&material);
    material.zeroize();

    (RootKey::new(root), ChainKey::new(chain, 0))
}

/// One DH ratchet step: `(root', chain) = HKDF(salt = root, ikm = dh_output)`.
pub(crate) fn derive_root_step(
    root: &[u8; KEY_SIZE],
    dh_output: &[u8; KEY_SIZE],
) -> ([u8; KEY_SIZE], [u8; KEY_SIZE]) {
    let mut material = [0u8; 2 * KEY_SIZE];
    expand(Some(root), dh_output, RATCHET_LABEL, &mut material);

    let pair = split_pair(&material);
    material.zeroize();
    pair
}

fn split_pair(material: &[u8; 2 * KEY_SIZE]) -> ([u8; KEY_SIZE], [u8; KEY_SIZE]) {
    let mut first = [0u8; KEY_SIZE];
    let mut second = [0u8; KEY_SIZE];
    first.copy_from_slice(&material[..KEY_SIZE]);
    second.copy_from_slice(&material[KEY_SIZE..]);
    (first, second)
}

fn expand(salt: Option<&[u8]>, ikm: &[u8], info: &[u8], out: &mut [u8]) {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);
    let Ok(()) = hkdf.expand(info, out) else {
        unreachable!("output length is far below the HKDF-SHA256 limit of 8160 bytes");
    };
}

fn hmac_sha256(key: &[u8], input: &[u8]) -> [u8; KEY_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(input);
    let result = mac.finalize().into_bytes();

    let mut out = [0u8; KEY_SIZE];
    out.copy_from_slice(&result);
    out
}
