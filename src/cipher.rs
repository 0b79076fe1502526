//! Authenticated record encryption: AES-256-CTR + HMAC-SHA256
//!
//! Encrypt-then-MAC with separate subkeys. The tag covers nonce and
//! ciphertext and is checked in constant time before any keystream is
//! applied. Nonce uniqueness is the store's responsibility: it allocates
//! nonces from a persisted monotonic counter, never the cipher's.

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes256;
use ctr::Ctr32BE;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::IntegrityError;
use crate::kdf::CipherKeys;

pub const NONCE_BYTES: usize = 12;
pub const TAG_BYTES: usize = 32;

/// Nonce domain prefix for container records.
const NONCE_DOMAIN: [u8; 4] = *b"DBK1";

type Aes256Ctr = Ctr32BE<Aes256>;

/// Build a record nonce from the persisted counter.
pub fn nonce_for(counter: u64) -> [u8; NONCE_BYTES] {
    let mut nonce = [0u8; NONCE_BYTES];
    nonce[..4].copy_from_slice(&NONCE_DOMAIN);
    nonce[4..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

fn keystream_xor(key: &[u8; 32], nonce: &[u8; NONCE_BYTES], buf: &mut [u8]) {
    // CTR IV: 12-byte nonce followed by a 32-bit zero block counter.
    let mut iv = [0u8; 16];
    iv[..NONCE_BYTES].copy_from_slice(nonce);
    let mut cipher = Aes256Ctr::new(key.into(), &iv.into());
    cipher.apply_keystream(buf);
}

fn compute_tag(key: &[u8; 32], nonce: &[u8; NONCE_BYTES], ciphertext: &[u8]) -> [u8; TAG_BYTES] {
    let mut mac =
        <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC can take a key of any size");
    mac.update(nonce);
    mac.update(ciphertext);
    mac.finalize().into_bytes().into()
}

/// Seal a plaintext under a fresh nonce.
///
/// Ciphertext length equals plaintext length (no padding); the tag covers
/// (nonce || ciphertext).
pub fn seal(
    keys: &CipherKeys,
    nonce: &[u8; NONCE_BYTES],
    plaintext: &[u8],
) -> (Vec<u8>, [u8; TAG_BYTES]) {
    let mut ciphertext = plaintext.to_vec();
    keystream_xor(&keys.enc, nonce, &mut ciphertext);
    let tag = compute_tag(&keys.mac, nonce, &ciphertext);
    (ciphertext, tag)
}

/// Open a sealed record: authenticate, then decrypt.
///
/// On a tag mismatch no plaintext is produced.
pub fn open(
    keys: &CipherKeys,
    nonce: &[u8; NONCE_BYTES],
    ciphertext: &[u8],
    tag: &[u8; TAG_BYTES],
) -> Result<Zeroizing<Vec<u8>>, IntegrityError> {
    let expected = compute_tag(&keys.mac, nonce, ciphertext);
    if !bool::from(expected.ct_eq(tag)) {
        return Err(IntegrityError);
    }
    let mut plaintext = Zeroizing::new(ciphertext.to_vec());
    keystream_xor(&keys.enc, nonce, &mut plaintext);
    Ok(plaintext)
}
