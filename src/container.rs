//! Container file format (v1) and atomic I/O
//!
//! Layout:
//!   magic[7] || version[1] || suite_cipher[1] || suite_mac[1] || suite_kdf[1]
//!   || flags[1] || m_cost[4] || t_cost[4] || p_cost[4]
//!   || salt[16] || verifier[32] || nonce_counter[8]
//!   || index record || entry-body records
//!
//! Record framing: nonce[12] || tag[32] || ct_len[4] || ciphertext
//!
//! Everything after the header is encrypted. The nonce counter is the
//! high-water mark: the next value the store may allocate.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::cipher::{NONCE_BYTES, TAG_BYTES};
use crate::error::{EncodeError, StoreError};
use crate::kdf::{KdfParams, SALT_BYTES, VERIFIER_BYTES};

/// Protocol identifier for KDF domain separation (container v1).
pub const PROTOCOL_ID: &[u8] = b"daybook-v1";

pub const MAGIC: &[u8; 7] = b"DAYBOOK";
pub const FORMAT_VERSION: u8 = 0x01;

/// Suite identifiers (on disk)
pub const SUITE_CIPHER_AES256CTR: u8 = 0xC1;
pub const SUITE_MAC_HMAC_SHA256: u8 = 0xD1;
pub const SUITE_KDF_ARGON2ID: u8 = 0xE1;

/// Flags (reserved for future use)
pub const FLAGS_V1: u8 = 0x00;

/// Header size: magic + version + suites + flags + work factors + salt
/// + verifier + nonce counter
pub const HEADER_BYTES: usize = 7 + 1 + 1 + 1 + 1 + 1 + 4 + 4 + 4 + SALT_BYTES + VERIFIER_BYTES + 8; // 80

/// Per-record framing overhead: nonce + tag + length prefix
pub const RECORD_OVERHEAD: usize = NONCE_BYTES + TAG_BYTES + 4; // 48

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Parsed plaintext header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub kdf: KdfParams,
    pub salt: [u8; SALT_BYTES],
    pub verifier: [u8; VERIFIER_BYTES],
    /// Next nonce counter value the store may allocate.
    pub nonce_counter: u64,
}

pub fn encode_header(h: &Header) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_BYTES);
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.push(SUITE_CIPHER_AES256CTR);
    out.push(SUITE_MAC_HMAC_SHA256);
    out.push(SUITE_KDF_ARGON2ID);
    out.push(FLAGS_V1);
    out.extend_from_slice(&h.kdf.m_cost.to_be_bytes());
    out.extend_from_slice(&h.kdf.t_cost.to_be_bytes());
    out.extend_from_slice(&h.kdf.p_cost.to_be_bytes());
    out.extend_from_slice(&h.salt);
    out.extend_from_slice(&h.verifier);
    out.extend_from_slice(&h.nonce_counter.to_be_bytes());
    out
}

pub fn decode_header(data: &[u8]) -> Result<Header, StoreError> {
    if data.len() < HEADER_BYTES {
        return Err(corrupt("truncated header"));
    }
    if &data[..7] != MAGIC {
        return Err(corrupt("bad magic"));
    }
    if data[7] != FORMAT_VERSION {
        return Err(corrupt("unsupported format version"));
    }
    if data[8] != SUITE_CIPHER_AES256CTR
        || data[9] != SUITE_MAC_HMAC_SHA256
        || data[10] != SUITE_KDF_ARGON2ID
    {
        return Err(corrupt("unknown suite identifier"));
    }
    if data[11] != FLAGS_V1 {
        return Err(corrupt("unknown flags"));
    }

    let m_cost = u32::from_be_bytes(data[12..16].try_into().map_err(|_| corrupt("header"))?);
    let t_cost = u32::from_be_bytes(data[16..20].try_into().map_err(|_| corrupt("header"))?);
    let p_cost = u32::from_be_bytes(data[20..24].try_into().map_err(|_| corrupt("header"))?);
    let salt: [u8; SALT_BYTES] = data[24..24 + SALT_BYTES]
        .try_into()
        .map_err(|_| corrupt("header"))?;
    let verifier: [u8; VERIFIER_BYTES] = data[40..40 + VERIFIER_BYTES]
        .try_into()
        .map_err(|_| corrupt("header"))?;
    let nonce_counter = u64::from_be_bytes(data[72..80].try_into().map_err(|_| corrupt("header"))?);

    Ok(Header {
        kdf: KdfParams {
            m_cost,
            t_cost,
            p_cost,
        },
        salt,
        verifier,
        nonce_counter,
    })
}

// ---------------------------------------------------------------------------
// Record framing
// ---------------------------------------------------------------------------

/// One sealed record as stored in the container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedRecord {
    pub nonce: [u8; NONCE_BYTES],
    pub tag: [u8; TAG_BYTES],
    pub ciphertext: Vec<u8>,
}

impl SealedRecord {
    pub fn framed_len(&self) -> usize {
        RECORD_OVERHEAD + self.ciphertext.len()
    }
}

/// Append a framed record to the output buffer.
pub fn encode_record(out: &mut Vec<u8>, rec: &SealedRecord) -> Result<(), EncodeError> {
    let len = u32::try_from(rec.ciphertext.len()).map_err(|_| EncodeError)?;
    out.extend_from_slice(&rec.nonce);
    out.extend_from_slice(&rec.tag);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&rec.ciphertext);
    Ok(())
}

/// Decode a framed record at the start of `data`, returning the record and
/// the number of bytes consumed.
pub fn decode_record_prefix(data: &[u8]) -> Result<(SealedRecord, usize), StoreError> {
    if data.len() < RECORD_OVERHEAD {
        return Err(corrupt("truncated record"));
    }
    let nonce: [u8; NONCE_BYTES] = data[..NONCE_BYTES]
        .try_into()
        .map_err(|_| corrupt("record"))?;
    let tag: [u8; TAG_BYTES] = data[NONCE_BYTES..NONCE_BYTES + TAG_BYTES]
        .try_into()
        .map_err(|_| corrupt("record"))?;
    let len = u32::from_be_bytes(
        data[NONCE_BYTES + TAG_BYTES..RECORD_OVERHEAD]
            .try_into()
            .map_err(|_| corrupt("record"))?,
    ) as usize;

    let total = RECORD_OVERHEAD
        .checked_add(len)
        .ok_or_else(|| corrupt("record length overflow"))?;
    if data.len() < total {
        return Err(corrupt("truncated record body"));
    }

    Ok((
        SealedRecord {
            nonce,
            tag,
            ciphertext: data[RECORD_OVERHEAD..total].to_vec(),
        },
        total,
    ))
}

/// Decode a framed record that must occupy `data` exactly.
pub fn decode_record_exact(data: &[u8]) -> Result<SealedRecord, StoreError> {
    let (rec, consumed) = decode_record_prefix(data)?;
    if consumed != data.len() {
        return Err(corrupt("record length mismatch"));
    }
    Ok(rec)
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

pub fn read_container(path: &Path) -> Result<Vec<u8>, StoreError> {
    fs::read(path).map_err(StoreError::from)
}

/// Replace the container file atomically.
///
/// The new bytes are written to a sibling temp file, fsynced, then renamed
/// over the destination. A crash at any point leaves either the old or the
/// new complete container on disk, never a mix.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)?;
    Ok(())
}

fn corrupt(msg: &str) -> StoreError {
    StoreError::CorruptContainer(msg.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            kdf: KdfParams {
                m_cost: 19 * 1024,
                t_cost: 2,
                p_cost: 1,
            },
            salt: [0xAA; SALT_BYTES],
            verifier: [0xBB; VERIFIER_BYTES],
            nonce_counter: 17,
        }
    }

    #[test]
    fn header_constants() {
        assert_eq!(HEADER_BYTES, 80);
        assert_eq!(RECORD_OVERHEAD, 48);
    }

    #[test]
    fn header_prefix_known_bytes() {
        let bytes = encode_header(&sample_header());
        // magic || version || suites || flags
        assert_eq!(hex::encode(&bytes[..12]), "444159424f4f4b01c1d1e100");
    }

    #[test]
    fn header_roundtrip() {
        let header = sample_header();
        let bytes = encode_header(&header);
        assert_eq!(bytes.len(), HEADER_BYTES);
        assert_eq!(decode_header(&bytes).unwrap(), header);
    }

    #[test]
    fn header_rejects_bad_magic_version_suite() {
        let good = encode_header(&sample_header());

        for (pos, label) in [(0, "magic"), (7, "version"), (8, "suite"), (11, "flags")] {
            let mut bad = good.clone();
            bad[pos] ^= 0xFF;
            assert!(
                matches!(decode_header(&bad), Err(StoreError::CorruptContainer(_))),
                "expected rejection at {} byte",
                label
            );
        }
    }

    #[test]
    fn header_rejects_truncation() {
        let bytes = encode_header(&sample_header());
        assert!(matches!(
            decode_header(&bytes[..HEADER_BYTES - 1]),
            Err(StoreError::CorruptContainer(_))
        ));
        assert!(matches!(
            decode_header(b""),
            Err(StoreError::CorruptContainer(_))
        ));
    }

    #[test]
    fn record_roundtrip() {
        let rec = SealedRecord {
            nonce: [1; NONCE_BYTES],
            tag: [2; TAG_BYTES],
            ciphertext: vec![3, 4, 5],
        };
        let mut framed = Vec::new();
        encode_record(&mut framed, &rec).unwrap();
        assert_eq!(framed.len(), rec.framed_len());

        let (decoded, consumed) = decode_record_prefix(&framed).unwrap();
        assert_eq!(decoded, rec);
        assert_eq!(consumed, framed.len());
        assert_eq!(decode_record_exact(&framed).unwrap(), rec);
    }

    #[test]
    fn record_rejects_truncation_and_slack() {
        let rec = SealedRecord {
            nonce: [1; NONCE_BYTES],
            tag: [2; TAG_BYTES],
            ciphertext: vec![9; 16],
        };
        let mut framed = Vec::new();
        encode_record(&mut framed, &rec).unwrap();

        assert!(decode_record_prefix(&framed[..framed.len() - 1]).is_err());
        assert!(decode_record_prefix(&framed[..RECORD_OVERHEAD - 1]).is_err());

        framed.push(0);
        assert!(decode_record_exact(&framed).is_err());
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        write_atomic(&path, b"first").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");

        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!path.with_extension("tmp").exists());
    }
}
