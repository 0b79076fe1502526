//! Error types for the diary store.

use crate::types::EntryId;
use std::fmt;

// ---------------------------------------------------------------------------
// Top-level store error
// ---------------------------------------------------------------------------

/// Every failure a [`Store`](crate::Store) operation can report.
///
/// Cryptographic and format failures are never downgraded: a wrong
/// passphrase, a damaged record, and an unreadable container are distinct
/// kinds so the caller can present them as distinct conditions.
#[derive(Debug)]
pub enum StoreError {
    /// The verifier did not match the derived key. No record was touched.
    PassphraseRejected,
    /// A record's integrity tag did not match. The record's plaintext is
    /// withheld; other records in the session stay readable.
    IntegrityFailure(EntryId),
    /// Header or index unparsable or unauthenticatable. Fatal for `open`.
    CorruptContainer(String),
    /// A bookmark with this name already exists.
    DuplicateName(String),
    NoSuchEntry(EntryId),
    NoSuchBookmark(String),
    /// A record or payload exceeds the container format's length prefixes.
    RecordTooLarge,
    /// The nonce counter space for the current key is spent.
    NonceExhausted,
    Io(String),
    Kdf(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassphraseRejected => write!(f, "passphrase rejected"),
            Self::IntegrityFailure(id) => write!(f, "integrity check failed for entry {}", id),
            Self::CorruptContainer(msg) => write!(f, "corrupt container: {}", msg),
            Self::DuplicateName(name) => write!(f, "duplicate bookmark name: {}", name),
            Self::NoSuchEntry(id) => write!(f, "no such entry: {}", id),
            Self::NoSuchBookmark(name) => write!(f, "no such bookmark: {}", name),
            Self::RecordTooLarge => write!(f, "record exceeds container limits"),
            Self::NonceExhausted => write!(f, "nonce counter exhausted"),
            Self::Io(msg) => write!(f, "i/o error: {}", msg),
            Self::Kdf(msg) => write!(f, "key derivation failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Layer errors (normalized upward by the store)
// ---------------------------------------------------------------------------

/// Integrity tag mismatch at the cipher layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityError;

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "integrity check failed")
    }
}

impl std::error::Error for IntegrityError {}

/// A payload field exceeds its length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeError;

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error")
    }
}

impl std::error::Error for EncodeError {}

/// A payload failed structural validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError;

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decoding error")
    }
}

impl std::error::Error for DecodeError {}
