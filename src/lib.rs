//! # Daybook
//!
//! Passphrase-protected personal diary store.
//!
//! Dated text entries and named bookmarks are persisted in a single
//! container file; the plaintext is never written to disk and is only
//! recoverable with the passphrase.
//!
//! ## Quick Start
//!
//! ```no_run
//! use daybook::{Store, StoreOptions};
//! use chrono::NaiveDate;
//!
//! let mut store = Store::create("diary.db", "correct-horse", StoreOptions::default())?;
//! let entry = store.new_entry(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "hello")?;
//! store.add_bookmark("launch-day", entry.id)?;
//! store.flush()?;
//!
//! let store = Store::open("diary.db", "correct-horse")?;
//! assert_eq!(store.read_entry(entry.id)?.content, "hello");
//! # Ok::<(), daybook::StoreError>(())
//! ```
//!
//! ## Security Properties
//!
//! - **Argon2id** passphrase hardening, work factors persisted per store
//! - **Encrypt-then-MAC**: AES-256-CTR + HMAC-SHA256 under distinct subkeys
//! - **Nonces** from a persisted monotonic counter — never reused under one key
//! - **Constant-time** verifier and tag checks; keys zeroed on drop
//! - **Atomic persistence**: temp file, fsync, rename
//!
//! ## What's NOT Provided
//!
//! - Multi-user access control
//! - Network synchronization
//! - Key rotation without full re-encryption ([`Store::rekey`] rewrites the
//!   container)
//! - Tamper evidence beyond per-record integrity

#![deny(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/daybook/0.1.0")]

// ---------------------------------------------------------------------------
// Internal modules
// ---------------------------------------------------------------------------

// Cipher, codec, and container are implementation detail, kept reachable for
// integration tests and format tooling but not considered stable API.
#[doc(hidden)]
pub mod cipher;
#[doc(hidden)]
pub mod codec;
#[doc(hidden)]
pub mod container;

// ---------------------------------------------------------------------------
// Public interface
// ---------------------------------------------------------------------------

pub mod error;
pub mod kdf;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use kdf::KdfParams;
pub use store::Store;
pub use types::{Bookmark, BookmarkPolicy, Entry, EntryId, StoreOptions};
