//! Core types: EntryId, Entry, Bookmark, deletion policy, store options.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

use crate::kdf::KdfParams;

// ---------------------------------------------------------------------------
// Entry identifiers
// ---------------------------------------------------------------------------

/// Opaque entry identifier.
///
/// Allocated from a monotonic counter persisted inside the encrypted index;
/// unique for the lifetime of a store and never reused after deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

impl EntryId {
    /// Create from a raw value (for deterministic/test use; stores allocate
    /// their own ids).
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Entries and bookmarks
// ---------------------------------------------------------------------------

/// A decrypted diary entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    /// Diary date — the sort key. Multiple entries may share a date.
    pub date: NaiveDate,
    /// Free-text body.
    pub content: String,
    /// Updated on every content change. Whole-second resolution.
    pub modified: DateTime<Utc>,
}

/// A named reference to an entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bookmark {
    /// Unique among the store's bookmarks.
    pub name: String,
    pub entry: EntryId,
    /// Set when the referenced entry was deleted under [`BookmarkPolicy::Orphan`].
    pub orphaned: bool,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What happens to bookmarks referencing an entry when that entry is deleted.
///
/// Fixed at store creation and persisted inside the encrypted index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BookmarkPolicy {
    /// Delete referencing bookmarks together with the entry.
    #[default]
    Cascade,
    /// Keep referencing bookmarks, flagged as orphaned.
    Orphan,
}

/// Creation-time configuration for a store.
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    pub bookmark_policy: BookmarkPolicy,
    /// Argon2id work factors. `None` uses the current defaults.
    pub kdf: Option<KdfParams>,
}
