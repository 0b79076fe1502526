//! The diary store: session lifecycle, lazy entry decryption, bookmarks,
//! atomic persistence.
//!
//! One `Store` owns one container file. Mutations only touch memory and mark
//! the store dirty; nothing is durable until [`Store::flush`]. The caller
//! serializes access — there is no internal locking.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::{self, NONCE_BYTES};
use crate::codec::{self, Index, IndexEntry};
use crate::container::{self, Header, SealedRecord, HEADER_BYTES, RECORD_OVERHEAD};
use crate::error::StoreError;
use crate::kdf::{self, CipherKeys, KdfParams, SALT_BYTES, VERIFIER_BYTES};
use crate::types::{Bookmark, BookmarkPolicy, Entry, EntryId, StoreOptions};

/// Sealed in-memory state for one entry. The body stays encrypted until
/// [`Store::read_entry`] asks for it.
#[derive(Clone, Debug)]
struct EntrySlot {
    date: NaiveDate,
    modified: DateTime<Utc>,
    record: SealedRecord,
}

pub struct Store {
    path: PathBuf,
    kdf: KdfParams,
    salt: [u8; SALT_BYTES],
    verifier: [u8; VERIFIER_BYTES],
    keys: CipherKeys,
    /// Next nonce counter value. Persisted in the header so a crash between
    /// writes cannot cause reuse on restart.
    nonce_counter: u64,
    next_entry_id: u64,
    entries: BTreeMap<EntryId, EntrySlot>,
    /// Sorted-by-date view, maintained incrementally.
    by_date: BTreeSet<(NaiveDate, EntryId)>,
    /// Keyed by name, so iteration is name-sorted.
    bookmarks: BTreeMap<String, Bookmark>,
    policy: BookmarkPolicy,
    dirty: bool,
}

impl Store {
    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Whether a container already exists at `path`.
    ///
    /// Lets the entry point decide between creating (prompt for the
    /// passphrase twice) and opening.
    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Create a new store and write the initial container.
    pub fn create(
        path: impl Into<PathBuf>,
        passphrase: &str,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        if path.exists() {
            return Err(StoreError::Io(format!(
                "{} already exists",
                path.display()
            )));
        }

        let params = options.kdf.unwrap_or_default();
        let salt = kdf::generate_salt();
        let master = kdf::derive_master_key(passphrase, &salt, &params)?;
        let keys = CipherKeys::derive(&master);
        let verifier = keys.verifier();

        let mut store = Self {
            path,
            kdf: params,
            salt,
            verifier,
            keys,
            nonce_counter: 0,
            next_entry_id: 1,
            entries: BTreeMap::new(),
            by_date: BTreeSet::new(),
            bookmarks: BTreeMap::new(),
            policy: options.bookmark_policy,
            dirty: true,
        };
        store.flush()?;
        debug!(path = %store.path.display(), "created store");
        Ok(store)
    }

    /// Open an existing container.
    ///
    /// The passphrase is checked against the verifier before any record is
    /// touched. Only the index is decrypted eagerly; entry bodies stay
    /// sealed in memory until requested.
    pub fn open(path: impl Into<PathBuf>, passphrase: &str) -> Result<Self, StoreError> {
        let path = path.into();
        let data = container::read_container(&path)?;
        let header = container::decode_header(&data)?;

        let master = kdf::derive_master_key(passphrase, &header.salt, &header.kdf)?;
        let keys = CipherKeys::derive(&master);
        if !keys.check_verifier(&header.verifier) {
            return Err(StoreError::PassphraseRejected);
        }

        let (index_rec, _) = container::decode_record_prefix(&data[HEADER_BYTES..])?;
        let index_plain = cipher::open(&keys, &index_rec.nonce, &index_rec.ciphertext, &index_rec.tag)
            .map_err(|_| StoreError::CorruptContainer("index authentication failed".into()))?;
        let index = codec::decode_index(&index_plain)
            .map_err(|_| StoreError::CorruptContainer("index payload malformed".into()))?;

        let mut entries = BTreeMap::new();
        let mut by_date = BTreeSet::new();
        for ie in &index.entries {
            let offset = usize::try_from(ie.offset)
                .map_err(|_| StoreError::CorruptContainer("record offset out of range".into()))?;
            let end = offset
                .checked_add(ie.length as usize)
                .filter(|&end| offset >= HEADER_BYTES && end <= data.len())
                .ok_or_else(|| StoreError::CorruptContainer("record outside container".into()))?;
            let record = container::decode_record_exact(&data[offset..end])?;
            entries.insert(
                ie.id,
                EntrySlot {
                    date: ie.date,
                    modified: ie.modified,
                    record,
                },
            );
            by_date.insert((ie.date, ie.id));
        }
        if entries.len() != index.entries.len() {
            return Err(StoreError::CorruptContainer(
                "duplicate entry id in index".into(),
            ));
        }

        let mut bookmarks = BTreeMap::new();
        for bm in index.bookmarks {
            if !bm.orphaned && !entries.contains_key(&bm.entry) {
                return Err(StoreError::CorruptContainer(format!(
                    "bookmark {} references missing entry {}",
                    bm.name, bm.entry
                )));
            }
            if bookmarks.insert(bm.name.clone(), bm).is_some() {
                return Err(StoreError::CorruptContainer(
                    "duplicate bookmark name in index".into(),
                ));
            }
        }

        debug!(
            path = %path.display(),
            entries = entries.len(),
            bookmarks = bookmarks.len(),
            "opened store"
        );
        Ok(Self {
            path,
            kdf: header.kdf,
            salt: header.salt,
            verifier: header.verifier,
            keys,
            nonce_counter: header.nonce_counter,
            next_entry_id: index.next_entry_id,
            entries,
            by_date,
            bookmarks,
            policy: index.policy,
            dirty: false,
        })
    }

    // -----------------------------------------------------------------------
    // Entries
    // -----------------------------------------------------------------------

    /// All entries ascending by (date, id). Restartable and deterministic.
    pub fn entries(&self) -> impl Iterator<Item = (EntryId, NaiveDate)> + '_ {
        self.by_date.iter().map(|&(date, id)| (id, date))
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Decrypt and return one entry on demand.
    pub fn read_entry(&self, id: EntryId) -> Result<Entry, StoreError> {
        let slot = self.entries.get(&id).ok_or(StoreError::NoSuchEntry(id))?;
        let plain = cipher::open(
            &self.keys,
            &slot.record.nonce,
            &slot.record.ciphertext,
            &slot.record.tag,
        )
        .map_err(|_| StoreError::IntegrityFailure(id))?;
        let entry = codec::decode_entry(&plain).map_err(|_| {
            StoreError::CorruptContainer(format!("entry {} payload malformed", id))
        })?;
        // The id embedded in the authenticated payload must match the index,
        // so records cannot be swapped between entries undetected.
        if entry.id != id {
            return Err(StoreError::CorruptContainer(format!(
                "entry record id mismatch: index {}, payload {}",
                id, entry.id
            )));
        }
        Ok(entry)
    }

    /// Create a new entry for the given diary date.
    pub fn new_entry(
        &mut self,
        date: NaiveDate,
        content: impl Into<String>,
    ) -> Result<Entry, StoreError> {
        let entry = Entry {
            id: EntryId::new(self.next_entry_id),
            date,
            content: content.into(),
            modified: now(),
        };
        let record = self.seal_entry(&entry)?;
        self.next_entry_id += 1;
        self.entries.insert(
            entry.id,
            EntrySlot {
                date,
                modified: entry.modified,
                record,
            },
        );
        self.by_date.insert((date, entry.id));
        self.dirty = true;
        debug!(id = %entry.id, %date, "new entry");
        Ok(entry)
    }

    /// Replace an entry's content. The id and diary date are unchanged; the
    /// modification stamp is updated.
    pub fn update_entry(
        &mut self,
        id: EntryId,
        content: impl Into<String>,
    ) -> Result<Entry, StoreError> {
        let date = self
            .entries
            .get(&id)
            .ok_or(StoreError::NoSuchEntry(id))?
            .date;
        let entry = Entry {
            id,
            date,
            content: content.into(),
            modified: now(),
        };
        let record = self.seal_entry(&entry)?;
        match self.entries.get_mut(&id) {
            Some(slot) => {
                slot.modified = entry.modified;
                slot.record = record;
            }
            None => return Err(StoreError::NoSuchEntry(id)),
        }
        self.dirty = true;
        debug!(%id, "updated entry");
        Ok(entry)
    }

    /// Delete an entry. Referencing bookmarks are removed or orphan-flagged
    /// per the store's bookmark policy.
    pub fn delete_entry(&mut self, id: EntryId) -> Result<(), StoreError> {
        let slot = self
            .entries
            .remove(&id)
            .ok_or(StoreError::NoSuchEntry(id))?;
        self.by_date.remove(&(slot.date, id));
        match self.policy {
            BookmarkPolicy::Cascade => {
                self.bookmarks.retain(|_, bm| bm.entry != id);
            }
            BookmarkPolicy::Orphan => {
                for bm in self.bookmarks.values_mut().filter(|bm| bm.entry == id) {
                    bm.orphaned = true;
                }
            }
        }
        self.dirty = true;
        debug!(%id, policy = ?self.policy, "deleted entry");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bookmarks
    // -----------------------------------------------------------------------

    /// Bookmarks sorted by name.
    pub fn bookmarks(&self) -> impl Iterator<Item = &Bookmark> + '_ {
        self.bookmarks.values()
    }

    pub fn add_bookmark(
        &mut self,
        name: impl Into<String>,
        id: EntryId,
    ) -> Result<Bookmark, StoreError> {
        let name = name.into();
        if !self.entries.contains_key(&id) {
            return Err(StoreError::NoSuchEntry(id));
        }
        if self.bookmarks.contains_key(&name) {
            return Err(StoreError::DuplicateName(name));
        }
        let bm = Bookmark {
            name,
            entry: id,
            orphaned: false,
        };
        self.bookmarks.insert(bm.name.clone(), bm.clone());
        self.dirty = true;
        Ok(bm)
    }

    pub fn rename_bookmark(
        &mut self,
        from: &str,
        to: impl Into<String>,
    ) -> Result<Bookmark, StoreError> {
        let to = to.into();
        if to != from && self.bookmarks.contains_key(&to) {
            return Err(StoreError::DuplicateName(to));
        }
        let mut bm = self
            .bookmarks
            .remove(from)
            .ok_or_else(|| StoreError::NoSuchBookmark(from.to_string()))?;
        bm.name = to;
        let renamed = bm.clone();
        self.bookmarks.insert(bm.name.clone(), bm);
        self.dirty = true;
        Ok(renamed)
    }

    pub fn remove_bookmark(&mut self, name: &str) -> Result<(), StoreError> {
        self.bookmarks
            .remove(name)
            .ok_or_else(|| StoreError::NoSuchBookmark(name.to_string()))?;
        self.dirty = true;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Serialize and atomically replace the container file.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let bytes = self.serialize()?;
        container::write_atomic(&self.path, &bytes)?;
        self.dirty = false;
        debug!(path = %self.path.display(), bytes = bytes.len(), "flushed container");
        Ok(())
    }

    /// Re-encrypt the whole container under a new passphrase.
    ///
    /// Every record is opened first; any integrity failure aborts before the
    /// file is touched. A fresh salt gives a fresh key, so the nonce counter
    /// restarts at zero.
    pub fn rekey(&mut self, new_passphrase: &str) -> Result<(), StoreError> {
        let mut decrypted = Vec::with_capacity(self.entries.len());
        for (&id, slot) in &self.entries {
            let plain = cipher::open(
                &self.keys,
                &slot.record.nonce,
                &slot.record.ciphertext,
                &slot.record.tag,
            )
            .map_err(|_| StoreError::IntegrityFailure(id))?;
            let entry = codec::decode_entry(&plain).map_err(|_| {
                StoreError::CorruptContainer(format!("entry {} payload malformed", id))
            })?;
            decrypted.push(entry);
        }

        let salt = kdf::generate_salt();
        let master = kdf::derive_master_key(new_passphrase, &salt, &self.kdf)?;
        let keys = CipherKeys::derive(&master);
        self.verifier = keys.verifier();
        self.salt = salt;
        self.keys = keys;
        self.nonce_counter = 0;

        for entry in &decrypted {
            let record = self.seal_entry(entry)?;
            if let Some(slot) = self.entries.get_mut(&entry.id) {
                slot.record = record;
            }
        }
        self.dirty = true;
        self.flush()?;
        debug!(path = %self.path.display(), "rekeyed store");
        Ok(())
    }

    /// Whether there are mutations not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bookmark_policy(&self) -> BookmarkPolicy {
        self.policy
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn next_nonce(&mut self) -> Result<[u8; NONCE_BYTES], StoreError> {
        let counter = self.nonce_counter;
        self.nonce_counter = counter.checked_add(1).ok_or(StoreError::NonceExhausted)?;
        Ok(cipher::nonce_for(counter))
    }

    fn seal_entry(&mut self, entry: &Entry) -> Result<SealedRecord, StoreError> {
        let payload =
            Zeroizing::new(codec::encode_entry(entry).map_err(|_| StoreError::RecordTooLarge)?);
        let nonce = self.next_nonce()?;
        let (ciphertext, tag) = cipher::seal(&self.keys, &nonce, &payload);
        Ok(SealedRecord {
            nonce,
            tag,
            ciphertext,
        })
    }

    fn serialize(&mut self) -> Result<Vec<u8>, StoreError> {
        // Two-pass index encoding: record offsets depend only on the index
        // record's size, which is independent of the offset values.
        let mut index = Index {
            policy: self.policy,
            next_entry_id: self.next_entry_id,
            entries: self
                .entries
                .iter()
                .map(|(&id, slot)| {
                    Ok(IndexEntry {
                        id,
                        date: slot.date,
                        modified: slot.modified,
                        offset: 0,
                        length: u32::try_from(slot.record.framed_len())
                            .map_err(|_| StoreError::RecordTooLarge)?,
                    })
                })
                .collect::<Result<Vec<_>, StoreError>>()?,
            bookmarks: self.bookmarks.values().cloned().collect(),
        };

        let probe = codec::encode_index(&index).map_err(|_| StoreError::RecordTooLarge)?;
        let mut offset = (HEADER_BYTES + RECORD_OVERHEAD + probe.len()) as u64;
        for ie in &mut index.entries {
            ie.offset = offset;
            offset += u64::from(ie.length);
        }

        let payload =
            Zeroizing::new(codec::encode_index(&index).map_err(|_| StoreError::RecordTooLarge)?);
        let nonce = self.next_nonce()?;
        let (ciphertext, tag) = cipher::seal(&self.keys, &nonce, &payload);
        let index_record = SealedRecord {
            nonce,
            tag,
            ciphertext,
        };

        let header = Header {
            kdf: self.kdf,
            salt: self.salt,
            verifier: self.verifier,
            nonce_counter: self.nonce_counter,
        };
        let mut out = container::encode_header(&header);
        container::encode_record(&mut out, &index_record)
            .map_err(|_| StoreError::RecordTooLarge)?;
        for slot in self.entries.values() {
            container::encode_record(&mut out, &slot.record)
                .map_err(|_| StoreError::RecordTooLarge)?;
        }
        Ok(out)
    }
}

/// Modification stamps use whole seconds so they survive the codec exactly.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
