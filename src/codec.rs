//! Plaintext payload layouts (container v1)
//!
//! Entry body:
//!   version[1] || id[8] || date_len[2] || date || content_len[4] || content
//!   || modified[8]
//!
//! Index:
//!   version[1] || policy[1] || next_entry_id[8]
//!   || entry_count[4] || { id[8] || date_len[2] || date || modified[8]
//!                          || offset[8] || length[4] }*
//!   || bookmark_count[4] || { name_len[2] || name || entry_id[8] || flags[1] }*
//!
//! Dates are ISO-8601 (`YYYY-MM-DD`), timestamps unix seconds, all integers
//! big-endian. Both layouts are version-tagged so fields can be added
//! without breaking old ciphertexts once decrypted.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{DecodeError, EncodeError};
use crate::types::{Bookmark, BookmarkPolicy, Entry, EntryId};

/// Version tag shared by both payload layouts.
pub const PAYLOAD_VERSION: u8 = 0x01;

const DATE_FORMAT: &str = "%Y-%m-%d";

const FLAG_ORPHANED: u8 = 0x01;
const POLICY_CASCADE: u8 = 0x00;
const POLICY_ORPHAN: u8 = 0x01;

// ---------------------------------------------------------------------------
// Index structures
// ---------------------------------------------------------------------------

/// Index row describing one sealed entry body within the container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: EntryId,
    pub date: NaiveDate,
    pub modified: DateTime<Utc>,
    /// Absolute file offset of the framed record.
    pub offset: u64,
    /// Framed record length, including nonce, tag, and length prefix.
    pub length: u32,
}

/// Decrypted index payload: entry directory plus bookmarks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Index {
    pub policy: BookmarkPolicy,
    pub next_entry_id: u64,
    pub entries: Vec<IndexEntry>,
    pub bookmarks: Vec<Bookmark>,
}

// ---------------------------------------------------------------------------
// Entry body payload
// ---------------------------------------------------------------------------

pub fn encode_entry(entry: &Entry) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(1 + 8 + 2 + 10 + 4 + entry.content.len() + 8);
    out.push(PAYLOAD_VERSION);
    out.extend_from_slice(&entry.id.as_u64().to_be_bytes());
    put_date(&mut out, entry.date)?;
    put_bytes_u32(&mut out, entry.content.as_bytes())?;
    out.extend_from_slice(&entry.modified.timestamp().to_be_bytes());
    Ok(out)
}

pub fn decode_entry(data: &[u8]) -> Result<Entry, DecodeError> {
    let mut r = Reader::new(data);
    if r.u8()? != PAYLOAD_VERSION {
        return Err(DecodeError);
    }
    let id = EntryId::new(r.u64()?);
    let date = read_date(&mut r)?;
    let content_len = r.u32()? as usize;
    let content = String::from_utf8(r.take(content_len)?.to_vec()).map_err(|_| DecodeError)?;
    let modified = read_timestamp(&mut r)?;
    r.finish()?;
    Ok(Entry {
        id,
        date,
        content,
        modified,
    })
}

// ---------------------------------------------------------------------------
// Index payload
// ---------------------------------------------------------------------------

pub fn encode_index(index: &Index) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    out.push(PAYLOAD_VERSION);
    out.push(match index.policy {
        BookmarkPolicy::Cascade => POLICY_CASCADE,
        BookmarkPolicy::Orphan => POLICY_ORPHAN,
    });
    out.extend_from_slice(&index.next_entry_id.to_be_bytes());

    let entry_count = u32::try_from(index.entries.len()).map_err(|_| EncodeError)?;
    out.extend_from_slice(&entry_count.to_be_bytes());
    for ie in &index.entries {
        out.extend_from_slice(&ie.id.as_u64().to_be_bytes());
        put_date(&mut out, ie.date)?;
        out.extend_from_slice(&ie.modified.timestamp().to_be_bytes());
        out.extend_from_slice(&ie.offset.to_be_bytes());
        out.extend_from_slice(&ie.length.to_be_bytes());
    }

    let bookmark_count = u32::try_from(index.bookmarks.len()).map_err(|_| EncodeError)?;
    out.extend_from_slice(&bookmark_count.to_be_bytes());
    for bm in &index.bookmarks {
        put_bytes_u16(&mut out, bm.name.as_bytes())?;
        out.extend_from_slice(&bm.entry.as_u64().to_be_bytes());
        out.push(if bm.orphaned { FLAG_ORPHANED } else { 0 });
    }
    Ok(out)
}

pub fn decode_index(data: &[u8]) -> Result<Index, DecodeError> {
    let mut r = Reader::new(data);
    if r.u8()? != PAYLOAD_VERSION {
        return Err(DecodeError);
    }
    let policy = match r.u8()? {
        POLICY_CASCADE => BookmarkPolicy::Cascade,
        POLICY_ORPHAN => BookmarkPolicy::Orphan,
        _ => return Err(DecodeError),
    };
    let next_entry_id = r.u64()?;

    let entry_count = r.u32()?;
    let mut entries = Vec::new();
    for _ in 0..entry_count {
        let id = EntryId::new(r.u64()?);
        let date = read_date(&mut r)?;
        let modified = read_timestamp(&mut r)?;
        let offset = r.u64()?;
        let length = r.u32()?;
        entries.push(IndexEntry {
            id,
            date,
            modified,
            offset,
            length,
        });
    }

    let bookmark_count = r.u32()?;
    let mut bookmarks = Vec::new();
    for _ in 0..bookmark_count {
        let name_len = r.u16()? as usize;
        let name = String::from_utf8(r.take(name_len)?.to_vec()).map_err(|_| DecodeError)?;
        let entry = EntryId::new(r.u64()?);
        let flags = r.u8()?;
        if flags & !FLAG_ORPHANED != 0 {
            return Err(DecodeError);
        }
        bookmarks.push(Bookmark {
            name,
            entry,
            orphaned: flags & FLAG_ORPHANED != 0,
        });
    }
    r.finish()?;
    Ok(Index {
        policy,
        next_entry_id,
        entries,
        bookmarks,
    })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn put_bytes_u16(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), EncodeError> {
    let len = u16::try_from(bytes.len()).map_err(|_| EncodeError)?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn put_bytes_u32(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), EncodeError> {
    let len = u32::try_from(bytes.len()).map_err(|_| EncodeError)?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn put_date(out: &mut Vec<u8>, date: NaiveDate) -> Result<(), EncodeError> {
    put_bytes_u16(out, date.format(DATE_FORMAT).to_string().as_bytes())
}

fn read_date(r: &mut Reader<'_>) -> Result<NaiveDate, DecodeError> {
    let len = r.u16()? as usize;
    let raw = r.take(len)?;
    let s = core::str::from_utf8(raw).map_err(|_| DecodeError)?;
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| DecodeError)
}

fn read_timestamp(r: &mut Reader<'_>) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp(r.i64()?, 0).ok_or(DecodeError)
}

/// Bounds-checked cursor over a payload slice. Trailing bytes are an error.
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.data.len() < n {
            return Err(DecodeError);
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.take(N)?.try_into().map_err(|_| DecodeError)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    fn finish(self) -> Result<(), DecodeError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(DecodeError)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
