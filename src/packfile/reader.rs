//! Packfile reader.
//!
//! Opens an existing packfile, validates its header, and loads the sorted
//! block table into memory. Lookups binary-search that table, then read the
//! payload with a positional read rather than a shared seek cursor, so a
//! single `PackfileReader` can be used concurrently from multiple threads
//! without external locking.
//!
//! Each thread additionally keeps a small direct-mapped cache of recent
//! lookups keyed by the low bits of the digest, cutting the binary search
//! for repeat reads of the same blocks.

use super::{Header, HEADER_SIZE};
use crate::block::BlockTableEntry;
use crate::codec;
use crate::error::{HoardError, Result};
use crate::hash::Digest;
use std::cell::RefCell;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;

const CACHE_SLOTS: usize = 1 << 16;

static NEXT_READER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy)]
struct CacheSlot {
    reader_id: u64,
    digest: Digest,
    entry_index: u32,
}

thread_local! {
    static ENTRY_CACHE: RefCell<Vec<Option<CacheSlot>>> = RefCell::new(vec![None; CACHE_SLOTS]);
}

fn cache_slot_for(digest: &Digest) -> usize {
    let bytes = digest.as_bytes();
    let mut h = 0u64;
    for chunk in bytes.chunks(8) {
        let mut buf = [0u8; 8];
        buf[..chunk.len()].copy_from_slice(chunk);
        h ^= u64::from_le_bytes(buf);
    }
    (h as usize) & (CACHE_SLOTS - 1)
}

pub struct PackfileReader {
    id: u64,
    file: File,
    entries: Vec<BlockTableEntry>,
}

impl PackfileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let header = Header::read(&mut file)?;

        let table_len = header.blocktable_length as usize;
        let mut table_buf = vec![0u8; table_len * crate::block::ENTRY_SIZE];
        read_exact_at(&file, header.blocktable_start, &mut table_buf)?;

        let mut entries = Vec::with_capacity(table_len);
        let mut cursor = &table_buf[..];
        while !cursor.is_empty() {
            if let Some(entry) = BlockTableEntry::read(&mut cursor)? {
                entries.push(entry);
            }
        }

        // The table on disk is already sorted by digest (the writer's
        // contract); a defensive sort keeps lookups correct even against a
        // packfile assembled by another, less careful, writer.
        entries.sort_by(|a, b| a.digest.compare(&b.digest));

        tracing::debug!(path = %path.display(), blocks = entries.len(), "packfile opened");

        Ok(PackfileReader {
            id: NEXT_READER_ID.fetch_add(1, Ordering::Relaxed),
            file,
            entries,
        })
    }

    /// Number of blocks indexed by this packfile.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.find_entry_index(digest).is_some()
    }

    /// Read and decode the block for `digest`, if present.
    pub fn read(&self, digest: &Digest) -> Result<Option<Vec<u8>>> {
        let Some(index) = self.find_entry_index(digest) else {
            return Ok(None);
        };
        let entry = &self.entries[index];

        let mut encoded = vec![0u8; entry.encoded_length as usize];
        let data_start = HEADER_SIZE as u64 + entry.payload_offset;
        read_exact_at(&self.file, data_start, &mut encoded)?;

        let decoded = codec::decode(entry.encoding, &encoded, entry.raw_length as usize)?;
        Ok(Some(decoded))
    }

    /// Iterate over every digest held by this packfile, in ascending order.
    pub fn enumerate(&self) -> impl Iterator<Item = &Digest> {
        self.entries.iter().map(|e| &e.digest)
    }

    fn find_entry_index(&self, digest: &Digest) -> Option<usize> {
        if let Some(cached) = self.cache_lookup(digest) {
            return Some(cached);
        }
        let index = self
            .entries
            .binary_search_by(|entry| entry.digest.compare(digest))
            .ok()?;
        self.cache_store(digest, index as u32);
        Some(index)
    }

    fn cache_lookup(&self, digest: &Digest) -> Option<usize> {
        let slot = cache_slot_for(digest);
        ENTRY_CACHE.with(|cache| {
            let cache = cache.borrow();
            match cache[slot] {
                Some(s) if s.reader_id == self.id && &s.digest == digest => Some(s.entry_index as usize),
                _ => None,
            }
        })
    }

    fn cache_store(&self, digest: &Digest, entry_index: u32) {
        let slot = cache_slot_for(digest);
        ENTRY_CACHE.with(|cache| {
            cache.borrow_mut()[slot] = Some(CacheSlot {
                reader_id: self.id,
                digest: *digest,
                entry_index,
            });
        });
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, offset: u64, buf: &mut [u8]) -> Result<()> {
    file.read_exact_at(buf, offset)
        .map_err(HoardError::from)
}

#[cfg(windows)]
fn read_exact_at(file: &File, offset: u64, buf: &mut [u8]) -> Result<()> {
    let mut total = 0usize;
    while total < buf.len() {
        let n = file.seek_read(&mut buf[total..], offset + total as u64)?;
        if n == 0 {
            return Err(HoardError::Format("unexpected end of packfile".into()));
        }
        total += n;
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn read_exact_at(file: &File, offset: u64, buf: &mut [u8]) -> Result<()> {
    use std::io::{Seek, SeekFrom};
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)?;
    Ok(())
}
