//! Packfile writer.
//!
//! Accumulates deduplicated blocks in memory (digest → block-table entry,
//! plus the growing data-area buffer) and emits a sorted packfile on
//! `dump`. Single-threaded; callers must synchronize externally if shared.

use super::{Header, HEADER_SIZE, MAX_BLOCK_LEN};
use crate::block::BlockTableEntry;
use crate::codec;
use crate::error::{HoardError, Result};
use crate::hash::Digest;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    /// DEFLATE level passed to the compression codec (0-9).
    pub level: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions { level: 6 }
    }
}

pub struct PackfileWriter {
    options: WriterOptions,
    data: Vec<u8>,
    order: Vec<Digest>,
    entries: HashMap<Digest, BlockTableEntry>,
}

impl PackfileWriter {
    pub fn new() -> Self {
        Self::with_options(WriterOptions::default())
    }

    pub fn with_options(options: WriterOptions) -> Self {
        PackfileWriter {
            options,
            data: Vec::new(),
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    /// Compute the digest of `bytes`, deduplicate against already-written
    /// blocks, and otherwise compress and buffer the payload. Returns the
    /// digest either way.
    pub fn write(&mut self, bytes: &[u8]) -> Result<Digest> {
        if bytes.len() > MAX_BLOCK_LEN {
            return Err(HoardError::BackendLimit(format!(
                "block of {} bytes exceeds the {MAX_BLOCK_LEN}-byte maximum",
                bytes.len()
            )));
        }

        let digest = Digest::of(bytes);
        if self.entries.contains_key(&digest) {
            return Ok(digest);
        }

        let (encoding, encoded) = codec::encode(self.options.level, bytes);
        let payload_offset = self.data.len() as u64;
        self.data.extend_from_slice(&encoded);

        let entry = BlockTableEntry {
            digest,
            encoding,
            raw_length: bytes.len() as u32,
            encoded_length: encoded.len() as u32,
            payload_offset,
        };
        self.entries.insert(digest, entry);
        self.order.push(digest);

        Ok(digest)
    }

    /// Number of distinct blocks buffered so far.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Serialize to a brand new file at `path`. Fails if the path already
    /// exists — packfiles are never overwritten in place.
    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        let result = self.dump_to(&mut file);
        match &result {
            Ok(()) => tracing::debug!(path = %path.display(), blocks = self.len(), "packfile dumped"),
            Err(error) => tracing::warn!(path = %path.display(), %error, "packfile dump failed"),
        }
        result
    }

    /// As [`Self::dump`], but writes to an arbitrary `Write` — used by
    /// tests and by callers composing with an in-memory buffer.
    pub fn dump_to<W: Write>(&self, mut w: W) -> Result<()> {
        let blocktable_start = crate::block::round_up_64(HEADER_SIZE as u64 + self.data.len() as u64);

        let header = Header {
            blocktable_start,
            blocktable_length: self.order.len() as u32,
        };
        header.write(&mut w)?;
        w.write_all(&self.data)?;

        let padding = blocktable_start - (HEADER_SIZE as u64 + self.data.len() as u64);
        w.write_all(&vec![0u8; padding as usize])?;

        let mut sorted: Vec<&Digest> = self.order.iter().collect();
        sorted.sort_by(|a, b| a.compare(b));
        for digest in sorted {
            let entry = &self.entries[digest];
            entry.write(&mut w)?;
        }

        Ok(())
    }
}

impl Default for PackfileWriter {
    fn default() -> Self {
        Self::new()
    }
}
