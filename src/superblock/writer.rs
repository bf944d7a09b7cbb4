//! Superblock stream writer.
//!
//! Chunks an input byte stream with the content-defined chunker, writes
//! each chunk as a block through the underlying store, and accumulates the
//! resulting digests into a 1024-wide pointer tree up to 24 levels deep.

use super::{encode, MAX_FANOUT, MAX_HEIGHT};
use crate::chunker::{Chunker, ChunkerParams};
use crate::error::{HoardError, Result};
use crate::hash::Digest;
use crate::store::BlockStore;

const MIN_LEAF_FOR_BOUNDARY: usize = 4096;
const MAX_LEAF: usize = 65_535;

pub struct SuperblockWriter<'a, S: BlockStore> {
    store: &'a S,
    leaf_buffer: Vec<u8>,
    levels: Vec<Vec<Digest>>,
    chunker: Chunker,
    nonempty: bool,
    closed: bool,
    top_full: bool,
    final_hash: Option<Digest>,
}

impl<'a, S: BlockStore> SuperblockWriter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        SuperblockWriter {
            store,
            leaf_buffer: Vec::new(),
            levels: (0..MAX_HEIGHT).map(|_| Vec::new()).collect(),
            chunker: Chunker::new(ChunkerParams::default()),
            nonempty: false,
            closed: false,
            top_full: false,
            final_hash: None,
        }
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.closed {
            return Err(HoardError::IllegalState("write on a closed superblock stream".into()));
        }
        if self.top_full {
            return Err(HoardError::IllegalState("superblock tree has reached its height limit".into()));
        }

        self.leaf_buffer.push(byte);
        self.chunker.update(byte);
        self.nonempty = true;

        let at_boundary = self.leaf_buffer.len() >= MIN_LEAF_FOR_BOUNDARY && self.chunker.is_marker();
        let at_cap = self.leaf_buffer.len() == MAX_LEAF;
        if at_boundary || at_cap {
            self.flush_leaf()?;
        }
        Ok(())
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    fn flush_leaf(&mut self) -> Result<()> {
        let leaf = std::mem::take(&mut self.leaf_buffer);
        let digest = self.store.write_block(&leaf)?;
        self.levels[0].push(digest);
        self.promote()
    }

    /// Cascade full levels upward, emitting a pointer block for each level
    /// that has reached the fanout limit, until the first non-full level is
    /// reached. Level `MAX_HEIGHT - 1` has nowhere further to promote to;
    /// reaching capacity there latches `top_full` instead.
    fn promote(&mut self) -> Result<()> {
        let mut level = 0;
        while level < MAX_HEIGHT - 1 && self.levels[level].len() == MAX_FANOUT {
            let digest = self.write_level_block(level)?;
            tracing::debug!(level, "promoting full level to parent superblock");
            self.levels[level].clear();
            self.levels[level + 1].push(digest);
            level += 1;
        }
        if self.levels[MAX_HEIGHT - 1].len() == MAX_FANOUT {
            tracing::warn!(level = MAX_HEIGHT - 1, "superblock tree reached its height limit");
            self.top_full = true;
        }
        Ok(())
    }

    fn write_level_block(&self, level: usize) -> Result<Digest> {
        let bytes = encode(level as u8, &self.levels[level]);
        self.store.write_block(&bytes)
    }

    /// Flush any partial leaf, consolidate the remaining levels into a
    /// single root, and return its digest. Idempotent once called: a
    /// second call returns the same root without re-emitting blocks.
    pub fn close(&mut self) -> Result<Digest> {
        if let Some(root) = self.final_hash {
            return Ok(root);
        }

        if !self.leaf_buffer.is_empty() {
            self.flush_leaf()?;
        }
        if !self.nonempty {
            self.flush_leaf()?;
        }

        let max_level = (0..MAX_HEIGHT)
            .rev()
            .find(|&l| !self.levels[l].is_empty())
            .expect("at least one leaf was flushed above");

        let lower_levels_empty = (0..max_level).all(|l| self.levels[l].is_empty());

        let root = if max_level == 0 {
            self.write_level_block(0)?
        } else if self.levels[max_level].len() == 1 && lower_levels_empty {
            self.levels[max_level][0]
        } else {
            tracing::debug!(max_level, "consolidating pending levels into root");
            for level in 0..max_level {
                if !self.levels[level].is_empty() {
                    let digest = self.write_level_block(level)?;
                    self.levels[level].clear();
                    self.levels[level + 1].push(digest);
                }
            }
            self.write_level_block(max_level)?
        };

        self.closed = true;
        self.final_hash = Some(root);
        Ok(root)
    }

    /// The root digest, available only after [`Self::close`].
    pub fn hash(&self) -> Option<Digest> {
        self.final_hash
    }
}
