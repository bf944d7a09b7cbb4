//! The `BlockStore` collaborator contract that superblock streams write to
//! and read from, plus [`Hoard`], a thin high-level facade composing an
//! append-only repository with the superblock stream codec.

use crate::error::Result;
use crate::hash::Digest;
use crate::repo::{Repo, RepoOptions};
use crate::superblock::{SuperblockReader, SuperblockWriter};
use std::io::Read as _;
use std::path::Path;

/// Anything a superblock stream can write blocks to and read blocks back
/// from. Implemented by [`Repo`]; a packfile writer/collection pair can also
/// satisfy it by composing `write` against the writer and `read` against the
/// already-dumped collection, left to the caller since the two have
/// different lifetimes.
pub trait BlockStore {
    fn write_block(&self, bytes: &[u8]) -> Result<Digest>;
    fn read_block(&self, digest: &Digest) -> Result<Option<Vec<u8>>>;
}

impl BlockStore for Repo {
    fn write_block(&self, bytes: &[u8]) -> Result<Digest> {
        self.write(bytes)
    }

    fn read_block(&self, digest: &Digest) -> Result<Option<Vec<u8>>> {
        self.read(digest)
    }
}

/// High-level convenience wrapping an append-only repository with the
/// superblock stream codec, so callers don't hand-wire the chunker and tree
/// bookkeeping themselves for every large write.
pub struct Hoard {
    repo: Repo,
}

impl Hoard {
    pub fn open<P: AsRef<Path>>(path: P, options: RepoOptions) -> Result<Self> {
        Ok(Hoard {
            repo: Repo::open(path, options)?,
        })
    }

    /// Write a single bounded block directly, bypassing the chunker.
    pub fn write_block(&self, bytes: &[u8]) -> Result<Digest> {
        self.repo.write(bytes)
    }

    pub fn read_block(&self, digest: &Digest) -> Result<Option<Vec<u8>>> {
        self.repo.read(digest)
    }

    pub fn contains_block(&self, digest: &Digest) -> bool {
        self.repo.contains(digest)
    }

    /// Stream `bytes` through the chunker and superblock writer, returning
    /// the root digest.
    pub fn write_stream(&self, bytes: &[u8]) -> Result<Digest> {
        let mut writer = SuperblockWriter::new(&self.repo);
        writer.write_all(bytes)?;
        writer.close()
    }

    /// Read back everything reachable from `root`.
    pub fn read_stream(&self, root: &Digest) -> Result<Vec<u8>> {
        let mut reader = SuperblockReader::new(&self.repo, *root);
        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        Ok(out)
    }

    pub fn sync(&self) -> Result<()> {
        self.repo.sync()
    }

    pub fn close(&self) {
        self.repo.close()
    }

    pub fn recovery_summary(&self) -> crate::repo::RecoverySummary {
        self.repo.recovery_summary()
    }
}
