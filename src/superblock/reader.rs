//! Superblock stream reader.
//!
//! Traverses a pointer tree depth-first from a root digest, yielding the
//! concatenated payloads of the leaf blocks it reaches. Exposed as a
//! [`std::io::Read`] so callers can pull bytes incrementally or drain the
//! whole stream with `read_to_end`.

use super::decode;
use crate::error::{HoardError, Result};
use crate::hash::Digest;
use crate::store::BlockStore;
use std::io;

struct Frame {
    level: u8,
    digests: Vec<Digest>,
    cursor: usize,
}

pub struct SuperblockReader<'a, S: BlockStore> {
    store: &'a S,
    root: Digest,
    stack: Vec<Frame>,
    current: Option<(Vec<u8>, usize)>,
    started: bool,
}

impl<'a, S: BlockStore> SuperblockReader<'a, S> {
    pub fn new(store: &'a S, root: Digest) -> Self {
        SuperblockReader {
            store,
            root,
            stack: Vec::new(),
            current: None,
            started: false,
        }
    }

    fn fetch_frame(&self, digest: &Digest) -> Result<Frame> {
        let bytes = self
            .store
            .read_block(digest)?
            .ok_or_else(|| HoardError::MissingBlock(digest.to_hex()))?;
        let (header, digests) = decode(&bytes)?;
        Ok(Frame {
            level: header.level,
            digests,
            cursor: 0,
        })
    }

    /// Advance the traversal to the next leaf block's bytes, or `None` once
    /// the tree is exhausted.
    fn next_block(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.started {
            let root_frame = self.fetch_frame(&self.root)?;
            self.stack.push(root_frame);
            self.started = true;
        }

        loop {
            while let Some(top) = self.stack.last() {
                if top.cursor >= top.digests.len() {
                    self.stack.pop();
                } else {
                    break;
                }
            }
            if self.stack.is_empty() {
                return Ok(None);
            }

            while self.stack.last().unwrap().level > 0 {
                let child_digest = {
                    let top = self.stack.last_mut().unwrap();
                    let d = top.digests[top.cursor];
                    top.cursor += 1;
                    d
                };
                let child = self.fetch_frame(&child_digest)?;
                self.stack.push(child);
            }

            let top = self.stack.last_mut().unwrap();
            if top.cursor >= top.digests.len() {
                continue;
            }
            let leaf_digest = top.digests[top.cursor];
            top.cursor += 1;

            let bytes = self
                .store
                .read_block(&leaf_digest)?
                .ok_or_else(|| HoardError::MissingBlock(leaf_digest.to_hex()))?;
            return Ok(Some(bytes));
        }
    }
}

impl<'a, S: BlockStore> io::Read for SuperblockReader<'a, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if let Some((data, pos)) = &mut self.current {
                if *pos < data.len() {
                    let n = (data.len() - *pos).min(buf.len());
                    buf[..n].copy_from_slice(&data[*pos..*pos + n]);
                    *pos += n;
                    return Ok(n);
                }
                self.current = None;
            }

            match self
                .next_block()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
            {
                Some(bytes) => self.current = Some((bytes, 0)),
                None => return Ok(0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::SuperblockWriter;
    use super::*;
    use crate::repo::{Repo, RepoOptions};
    use std::io::Read;

    fn store() -> (tempfile::TempDir, Repo) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repo::open(dir.path().join("repo.bin"), RepoOptions::default()).unwrap();
        (dir, repo)
    }

    #[test]
    fn roundtrip_small_payload() {
        let (_dir, repo) = store();
        let mut w = SuperblockWriter::new(&repo);
        w.write_all(b"Hello, world!").unwrap();
        let root = w.close().unwrap();

        let mut r = SuperblockReader::new(&repo, root);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"Hello, world!");
    }

    #[test]
    fn roundtrip_large_payload_spans_many_leaves() {
        let (_dir, repo) = store();
        let mut w = SuperblockWriter::new(&repo);

        let mut state: u32 = 42;
        let mut input = Vec::with_capacity(512 * 1024);
        for _ in 0..512 * 1024 {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            input.push((state >> 16) as u8);
        }
        w.write_all(&input).unwrap();
        let root = w.close().unwrap();

        let mut r = SuperblockReader::new(&repo, root);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn missing_block_is_an_error() {
        let (_dir, repo) = store();
        let bogus_root = crate::hash::Digest::of(b"never written");
        let mut r = SuperblockReader::new(&repo, bogus_root);
        let mut out = Vec::new();
        assert!(r.read_to_end(&mut out).is_err());
    }
}
