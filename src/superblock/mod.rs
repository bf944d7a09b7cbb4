//! Superblock pointer-tree stream codec.
//!
//! A superblock is a pointer block: a small header plus up to 1024 child
//! digests. Level 0 superblocks point at data payload blocks; level `n > 0`
//! superblocks point at level `n-1` superblocks. Chaining levels gives a
//! balanced tree capable of addressing arbitrarily long streams while
//! keeping any single block bounded at 65 535 bytes.

mod reader;
mod writer;

pub use reader::SuperblockReader;
pub use writer::SuperblockWriter;

use crate::error::{HoardError, Result};
use crate::hash::{Digest, DIGEST_LEN};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const MAGIC: &[u8; 8] = b"SUPERBLK";
pub const HEADER_SIZE: usize = 12;
pub const MAX_FANOUT: usize = 1024;
pub const MAX_HEIGHT: usize = 24;

#[derive(Debug, Clone)]
pub struct Header {
    pub level: u8,
    pub count: u16,
}

impl Header {
    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_u8(self.level)?;
        w.write_u8(0)?;
        w.write_u16::<BigEndian>(self.count)?;
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(HoardError::Format("bad superblock magic".into()));
        }
        let level = r.read_u8()?;
        let _reserved = r.read_u8()?;
        let count = r.read_u16::<BigEndian>()?;
        if count as usize > MAX_FANOUT {
            return Err(HoardError::Format(format!(
                "superblock count {count} exceeds fanout {MAX_FANOUT}"
            )));
        }
        Ok(Header { level, count })
    }
}

/// Serialize a level's pointer block: header followed by `digests`.
pub fn encode(level: u8, digests: &[Digest]) -> Vec<u8> {
    let header = Header {
        level,
        count: digests.len() as u16,
    };
    let mut out = Vec::with_capacity(HEADER_SIZE + digests.len() * DIGEST_LEN);
    header.write(&mut out).expect("write to Vec never fails");
    for d in digests {
        out.extend_from_slice(d.as_bytes());
    }
    out
}

/// Parse a pointer block back into its header and digest list.
pub fn decode(bytes: &[u8]) -> Result<(Header, Vec<Digest>)> {
    let mut cursor = bytes;
    let header = Header::read(&mut cursor)?;
    let expected_len = HEADER_SIZE + header.count as usize * DIGEST_LEN;
    if bytes.len() != expected_len {
        return Err(HoardError::Format(format!(
            "superblock body length {} does not match header (expected {expected_len})",
            bytes.len()
        )));
    }
    let mut digests = Vec::with_capacity(header.count as usize);
    for _ in 0..header.count {
        let mut buf = [0u8; DIGEST_LEN];
        cursor.read_exact(&mut buf)?;
        digests.push(Digest::from(buf));
    }
    Ok((header, digests))
}
