//! Packfile format and codec.
//!
//! An immutable, self-describing container bundling many deduplicated
//! blocks, their metadata, and a sorted index enabling binary-search lookup
//! by digest. Layout: `[Header(64) | DataArea (padded to 64) | BlockTable]`.

mod collection;
mod reader;
mod writer;

pub use collection::PackfileCollection;
pub use reader::PackfileReader;
pub use writer::PackfileWriter;

use crate::error::{HoardError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const MAGIC: &[u8; 8] = b"Hoard v1";
pub const HEADER_SIZE: usize = 64;

/// Maximum payload size for a single block.
pub const MAX_BLOCK_LEN: usize = 65_535;

#[derive(Debug, Clone)]
pub struct Header {
    pub blocktable_start: u64,
    pub blocktable_length: u32,
}

impl Header {
    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_i64::<BigEndian>(self.blocktable_start as i64)?;
        w.write_i32::<BigEndian>(self.blocktable_length as i32)?;
        w.write_all(&[0u8; 44])?;
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(HoardError::Format("bad packfile magic".into()));
        }
        let blocktable_start = r.read_i64::<BigEndian>()?;
        let blocktable_length = r.read_i32::<BigEndian>()?;
        let mut reserved = [0u8; 44];
        r.read_exact(&mut reserved)?;

        if blocktable_start < 0 {
            return Err(HoardError::Format("negative blocktable_start".into()));
        }
        if blocktable_length < 0 {
            return Err(HoardError::Format("negative blocktable_length".into()));
        }

        Ok(Header {
            blocktable_start: blocktable_start as u64,
            blocktable_length: blocktable_length as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let h = Header {
            blocktable_start: 4096,
            blocktable_length: 17,
        };
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        let parsed = Header::read(&buf[..]).unwrap();
        assert_eq!(parsed.blocktable_start, h.blocktable_start);
        assert_eq!(parsed.blocktable_length, h.blocktable_length);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = [0u8; HEADER_SIZE];
        assert!(Header::read(&buf[..]).is_err());
    }
}
