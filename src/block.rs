//! Block-table entry — the fixed 64-byte record the packfile's block table
//! is built from.
//!
//! ```text
//! Offset  Size  Field
//!    0     32   digest
//!   32      8   encoding_tag   RAW = 0x00..00, ZLIB = 0x00 00 00 00 5A 4C 49 42
//!   40      4   raw_length     int32
//!   44      4   encoded_length int32
//!   48      8   payload_offset int64 (relative to the start of the data area)
//!   56      8   reserved       = 0
//! ```
//! All multi-byte integers are big-endian. An entry with an
//! encoding tag this build doesn't recognise is skipped by readers rather
//! than treated as format corruption — future encodings can be added
//! without breaking old readers on files that don't use them.

use crate::codec::Encoding;
use crate::error::{HoardError, Result};
use crate::hash::{Digest, DIGEST_LEN};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const ENTRY_SIZE: usize = 64;

const TAG_RAW: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 0];
const TAG_ZLIB: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x5A, 0x4C, 0x49, 0x42];

#[derive(Debug, Clone)]
pub struct BlockTableEntry {
    pub digest: Digest,
    pub encoding: Encoding,
    pub raw_length: u32,
    pub encoded_length: u32,
    pub payload_offset: u64,
}

impl BlockTableEntry {
    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(self.digest.as_bytes())?;
        w.write_all(match self.encoding {
            Encoding::Raw => &TAG_RAW,
            Encoding::Zlib => &TAG_ZLIB,
        })?;
        w.write_i32::<BigEndian>(self.raw_length as i32)?;
        w.write_i32::<BigEndian>(self.encoded_length as i32)?;
        w.write_i64::<BigEndian>(self.payload_offset as i64)?;
        w.write_all(&[0u8; 8])?;
        Ok(())
    }

    /// Parse one 64-byte entry. Returns `Ok(None)` for an entry whose
    /// encoding tag isn't recognised — callers skip these rather than
    /// treating them as a format error.
    pub fn read<R: Read>(mut r: R) -> Result<Option<Self>> {
        let mut digest = [0u8; DIGEST_LEN];
        r.read_exact(&mut digest)?;
        let mut tag = [0u8; 8];
        r.read_exact(&mut tag)?;
        let raw_length = r.read_i32::<BigEndian>()?;
        let encoded_length = r.read_i32::<BigEndian>()?;
        let payload_offset = r.read_i64::<BigEndian>()?;
        let mut reserved = [0u8; 8];
        r.read_exact(&mut reserved)?;

        let encoding = if tag == TAG_RAW {
            Encoding::Raw
        } else if tag == TAG_ZLIB {
            Encoding::Zlib
        } else {
            return Ok(None);
        };

        if encoded_length > raw_length {
            return Err(HoardError::Format(format!(
                "block table entry has encoded_length {encoded_length} > raw_length {raw_length}"
            )));
        }
        if payload_offset < 0 {
            return Err(HoardError::Format("block table entry has negative payload_offset".into()));
        }

        Ok(Some(BlockTableEntry {
            digest: Digest::from(digest),
            encoding,
            raw_length: raw_length as u32,
            encoded_length: encoded_length as u32,
            payload_offset: payload_offset as u64,
        }))
    }
}

/// Round a byte count up to the next multiple of 64, over a 64-bit width
/// throughout so large offsets never truncate.
pub fn round_up_64(n: u64) -> u64 {
    (n + 63) & !63
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_roundtrip() {
        let entry = BlockTableEntry {
            digest: Digest::of(b"payload"),
            encoding: Encoding::Zlib,
            raw_length: 100,
            encoded_length: 42,
            payload_offset: 1234,
        };
        let mut buf = Vec::new();
        entry.write(&mut buf).unwrap();
        assert_eq!(buf.len(), ENTRY_SIZE);
        let parsed = BlockTableEntry::read(&buf[..]).unwrap().unwrap();
        assert_eq!(parsed.digest, entry.digest);
        assert_eq!(parsed.encoding, entry.encoding);
        assert_eq!(parsed.raw_length, entry.raw_length);
        assert_eq!(parsed.encoded_length, entry.encoded_length);
        assert_eq!(parsed.payload_offset, entry.payload_offset);
    }

    #[test]
    fn unknown_encoding_tag_is_skipped_not_error() {
        let mut buf = vec![0u8; ENTRY_SIZE];
        buf[32..40].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]); // unrecognised tag
        assert!(BlockTableEntry::read(&buf[..]).unwrap().is_none());
    }

    #[test]
    fn round_up_64_values() {
        assert_eq!(round_up_64(0), 0);
        assert_eq!(round_up_64(1), 64);
        assert_eq!(round_up_64(64), 64);
        assert_eq!(round_up_64(65), 128);
    }
}
