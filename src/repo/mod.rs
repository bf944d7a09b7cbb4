//! Append-only single-file repository with crash recovery.
//!
//! An alternative to the packfile when random appends and fsync-marked
//! durability are wanted over an immutable, pre-sealed container. Every
//! public operation locks a single mutex; there is no internal parallelism.
//!
//! ```text
//! BlockRecord:  "BLOCKHDR" | digest[32] | encoding[4] | raw:u16 | enc:u16 | payload[enc]
//! CommitRecord: "FSYNCEND"
//! ```
//!
//! On a writable open, the file is scanned from offset 0 and truncated to
//! the end of its last `FSYNCEND` marker — anything appended after the last
//! commit is assumed to be the debris of an interrupted write.

pub mod index;

use crate::codec::{self, Encoding};
use crate::error::{HoardError, Result};
use crate::hash::{Digest, DIGEST_LEN};
use crate::packfile::MAX_BLOCK_LEN;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use index::HashIndex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

pub const BLOCK_MAGIC: &[u8; 8] = b"BLOCKHDR";
pub const COMMIT_MAGIC: &[u8; 8] = b"FSYNCEND";
pub const BLOCK_HEADER_SIZE: usize = 48;

const ENCODING_RAW: u32 = 0x0000_0000;
const ENCODING_ZLIB: u32 = 0x5A4C_4942;

const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Debug, Clone, Copy)]
pub struct RepoOptions {
    pub writable: bool,
    pub level: u32,
}

impl Default for RepoOptions {
    fn default() -> Self {
        RepoOptions {
            writable: true,
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// What a writable open's recovery scan found and discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoverySummary {
    pub blocks_recovered: usize,
    pub bytes_discarded: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Readable,
    Writable,
    Closed,
}

struct Inner {
    file: Option<File>,
    mode: Mode,
    index: HashIndex,
    last_commit_offset: u64,
    recovery: RecoverySummary,
}

pub struct Repo {
    inner: Mutex<Inner>,
}

impl Repo {
    pub fn open<P: AsRef<Path>>(path: P, options: RepoOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut open_opts = OpenOptions::new();
        open_opts.read(true);
        if options.writable {
            open_opts.write(true).create(true);
        }
        let mut file = open_opts.open(path)?;

        let file_len = file.metadata()?.len();
        let scan = scan_records(&mut file, file_len)?;

        if options.writable {
            if scan.last_commit_offset < file_len {
                tracing::warn!(
                    discarded = file_len - scan.last_commit_offset,
                    "truncating uncommitted tail on recovery"
                );
                file.set_len(scan.last_commit_offset)?;
                file.seek(SeekFrom::Start(scan.last_commit_offset))?;
            }
        }

        let mode = if options.writable {
            Mode::Writable
        } else {
            Mode::Readable
        };

        Ok(Repo {
            inner: Mutex::new(Inner {
                file: Some(file),
                mode,
                index: scan.index,
                last_commit_offset: scan.last_commit_offset,
                recovery: RecoverySummary {
                    blocks_recovered: scan.blocks_recovered,
                    bytes_discarded: file_len - scan.last_commit_offset,
                },
            }),
        })
    }

    /// Diagnostic summary of the recovery scan performed at open time.
    pub fn recovery_summary(&self) -> RecoverySummary {
        self.inner.lock().unwrap().recovery
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.inner.lock().unwrap().index.contains(digest)
    }

    pub fn write(&self, bytes: &[u8]) -> Result<Digest> {
        if bytes.len() > MAX_BLOCK_LEN {
            return Err(HoardError::BackendLimit(format!(
                "block of {} bytes exceeds the {MAX_BLOCK_LEN}-byte maximum",
                bytes.len()
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        match inner.mode {
            Mode::Writable => {}
            Mode::Readable => {
                return Err(HoardError::IllegalState("repository is read-only".into()))
            }
            Mode::Closed => return Err(HoardError::IllegalState("repository is closed".into())),
        }

        let digest = Digest::of(bytes);
        if inner.index.contains(&digest) {
            return Ok(digest);
        }

        let (encoding, encoded) = codec::encode(DEFAULT_COMPRESSION_LEVEL, bytes);

        let write_result: Result<u64> = (|| {
            let file = inner.file.as_mut().expect("writable repo always has a file");
            let header_offset = file.seek(SeekFrom::End(0))?;
            write_block_record(
                file,
                &digest,
                encoding,
                bytes.len() as u16,
                encoded.len() as u16,
                &encoded,
            )?;
            Ok(header_offset)
        })();

        match write_result {
            Ok(header_offset) => {
                inner.index.insert(digest, header_offset);
                Ok(digest)
            }
            Err(e) => {
                tracing::warn!(error = %e, "write failed, closing repository");
                inner.file = None;
                inner.mode = Mode::Closed;
                Err(e)
            }
        }
    }

    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.mode {
            Mode::Writable => {}
            Mode::Readable => {
                return Err(HoardError::IllegalState("sync on a read-only repository".into()))
            }
            Mode::Closed => return Err(HoardError::IllegalState("repository is closed".into())),
        }

        let last_commit_offset = inner.last_commit_offset;
        let file = inner.file.as_mut().expect("writable repo always has a file");
        let end = file.seek(SeekFrom::End(0))?;
        if end == last_commit_offset {
            return Ok(());
        }

        file.write_all(COMMIT_MAGIC)?;
        file.sync_all()?;
        inner.last_commit_offset = end + COMMIT_MAGIC.len() as u64;
        Ok(())
    }

    pub fn read(&self, digest: &Digest) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.mode == Mode::Closed {
            return Err(HoardError::IllegalState("repository is closed".into()));
        }

        let Some(header_offset) = inner.index.get(digest) else {
            return Ok(None);
        };

        let file = inner.file.as_mut().expect("open repo always has a file");
        file.seek(SeekFrom::Start(header_offset))?;
        let record = read_block_record(file)?;
        let encoding = record
            .encoding
            .ok_or_else(|| HoardError::NotDecodable("unrecognised encoding tag".into()))?;

        let mut encoded = vec![0u8; record.encoded_length as usize];
        file.read_exact(&mut encoded)?;

        let decoded = codec::decode(encoding, &encoded, record.raw_length as usize)?;
        Ok(Some(decoded))
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.file = None;
        inner.mode = Mode::Closed;
    }
}

struct BlockRecord {
    digest: Digest,
    encoding: Option<Encoding>,
    raw_length: u16,
    encoded_length: u16,
}

fn write_block_record<W: Write>(
    mut w: W,
    digest: &Digest,
    encoding: Encoding,
    raw_length: u16,
    encoded_length: u16,
    payload: &[u8],
) -> std::io::Result<()> {
    w.write_all(BLOCK_MAGIC)?;
    w.write_all(digest.as_bytes())?;
    w.write_u32::<BigEndian>(encoding_tag(encoding))?;
    w.write_u16::<BigEndian>(raw_length)?;
    w.write_u16::<BigEndian>(encoded_length)?;
    w.write_all(payload)?;
    Ok(())
}

/// Parses header fields only; an unrecognised encoding tag is reported as
/// `encoding: None` rather than an error so callers that only need to skip
/// past the record (the recovery scan) can still do so. Callers that need
/// to actually decode the payload (`Repo::read`) turn a `None` into
/// [`HoardError::NotDecodable`] themselves.
fn read_block_record<R: Read>(mut r: R) -> Result<BlockRecord> {
    let mut digest = [0u8; DIGEST_LEN];
    r.read_exact(&mut digest)?;
    let tag = r.read_u32::<BigEndian>()?;
    let raw_length = r.read_u16::<BigEndian>()?;
    let encoded_length = r.read_u16::<BigEndian>()?;
    Ok(BlockRecord {
        digest: Digest::from(digest),
        encoding: decode_encoding_tag(tag),
        raw_length,
        encoded_length,
    })
}

fn encoding_tag(encoding: Encoding) -> u32 {
    match encoding {
        Encoding::Raw => ENCODING_RAW,
        Encoding::Zlib => ENCODING_ZLIB,
    }
}

fn decode_encoding_tag(tag: u32) -> Option<Encoding> {
    match tag {
        ENCODING_RAW => Some(Encoding::Raw),
        ENCODING_ZLIB => Some(Encoding::Zlib),
        _ => None,
    }
}

struct ScanResult {
    index: HashIndex,
    last_commit_offset: u64,
    blocks_recovered: usize,
}

/// Recovery scan: advance record by record from offset 0, holding
/// newly-seen blocks in `pending` until a commit marker flushes
/// them into the index. Anything still pending when the scan stops —
/// whether from EOF, a length mismatch, or an unreadable magic — is
/// discarded, and the file (in writable mode) is truncated to the last
/// commit offset by the caller.
fn scan_records(file: &mut File, file_len: u64) -> Result<ScanResult> {
    file.seek(SeekFrom::Start(0))?;

    let mut index = HashIndex::new();
    let mut pending: Vec<(Digest, u64)> = Vec::new();
    let mut last_commit_offset = 0u64;
    let mut pos = 0u64;

    loop {
        if file_len - pos < 8 {
            break;
        }
        let mut magic = [0u8; 8];
        file.read_exact(&mut magic)?;

        if &magic == COMMIT_MAGIC {
            for (digest, offset) in pending.drain(..) {
                index.insert(digest, offset);
            }
            pos += 8;
            last_commit_offset = pos;
        } else if &magic == BLOCK_MAGIC {
            if file_len - pos < BLOCK_HEADER_SIZE as u64 {
                break;
            }
            let record = match read_block_record(&mut *file) {
                Ok(r) => r,
                Err(_) => break,
            };

            if record.raw_length < record.encoded_length {
                break;
            }

            let header_offset = pos;
            let payload_end = pos + BLOCK_HEADER_SIZE as u64 + record.encoded_length as u64;
            if payload_end > file_len {
                break;
            }

            if record.encoding.is_some() {
                pending.push((record.digest, header_offset));
            } else {
                tracing::debug!(offset = header_offset, "skipping record with unrecognised encoding tag");
            }
            file.seek(SeekFrom::Start(payload_end))?;
            pos = payload_end;
        } else {
            break;
        }
    }

    let blocks_recovered = index.len();
    tracing::debug!(blocks_recovered, last_commit_offset, "recovery scan complete");

    Ok(ScanResult {
        index,
        last_commit_offset,
        blocks_recovered,
    })
}
