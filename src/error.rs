//! Error taxonomy shared by every backend.
//!
//! The kinds below are the ones the design calls out: most are fatal and
//! force whichever component raised them into a terminal state, but
//! [`HoardError::NotDecodable`] is recoverable — callers may keep using the
//! component that returned it (see the append-only repository's `read`).

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HoardError {
    /// Read/write/force failure on the backing device. Fatal — the
    /// component that raised this must be closed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The backing device has no room left for the write that was attempted.
    #[error("no space left to write block")]
    NoSpace,

    /// A hard-coded format limit was hit (e.g. a block above 65,535 bytes).
    #[error("backend limit exceeded: {0}")]
    BackendLimit(String),

    /// Nothing exists at the path an `open` was attempted against.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed on-disk structure: bad magic, an impossible length, an
    /// offset that doesn't fit in the file, etc. Fatal at open/read time.
    #[error("format error: {0}")]
    Format(String),

    /// An encoding tag or payload couldn't be decoded. Recoverable — the
    /// component that returned this stays open and usable.
    #[error("not decodable: {0}")]
    NotDecodable(String),

    /// The host doesn't provide the hash primitive this build needs.
    #[error("hash algorithm unavailable: {0}")]
    AlgorithmMissing(String),

    /// A superblock referenced a child block that isn't present in the
    /// store. Fatal for the stream that hit it.
    #[error("missing block referenced by superblock: {0}")]
    MissingBlock(String),

    /// Programmer error: a write on a closed/read-only component, an
    /// oversize block, writing past `top_full`, etc. Never recovered.
    #[error("illegal state: {0}")]
    IllegalState(String),
}

pub type Result<T> = std::result::Result<T, HoardError>;
