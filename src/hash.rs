//! Digest primitive.
//!
//! A [`Digest`] is the full 256-bit output of the host hash family
//! (SHA3-256 here; the rest of the system treats the primitive as a black
//! box). Ordering is unsigned lexicographic byte comparison, which
//! `[u8; 32]`'s derived `Ord` already gives us.

use crate::error::{HoardError, Result};
use sha3::{Digest as _, Sha3_256};
use std::cmp::Ordering;
use std::fmt;

/// Byte length of a digest. Every key in the system is this wide.
pub const DIGEST_LEN: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl Digest {
    pub fn zero() -> Self {
        Digest([0u8; DIGEST_LEN])
    }

    /// Hash `bytes` with the host primitive.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(bytes);
        let out: [u8; DIGEST_LEN] = hasher.finalize().into();
        Digest(out)
    }

    /// Unsigned lexicographic comparison; shorter-prefix-first ordering on
    /// otherwise-equal shared prefixes doesn't arise since digests are
    /// fixed-width, but this mirrors the contract's wording exactly.
    pub fn compare(&self, other: &Digest) -> Ordering {
        self.0.cmp(&other.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Requires an even number of hex nibbles producing exactly
    /// [`DIGEST_LEN`] bytes. Upper and lower case are both accepted (the
    /// `hex` crate already does this).
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| HoardError::Format(format!("invalid hex digest: {e}")))?;
        if bytes.len() != DIGEST_LEN {
            return Err(HoardError::Format(format!(
                "digest must be {DIGEST_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&bytes);
        Ok(Digest(out))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Digest(bytes)
    }
}
