//! # hoard — content-addressed block store
//!
//! Format guarantees:
//! - All numeric fields in every on-disk format are big-endian.
//! - Blocks are addressed by the full 256-bit output of the host hash
//!   primitive (SHA3-256); the store never truncates or reuses a digest.
//! - A packfile, once dumped, is immutable; an append-only repository is
//!   the mutable alternative, durability marked by explicit commit records.
//! - Arbitrarily long byte streams are addressed by a single root digest via
//!   the superblock pointer-tree codec, itself built from ordinary blocks.

pub mod block;
pub mod chunker;
pub mod codec;
pub mod error;
pub mod hash;
pub mod packfile;
pub mod repo;
pub mod store;
pub mod superblock;

pub use block::BlockTableEntry;
pub use chunker::{Chunker, ChunkerParams};
pub use codec::Encoding;
pub use error::{HoardError, Result};
pub use hash::Digest;
pub use packfile::{PackfileCollection, PackfileReader, PackfileWriter};
pub use repo::{RecoverySummary, Repo, RepoOptions};
pub use store::{BlockStore, Hoard};
pub use superblock::{SuperblockReader, SuperblockWriter};
