//! Packfile collection.
//!
//! An ordered sequence of [`PackfileReader`]s treated as a single logical
//! store: `read`/`contains` check readers in registration order and return
//! on the first hit, so earlier packfiles shadow later ones holding the
//! same digest. `add_dir` walks a directory tree looking for packfiles,
//! silently skipping anything that doesn't open as one — collections are
//! built by pointing at a directory of otherwise-unrelated files.

use super::PackfileReader;
use crate::error::Result;
use crate::hash::Digest;
use std::path::Path;

pub struct PackfileCollection {
    readers: Vec<PackfileReader>,
}

impl PackfileCollection {
    pub fn new() -> Self {
        PackfileCollection { readers: Vec::new() }
    }

    /// Append one already-opened reader to the end of the search order.
    pub fn add(&mut self, reader: PackfileReader) {
        self.readers.push(reader);
    }

    /// Open `path` as a packfile and append it, bubbling up any open error.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let reader = PackfileReader::open(path)?;
        self.readers.push(reader);
        Ok(())
    }

    /// Recursively walk `dir`, opening every regular file as a packfile and
    /// adding the ones that parse. Files that aren't valid packfiles — or
    /// can't be opened at all — are skipped rather than causing the whole
    /// call to fail; entries are visited in directory order so the same
    /// tree always yields the same search order.
    pub fn add_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                self.add_dir(&path)?;
            } else if let Ok(reader) = PackfileReader::open(&path) {
                self.readers.push(reader);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.readers.iter().any(|r| r.contains(digest))
    }

    /// Return the first matching block, checking readers in registration
    /// order.
    pub fn read(&self, digest: &Digest) -> Result<Option<Vec<u8>>> {
        for reader in &self.readers {
            if let Some(bytes) = reader.read(digest)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    /// Drop every reader held by this collection, releasing their file
    /// handles.
    pub fn close(&mut self) {
        self.readers.clear();
    }
}

impl Default for PackfileCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packfile::PackfileWriter;

    fn dump_pack(dir: &Path, name: &str, blocks: &[&[u8]]) {
        let mut w = PackfileWriter::new();
        for b in blocks {
            w.write(b).unwrap();
        }
        w.dump(dir.join(name)).unwrap();
    }

    #[test]
    fn earlier_reader_shadows_later_one() {
        let dir = tempfile::tempdir().unwrap();
        dump_pack(dir.path(), "a.pack", &[b"shared"]);
        dump_pack(dir.path(), "b.pack", &[b"shared", b"only-in-b"]);

        let mut collection = PackfileCollection::new();
        collection.add_file(dir.path().join("a.pack")).unwrap();
        collection.add_file(dir.path().join("b.pack")).unwrap();

        let shared = Digest::of(b"shared");
        let only_b = Digest::of(b"only-in-b");
        assert_eq!(collection.read(&shared).unwrap().unwrap(), b"shared");
        assert_eq!(collection.read(&only_b).unwrap().unwrap(), b"only-in-b");
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn add_dir_skips_non_packfiles() {
        let dir = tempfile::tempdir().unwrap();
        dump_pack(dir.path(), "real.pack", &[b"hello"]);
        std::fs::write(dir.path().join("not-a-pack.txt"), b"garbage").unwrap();

        let mut collection = PackfileCollection::new();
        collection.add_dir(dir.path()).unwrap();

        assert_eq!(collection.len(), 1);
        assert!(collection.contains(&Digest::of(b"hello")));
    }

    #[test]
    fn close_drops_all_readers() {
        let dir = tempfile::tempdir().unwrap();
        dump_pack(dir.path(), "a.pack", &[b"x"]);
        let mut collection = PackfileCollection::new();
        collection.add_file(dir.path().join("a.pack")).unwrap();
        collection.close();
        assert!(collection.is_empty());
    }
}
