use hoard::{Digest, Hoard, PackfileCollection, PackfileWriter, RepoOptions};
use tempfile::{tempdir, NamedTempFile};

#[test]
fn packfile_roundtrip_hello_world() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();
    std::fs::remove_file(&path).unwrap();

    let mut writer = PackfileWriter::new();
    let digest = writer.write(b"Hello, world!").unwrap();
    writer.dump(&path).unwrap();

    let reader = hoard::PackfileReader::open(&path).unwrap();
    let bytes = reader.read(&digest).unwrap().unwrap();
    assert_eq!(bytes, b"Hello, world!");
}

#[test]
fn packfile_dedup_collapses_to_one_entry() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();
    std::fs::remove_file(&path).unwrap();

    let mut writer = PackfileWriter::new();
    let a = writer.write(b"abc").unwrap();
    let b = writer.write(b"abc").unwrap();
    let c = writer.write(b"abc").unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);

    writer.dump(&path).unwrap();
    let reader = hoard::PackfileReader::open(&path).unwrap();
    assert_eq!(reader.len(), 1);
}

#[test]
fn packfile_entries_dump_in_ascending_digest_order() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();
    std::fs::remove_file(&path).unwrap();

    let mut writer = PackfileWriter::new();
    let mut digests = vec![
        writer.write(b"payload-two").unwrap(),
        writer.write(b"payload-one").unwrap(),
        writer.write(b"payload-three").unwrap(),
    ];
    digests.sort_by(|a: &Digest, b: &Digest| a.compare(b));

    writer.dump(&path).unwrap();
    let reader = hoard::PackfileReader::open(&path).unwrap();
    let found: Vec<Digest> = reader.enumerate().copied().collect();
    assert_eq!(found, digests);
}

#[test]
fn packfile_collection_first_hit_wins() {
    let dir = tempdir().unwrap();

    let mut a = PackfileWriter::new();
    a.write(b"shared").unwrap();
    a.dump(dir.path().join("a.pack")).unwrap();

    let mut b = PackfileWriter::new();
    b.write(b"shared").unwrap();
    b.write(b"only-in-b").unwrap();
    b.dump(dir.path().join("b.pack")).unwrap();

    let mut collection = PackfileCollection::new();
    collection.add_file(dir.path().join("a.pack")).unwrap();
    collection.add_file(dir.path().join("b.pack")).unwrap();

    assert_eq!(
        collection.read(&Digest::of(b"shared")).unwrap().unwrap(),
        b"shared"
    );
    assert_eq!(
        collection.read(&Digest::of(b"only-in-b")).unwrap().unwrap(),
        b"only-in-b"
    );
}

#[test]
fn append_only_repo_crash_recovery() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("repo.bin");

    let a;
    let b;
    let committed_len;
    {
        let repo = hoard::Repo::open(&path, RepoOptions::default()).unwrap();
        a = repo.write(b"block-a").unwrap();
        b = repo.write(b"block-b").unwrap();
        repo.sync().unwrap();
        committed_len = std::fs::metadata(&path).unwrap().len();
        repo.write(b"block-c").unwrap();
        repo.close();
    }

    let corrupted_len = std::fs::metadata(&path).unwrap().len() - 1;
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(corrupted_len).unwrap();
    drop(file);

    let repo = hoard::Repo::open(&path, RepoOptions::default()).unwrap();
    assert!(repo.contains(&a));
    assert!(repo.contains(&b));
    assert_eq!(repo.len(), 2);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), committed_len);
}

#[test]
fn superblock_stream_roundtrip_small_and_large() {
    let dir = tempdir().unwrap();
    let hoard = Hoard::open(dir.path().join("repo.bin"), RepoOptions::default()).unwrap();

    let small_root = hoard.write_stream(b"a small payload").unwrap();
    assert_eq!(hoard.read_stream(&small_root).unwrap(), b"a small payload");

    let mut state: u32 = 99;
    let mut input = vec![0u8; 2 * 1024 * 1024];
    for b in input.iter_mut() {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        *b = (state >> 16) as u8;
    }
    let large_root = hoard.write_stream(&input).unwrap();
    assert_eq!(hoard.read_stream(&large_root).unwrap(), input);
}

#[test]
fn superblock_stream_empty_input_yields_empty_output() {
    let dir = tempdir().unwrap();
    let hoard = Hoard::open(dir.path().join("repo.bin"), RepoOptions::default()).unwrap();

    let root = hoard.write_stream(b"").unwrap();
    assert!(hoard.read_stream(&root).unwrap().is_empty());
}

#[test]
fn chunk_stability_under_a_leading_insertion() {
    let dir = tempdir().unwrap();
    let hoard = Hoard::open(dir.path().join("repo.bin"), RepoOptions::default()).unwrap();

    let mut state: u32 = 123;
    let mut input = vec![0u8; 4 * 1024 * 1024];
    for b in input.iter_mut() {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        *b = (state >> 16) as u8;
    }

    let root_before = hoard.write_stream(&input).unwrap();
    let blocks_before = collect_leaf_digests(&hoard, &root_before);

    let mut shifted = vec![0u8; 1024];
    shifted.extend_from_slice(&input);
    let root_after = hoard.write_stream(&shifted).unwrap();
    let blocks_after = collect_leaf_digests(&hoard, &root_after);

    let shared = blocks_before.iter().filter(|d| blocks_after.contains(d)).count();
    let ratio = shared as f64 / blocks_before.len() as f64;
    assert!(ratio >= 0.7, "shared ratio was {ratio}");
}

/// Walk the pointer tree rooted at `root`, returning the digests of every
/// level-0 (leaf/data) block it reaches — the actual content-defined chunks,
/// as opposed to any fixed-size proxy for them.
fn collect_leaf_digests(hoard: &Hoard, root: &Digest) -> Vec<Digest> {
    let mut out = Vec::new();
    let mut stack = vec![*root];
    while let Some(digest) = stack.pop() {
        let bytes = hoard.read_block(&digest).unwrap().unwrap();
        if let Ok((header, children)) = hoard::superblock::decode(&bytes) {
            if header.level == 0 {
                out.extend(children);
            } else {
                stack.extend(children);
            }
        }
    }
    out
}
