use s_tarball::{
    create_tarball, extract_entry, EntryHeader, FileStat, FileSystem, HostFileSystem,
    TarballBuilder, TarballError, TarballReader,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn read_all_entries(path: &Path) -> Vec<(EntryHeader, Vec<u8>)> {
    let mut reader = TarballReader::open(path).unwrap();
    let mut entries = Vec::new();
    while let Some(header) = reader.next_entry().unwrap() {
        let data = reader.read_payload().unwrap();
        entries.push((header, data));
    }
    entries
}

fn populate(dir: &Path) -> Vec<(&'static str, Vec<u8>)> {
    let files = vec![
        ("a.txt", b"first file".to_vec()),
        ("b.bin", (0..=255u8).cycle().take(70_000).collect::<Vec<_>>()),
        ("empty", Vec::new()),
    ];
    fs::create_dir_all(dir).unwrap();
    for (name, data) in &files {
        fs::write(dir.join(name), data).unwrap();
    }
    files
}

#[test]
fn test_build_then_extract_roundtrip() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("data");
    let files = populate(&source);
    let dest = dir.path().join("out").join("nested").join("data.tar.gz");

    let summary = create_tarball(&dest, &source, false).unwrap();
    assert_eq!(summary.entries, vec!["data/a.txt", "data/b.bin", "data/empty"]);
    assert!(summary.removal_failures.is_empty());

    // Destination directories are created on demand
    assert!(dest.exists());

    let bytes = fs::read(&dest).unwrap();
    for (name, data) in &files {
        let extracted = extract_entry(&bytes[..], &format!("data/{}", name)).unwrap();
        assert_eq!(&extracted, data, "content of {}", name);
    }

    // Sources untouched
    for (name, _) in &files {
        assert!(source.join(name).exists());
    }
}

#[test]
fn test_build_single_file() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("report.csv");
    fs::write(&source, b"id,value\n1,2\n").unwrap();
    let dest = dir.path().join("report.tar.gz");

    let summary = create_tarball(&dest, &source, false).unwrap();
    assert_eq!(summary.entries, vec!["report.csv"]);

    let entries = read_all_entries(&dest);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0.name, "report.csv");
    assert_eq!(entries[0].1, b"id,value\n1,2\n");
}

#[test]
fn test_build_records_metadata() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("data");
    populate(&source);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(source.join("a.txt"), fs::Permissions::from_mode(0o640)).unwrap();
    }

    let dest = dir.path().join("meta.tar.gz");
    create_tarball(&dest, &source, false).unwrap();

    let entries = read_all_entries(&dest);
    let (header, data) = &entries[0];
    assert_eq!(header.name, "data/a.txt");
    assert_eq!(header.size, data.len() as u64);

    let modified = fs::metadata(source.join("a.txt"))
        .unwrap()
        .modified()
        .unwrap();
    let expected_mtime = modified
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    assert_eq!(header.mtime, expected_mtime);

    #[cfg(unix)]
    assert_eq!(header.mode, 0o640);
}

#[test]
fn test_build_skips_nested_directories() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("data");
    populate(&source);
    fs::create_dir(source.join("sub")).unwrap();
    fs::write(source.join("sub").join("deep.txt"), b"not archived").unwrap();

    let dest = dir.path().join("flat.tar.gz");
    let summary = create_tarball(&dest, &source, false).unwrap();

    assert_eq!(summary.entries.len(), 3);
    assert_eq!(summary.skipped, vec![source.join("sub")]);

    let names: Vec<_> = read_all_entries(&dest)
        .into_iter()
        .map(|(h, _)| h.name)
        .collect();
    assert!(!names.iter().any(|n| n.contains("deep.txt")));
}

#[test]
fn test_build_skips_destination_inside_source() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("data");
    populate(&source);
    let dest = source.join("self.tar.gz");

    let summary = create_tarball(&dest, &source, false).unwrap();
    assert!(summary.skipped.contains(&dest));
    assert!(!summary.entries.contains(&"data/self.tar.gz".to_string()));

    let entries = read_all_entries(&dest);
    assert_eq!(entries.len(), 3);
}

#[test]
fn test_build_recognizes_destination_spelled_differently() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("data");
    populate(&source);
    let dest = source.join("sub").join("..").join("self.tar.gz");

    let summary = create_tarball(&dest, &source, true).unwrap();

    assert!(dest.exists(), "destination must survive remove_files");
    assert_eq!(summary.entries, vec!["data/a.txt", "data/b.bin", "data/empty"]);
    assert!(summary.skipped.contains(&source.join("self.tar.gz")));
    assert_eq!(read_all_entries(&dest).len(), 3);
}

#[test]
fn test_build_removes_sources() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("data");
    let files = populate(&source);
    let dest = dir.path().join("moved.tar.gz");

    let summary = create_tarball(&dest, &source, true).unwrap();
    assert!(summary.removal_failures.is_empty());

    for (name, _) in &files {
        assert!(!source.join(name).exists(), "{} should be removed", name);
    }

    let bytes = fs::read(&dest).unwrap();
    for (name, data) in &files {
        let extracted = extract_entry(&bytes[..], &format!("data/{}", name)).unwrap();
        assert_eq!(&extracted, data);
    }
}

/// Host filesystem whose `remove` always fails
struct StickyFileSystem;

impl FileSystem for StickyFileSystem {
    type Reader = <HostFileSystem as FileSystem>::Reader;
    type Writer = <HostFileSystem as FileSystem>::Writer;

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        HostFileSystem.stat(path)
    }

    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        HostFileSystem.list_children(path)
    }

    fn open_read(&self, path: &Path) -> io::Result<(Self::Reader, FileStat)> {
        HostFileSystem.open_read(path)
    }

    fn create_for_write(&self, path: &Path) -> io::Result<Self::Writer> {
        HostFileSystem.create_for_write(path)
    }

    fn remove(&self, _path: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }

    fn same_file(&self, a: &Path, b: &Path) -> io::Result<bool> {
        HostFileSystem.same_file(a, b)
    }
}

/// Host filesystem that refuses to open one particular file name
struct UnreadableFileSystem(&'static str);

impl FileSystem for UnreadableFileSystem {
    type Reader = <HostFileSystem as FileSystem>::Reader;
    type Writer = <HostFileSystem as FileSystem>::Writer;

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        HostFileSystem.stat(path)
    }

    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        HostFileSystem.list_children(path)
    }

    fn open_read(&self, path: &Path) -> io::Result<(Self::Reader, FileStat)> {
        if path.file_name().is_some_and(|name| name == self.0) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "unreadable"));
        }
        HostFileSystem.open_read(path)
    }

    fn create_for_write(&self, path: &Path) -> io::Result<Self::Writer> {
        HostFileSystem.create_for_write(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        HostFileSystem.remove(path)
    }

    fn same_file(&self, a: &Path, b: &Path) -> io::Result<bool> {
        HostFileSystem.same_file(a, b)
    }
}

#[test]
fn test_removal_failure_does_not_fail_build() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("data");
    let files = populate(&source);
    let dest = dir.path().join("sticky.tar.gz");

    let summary = TarballBuilder::with_file_system(StickyFileSystem)
        .remove_files(true)
        .build(&dest, &source)
        .unwrap();

    assert_eq!(summary.entries.len(), files.len());
    assert_eq!(summary.removal_failures.len(), files.len());
    assert!(summary
        .removal_failures
        .iter()
        .all(|f| f.error.kind() == io::ErrorKind::PermissionDenied));

    // Files are still on disk and fully archived
    for (name, _) in &files {
        assert!(source.join(name).exists());
    }
    assert_eq!(read_all_entries(&dest).len(), files.len());
}

#[test]
fn test_unreadable_source_aborts_build() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("data");
    populate(&source);
    let dest = dir.path().join("aborted.tar.gz");

    let result = TarballBuilder::with_file_system(UnreadableFileSystem("b.bin"))
        .remove_files(true)
        .build(&dest, &source);
    match result {
        Err(TarballError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
        other => panic!("expected I/O error, got {other:?}"),
    }

    // Nothing after the failing file was archived, and it was not removed
    let mut reader = TarballReader::open(&dest).unwrap();
    let mut names = Vec::new();
    while let Ok(Some(header)) = reader.next_entry() {
        names.push(header.name);
        if reader.skip_entry().is_err() {
            break;
        }
    }
    assert_eq!(names, vec!["data/a.txt"]);
    assert!(source.join("b.bin").exists());
    assert!(source.join("empty").exists());
}

#[test]
fn test_build_missing_source_fails_before_creating_destination() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("never.tar.gz");

    let result = create_tarball(&dest, dir.path().join("missing"), false);
    assert!(matches!(result, Err(TarballError::Io(_))));
    assert!(!dest.exists());
}

#[test]
fn test_builder_compression_level() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("data");
    populate(&source);

    let fast = dir.path().join("fast.tar.gz");
    let small = dir.path().join("small.tar.gz");
    TarballBuilder::new()
        .compression_level(0)
        .build(&fast, &source)
        .unwrap();
    TarballBuilder::new()
        .compression_level(9)
        .build(&small, &source)
        .unwrap();

    let fast_len = fs::metadata(&fast).unwrap().len();
    let small_len = fs::metadata(&small).unwrap().len();
    assert!(small_len < fast_len);
    assert_eq!(read_all_entries(&fast), read_all_entries(&small));
}
