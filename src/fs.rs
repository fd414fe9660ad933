//! Filesystem access used by the tarball builder
//!
//! The builder only needs a handful of capabilities, so they live behind a trait:
//! tests can substitute an implementation whose operations fail on demand.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Metadata the builder records for a source path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    pub modified: SystemTime,
}

/// Filesystem capabilities needed to build a tarball
pub trait FileSystem {
    type Reader: Read;
    type Writer: Write;

    fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Direct children of a directory, sorted by path
    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Open a file for reading, returning it with metadata taken from the open handle
    fn open_read(&self, path: &Path) -> io::Result<(Self::Reader, FileStat)>;

    /// Create (or truncate) a file, creating missing parent directories first
    fn create_for_write(&self, path: &Path) -> io::Result<Self::Writer>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Whether both paths name the same existing file, however they are spelled
    fn same_file(&self, a: &Path, b: &Path) -> io::Result<bool>;
}

/// `FileSystem` backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFileSystem;

impl FileSystem for HostFileSystem {
    type Reader = BufReader<File>;
    type Writer = BufWriter<File>;

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        Ok(file_stat(&fs::metadata(path)?))
    }

    fn list_children(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut children = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        children.sort();
        Ok(children)
    }

    fn open_read(&self, path: &Path) -> io::Result<(Self::Reader, FileStat)> {
        let file = File::open(path)?;
        let stat = file_stat(&file.metadata()?);
        Ok((BufReader::new(file), stat))
    }

    fn create_for_write(&self, path: &Path) -> io::Result<Self::Writer> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }
        Ok(BufWriter::new(File::create(path)?))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn same_file(&self, a: &Path, b: &Path) -> io::Result<bool> {
        same_file(a, b)
    }
}

fn file_stat(metadata: &fs::Metadata) -> FileStat {
    FileStat {
        is_dir: metadata.is_dir(),
        size: metadata.len(),
        mode: permission_bits(metadata),
        modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    }
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let (a, b) = (fs::metadata(a)?, fs::metadata(b)?);
    Ok(a.dev() == b.dev() && a.ino() == b.ino())
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(metadata: &fs::Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

#[cfg(unix)]
fn create_dir_all(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_dir_all(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_same_file_sees_through_spelling() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let file = dir.path().join("out.tgz");
        fs::write(&file, b"x").unwrap();
        fs::write(dir.path().join("other.tgz"), b"x").unwrap();

        let host = HostFileSystem;
        let roundabout = dir.path().join("sub").join("..").join("out.tgz");
        assert!(host.same_file(&file, &roundabout).unwrap());
        assert!(!host.same_file(&file, &dir.path().join("other.tgz")).unwrap());
    }

    #[test]
    fn test_open_read_reports_handle_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, [1u8; 300]).unwrap();

        let (mut reader, stat) = HostFileSystem.open_read(&path).unwrap();
        assert!(!stat.is_dir);
        assert_eq!(stat.size, 300);

        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        assert_eq!(data.len(), 300);
    }
}
