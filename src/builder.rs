//! Build a tarball from a file or the direct children of a directory

use crate::entry::EntryHeader;
use crate::error::Result;
use crate::fs::{FileSystem, HostFileSystem};
use crate::writer::TarballWriter;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Outcome of a successful build
#[derive(Debug, Default)]
pub struct BuildSummary {
    /// Names of the entries written, in order
    pub entries: Vec<String>,
    /// Paths left out: nested directories and the destination itself
    pub skipped: Vec<PathBuf>,
    /// Source files that were archived but could not be removed afterwards
    pub removal_failures: Vec<RemovalFailure>,
}

/// A source file whose removal failed after it was added to the tarball
#[derive(Debug)]
pub struct RemovalFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Configurable tarball builder
///
/// # Example
/// ```no_run
/// use s_tarball::TarballBuilder;
///
/// let summary = TarballBuilder::new()
///     .remove_files(true)
///     .compression_level(9)
///     .build("out/logs.tar.gz", "var/logs")?;
/// println!("archived {} files", summary.entries.len());
/// # Ok::<(), s_tarball::TarballError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TarballBuilder<F: FileSystem = HostFileSystem> {
    fs: F,
    remove_files: bool,
    compression_level: u32,
}

impl TarballBuilder<HostFileSystem> {
    /// Builder over the host filesystem
    pub fn new() -> Self {
        Self::with_file_system(HostFileSystem)
    }
}

impl Default for TarballBuilder<HostFileSystem> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FileSystem> TarballBuilder<F> {
    /// Builder over a custom filesystem implementation
    pub fn with_file_system(fs: F) -> Self {
        Self {
            fs,
            remove_files: false,
            compression_level: 6,
        }
    }

    /// Remove each source file once it has been added
    pub fn remove_files(mut self, remove: bool) -> Self {
        self.remove_files = remove;
        self
    }

    /// Gzip compression level (0-9)
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Write `path` (a file, or the direct children of a directory) into a tarball at `dest`.
    ///
    /// Entries are named relative to the parent of `path`. On error the destination is
    /// left partially written and should be discarded.
    pub fn build<P: AsRef<Path>, Q: AsRef<Path>>(&self, dest: P, path: Q) -> Result<BuildSummary> {
        let dest = dest.as_ref();
        let path = path.as_ref();

        let stat = self.fs.stat(path)?;
        let output = self.fs.create_for_write(dest)?;
        let mut writer = TarballWriter::with_compression(output, self.compression_level);

        let sources = if stat.is_dir {
            self.fs.list_children(path)?
        } else {
            vec![path.to_path_buf()]
        };
        let base = path.parent().unwrap_or_else(|| Path::new(""));

        let mut summary = BuildSummary::default();
        for source in sources {
            if self.fs.same_file(&source, dest)? {
                log::debug!("skipping destination {} inside source", source.display());
                summary.skipped.push(source);
                continue;
            }

            match self.add_file(&mut writer, &source, base)? {
                Some(name) => summary.entries.push(name),
                None => {
                    summary.skipped.push(source);
                    continue;
                }
            }

            if self.remove_files {
                if let Err(error) = self.fs.remove(&source) {
                    log::warn!("Failed to remove {}: {}", source.display(), error);
                    summary.removal_failures.push(RemovalFailure {
                        path: source,
                        error,
                    });
                }
            }
        }

        writer.finish()?;
        Ok(summary)
    }

    /// Add one file; directories are skipped and yield `None`
    fn add_file<W: Write>(
        &self,
        writer: &mut TarballWriter<W>,
        source: &Path,
        base: &Path,
    ) -> Result<Option<String>> {
        if self.fs.stat(source)?.is_dir {
            log::debug!("skipping nested directory {}", source.display());
            return Ok(None);
        }

        let (mut file, stat) = self.fs.open_read(source)?;
        let name = entry_name(source, base);
        let header = EntryHeader::new(name.clone(), stat.size)
            .with_mode(stat.mode)
            .with_modified(stat.modified);

        writer.write_header(&header)?;
        writer.write_from(&mut file)?;
        log::debug!("added {} ({} bytes)", name, stat.size);
        Ok(Some(name))
    }
}

/// Create a tarball of `path` at `dest` using the host filesystem
///
/// # Example
/// ```no_run
/// let summary = s_tarball::create_tarball("backup/site.tar.gz", "site", false)?;
/// assert!(summary.removal_failures.is_empty());
/// # Ok::<(), s_tarball::TarballError>(())
/// ```
pub fn create_tarball<P: AsRef<Path>, Q: AsRef<Path>>(
    dest: P,
    path: Q,
    remove_files: bool,
) -> Result<BuildSummary> {
    TarballBuilder::new()
        .remove_files(remove_files)
        .build(dest, path)
}

/// Name of `source` relative to `base`, forward-slash separated
fn entry_name(source: &Path, base: &Path) -> String {
    let relative = source.strip_prefix(base).unwrap_or(source);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
