//! # s-tarball: Streaming `.tar.gz` Library
//!
//! `s-tarball` reads and writes gzip-compressed tar archives one entry at a time,
//! without ever holding a whole archive in memory. On top of the streaming reader
//! and writer it provides the everyday archive chores: combining tarballs, building
//! one from a directory, searching entry names and pulling out a single file.
//!
//! ## Features
//!
//! - **Streaming Read**: Walk entries on-the-fly; payloads are plain `std::io::Read`
//! - **Streaming Write**: Entries are compressed as they are written, any `Write` works
//! - **Strict Sizes**: Payloads that disagree with their header are rejected, never padded
//! - **Transcoding**: Copy entries between archives, optionally stripping a name prefix
//! - **Compatible**: GNU/POSIX tar inside gzip, readable by `tar`, `bsdtar` and friends
//!
//! ## Quick Start
//!
//! ### Reading a tarball
//!
//! ```no_run
//! use s_tarball::TarballReader;
//!
//! let mut reader = TarballReader::open("archive.tar.gz")?;
//!
//! while let Some(entry) = reader.next_entry()? {
//!     println!("{}: {} bytes", entry.name, entry.size);
//!     if entry.name.ends_with(".txt") {
//!         let data = reader.read_payload()?;
//!         println!("{}", String::from_utf8_lossy(&data));
//!     } else {
//!         reader.skip_entry()?;
//!     }
//! }
//! # Ok::<(), s_tarball::TarballError>(())
//! ```
//!
//! ### Writing a tarball
//!
//! ```no_run
//! use s_tarball::{EntryHeader, TarballWriter};
//!
//! let mut writer = TarballWriter::create("output.tar.gz")?;
//!
//! writer.write_header(&EntryHeader::new("file1.txt", 13))?;
//! writer.write_data(b"Hello, World!")?;
//!
//! writer.write_header(&EntryHeader::new("file2.txt", 12).with_mode(0o600))?;
//! writer.write_data(b"Another file")?;
//!
//! writer.finish()?;
//! # Ok::<(), s_tarball::TarballError>(())
//! ```
//!
//! ### Working with tarballs in memory
//!
//! ```no_run
//! use s_tarball::{combine_tarballs, extract_entry, find_entries};
//!
//! let first = std::fs::read("first.tar.gz")?;
//! let second = std::fs::read("second.tar.gz")?;
//!
//! let combined = combine_tarballs([&first[..], &second[..]])?;
//! let logs = find_entries(&combined[..], r"\.log$")?;
//! for name in &logs {
//!     let data = extract_entry(&combined[..], name)?;
//!     println!("{}: {} bytes", name, data.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builder;
pub mod combine;
pub mod entry;
pub mod error;
pub mod extract;
pub mod finder;
pub mod fs;
pub mod reader;
pub mod transcode;
pub mod writer;

pub use builder::{create_tarball, BuildSummary, RemovalFailure, TarballBuilder};
pub use combine::{combine_tarballs, combine_tarballs_into};
pub use entry::{EntryHeader, EntryType};
pub use error::{Result, TarballError};
pub use extract::{extract_entry, extract_entry_to};
pub use finder::{find_entries, find_entries_in_file, PartialScan};
pub use fs::{FileStat, FileSystem, HostFileSystem};
pub use reader::TarballReader;
pub use transcode::write_tarball_to;
pub use writer::TarballWriter;
