//! Streaming tarball writer that compresses entries on-the-fly
//!
//! Headers and payloads go straight through the gzip encoder into the destination,
//! so memory use stays flat regardless of archive size. Any `Write` works as the
//! destination: `File`, `Vec<u8>`, sockets.

use crate::entry::{self, EntryHeader, BLOCK_SIZE};
use crate::error::{Result, TarballError};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

/// Default gzip compression level
const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Zero bytes written after the last entry: two empty blocks
const END_MARKER: [u8; BLOCK_SIZE * 2] = [0u8; BLOCK_SIZE * 2];

/// Position of the encode cursor
#[derive(Debug)]
enum Cursor {
    /// Ready for the next header (or `finish`)
    HeaderPending,
    /// Inside an entry's payload
    Payload {
        name: String,
        declared: u64,
        written: u64,
    },
}

/// Streaming tarball writer
pub struct TarballWriter<W: Write> {
    encoder: GzEncoder<W>,
    cursor: Cursor,
    entries_written: u64,
}

impl TarballWriter<BufWriter<File>> {
    /// Create a `.tar.gz` file with default compression level (6)
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_compression(path, DEFAULT_COMPRESSION_LEVEL)
    }

    /// Create a `.tar.gz` file with custom compression level (0-9)
    pub fn create_with_compression<P: AsRef<Path>>(path: P, compression_level: u32) -> Result<Self> {
        let output = BufWriter::new(File::create(path)?);
        Ok(Self::with_compression(output, compression_level))
    }
}

impl<W: Write> TarballWriter<W> {
    /// Create a writer over an arbitrary destination with default compression level (6)
    pub fn new(writer: W) -> Self {
        Self::with_compression(writer, DEFAULT_COMPRESSION_LEVEL)
    }

    /// Create a writer over an arbitrary destination with custom compression level (0-9)
    pub fn with_compression(writer: W, compression_level: u32) -> Self {
        Self {
            encoder: GzEncoder::new(writer, Compression::new(compression_level.min(9))),
            cursor: Cursor::HeaderPending,
            entries_written: 0,
        }
    }

    /// Start a new entry.
    ///
    /// The previous entry must have received exactly its declared number of bytes.
    pub fn write_header(&mut self, header: &EntryHeader) -> Result<()> {
        self.finish_current_entry()?;

        let blocks = entry::encode_header(header)?;
        self.encoder.write_all(&blocks)?;

        self.cursor = Cursor::Payload {
            name: header.name.clone(),
            declared: header.payload_len(),
            written: 0,
        };
        self.entries_written += 1;
        Ok(())
    }

    /// Write payload bytes to the current entry
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let Cursor::Payload {
            name,
            declared,
            written,
        } = &mut self.cursor
        else {
            return Err(TarballError::InvalidState("No entry started".to_string()));
        };

        let total = *written + data.len() as u64;
        if total > *declared {
            return Err(TarballError::SizeMismatch {
                name: name.clone(),
                expected: *declared,
                actual: total,
            });
        }

        self.encoder.write_all(data)?;
        *written = total;
        Ok(())
    }

    /// Stream `source` into the current entry, returning the number of bytes copied
    pub fn write_from<R: Read + ?Sized>(&mut self, source: &mut R) -> Result<u64> {
        Ok(io::copy(source, self)?)
    }

    /// Number of entries started so far
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Access the underlying destination
    pub fn get_ref(&self) -> &W {
        self.encoder.get_ref()
    }

    /// Pad the current entry to a block boundary after checking its size
    fn finish_current_entry(&mut self) -> Result<()> {
        if let Cursor::Payload {
            name,
            declared,
            written,
        } = std::mem::replace(&mut self.cursor, Cursor::HeaderPending)
        {
            if written != declared {
                return Err(TarballError::SizeMismatch {
                    name,
                    expected: declared,
                    actual: written,
                });
            }

            let padding = entry::padding_for(written) as usize;
            self.encoder.write_all(&END_MARKER[..padding])?;
        }
        Ok(())
    }

    /// Finish the tarball (write the end marker, flush the compressor and return the writer)
    pub fn finish(mut self) -> Result<W> {
        self.finish_current_entry()?;

        self.encoder.write_all(&END_MARKER)?;
        let mut output = self.encoder.finish()?;
        output.flush()?;
        Ok(output)
    }
}

impl<W: Write> Write for TarballWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_data(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}
