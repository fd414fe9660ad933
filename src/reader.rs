//! Streaming tarball reader - decodes a gzip-compressed tar stream entry by entry
//!
//! Nothing is buffered beyond the decompressor's own window: each entry's payload is
//! handed out through `Read` and must be drained (or skipped) before the next header
//! becomes visible.

use crate::entry::{self, EntryHeader, EntryType, PendingExtensions, BLOCK_SIZE};
use crate::error::{Result, TarballError};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

/// Largest GNU long-name/long-link or PAX record accepted
const MAX_EXTENSION_SIZE: u64 = 1024 * 1024;

/// Position of the decode cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// The next block is a header
    HeaderPending,
    /// Inside an entry: `remaining` payload bytes, then `padding` zero bytes
    Payload { remaining: u64, padding: u64 },
    /// End marker reached
    End,
}

/// Streaming tarball reader
pub struct TarballReader<R: Read> {
    decoder: MultiGzDecoder<R>,
    cursor: Cursor,
    current_name: String,
    current_size: u64,
}

impl TarballReader<BufReader<File>> {
    /// Open a `.tar.gz` file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        Ok(Self::new(file))
    }
}

impl<R: Read> TarballReader<R> {
    /// Create a reader over any gzip-compressed tar byte source
    pub fn new(source: R) -> Self {
        Self {
            decoder: MultiGzDecoder::new(source),
            cursor: Cursor::HeaderPending,
            current_name: String::new(),
            current_size: 0,
        }
    }

    /// Advance to the next entry.
    ///
    /// Returns `Ok(None)` once the end of the archive is reached. The previous entry's
    /// payload must have been fully read or skipped.
    pub fn next_entry(&mut self) -> Result<Option<EntryHeader>> {
        match self.cursor {
            Cursor::End => return Ok(None),
            Cursor::Payload { remaining, .. } if remaining > 0 => {
                return Err(TarballError::InvalidState(format!(
                    "{} payload bytes of {} not consumed",
                    remaining, self.current_name
                )));
            }
            Cursor::Payload { padding, .. } => {
                self.discard(padding)?;
                self.cursor = Cursor::HeaderPending;
            }
            Cursor::HeaderPending => {}
        }

        let mut extensions = PendingExtensions::default();
        loop {
            let block = match self.read_block()? {
                Some(block) => block,
                None => {
                    // Stream ended at a block boundary without an end marker
                    self.cursor = Cursor::End;
                    return Ok(None);
                }
            };

            if is_zero_block(&block) {
                self.read_end_marker()?;
                self.cursor = Cursor::End;
                return Ok(None);
            }

            let header = tar::Header::from_byte_slice(&block);
            entry::verify_checksum(&block, header)?;

            match header.entry_type() {
                EntryType::GNULongName => {
                    let data = self.read_extension(header)?;
                    log::trace!("GNU long name record ({} bytes)", data.len());
                    extensions.set_long_name(&data);
                }
                EntryType::GNULongLink => {
                    let data = self.read_extension(header)?;
                    log::trace!("GNU long link record ({} bytes)", data.len());
                    extensions.set_long_link(&data);
                }
                EntryType::XHeader => {
                    let data = self.read_extension(header)?;
                    log::trace!("PAX extended header ({} bytes)", data.len());
                    extensions.apply_pax(&data)?;
                }
                EntryType::XGlobalHeader => {
                    let data = self.read_extension(header)?;
                    log::trace!("skipping PAX global header ({} bytes)", data.len());
                }
                _ => {
                    let entry = entry::decode_header(header, extensions)?;
                    self.cursor = Cursor::Payload {
                        remaining: entry.size,
                        padding: entry::padding_for(entry.size),
                    };
                    self.current_name.clone_from(&entry.name);
                    self.current_size = entry.size;
                    return Ok(Some(entry));
                }
            }
        }
    }

    /// Discard whatever is left of the current entry's payload
    pub fn skip_entry(&mut self) -> Result<()> {
        if let Cursor::Payload { remaining, padding } = self.cursor {
            self.discard_payload(remaining)?;
            self.cursor = Cursor::Payload {
                remaining: 0,
                padding,
            };
        }
        Ok(())
    }

    /// Read the rest of the current entry's payload into memory
    pub fn read_payload(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.remaining().min(MAX_EXTENSION_SIZE) as usize);
        self.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Stream the rest of the current entry's payload into `dest`
    pub fn copy_payload_to<W: Write + ?Sized>(&mut self, dest: &mut W) -> Result<u64> {
        Ok(io::copy(self, dest)?)
    }

    /// Payload bytes of the current entry not yet read
    pub fn remaining(&self) -> u64 {
        match self.cursor {
            Cursor::Payload { remaining, .. } => remaining,
            _ => 0,
        }
    }

    /// Consume the reader, returning the underlying source
    pub fn into_inner(self) -> R {
        self.decoder.into_inner()
    }

    fn read_payload_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (remaining, padding) = match self.cursor {
            Cursor::Payload { remaining, padding } if remaining > 0 => (remaining, padding),
            _ => return Ok(0),
        };
        if buf.is_empty() {
            return Ok(0);
        }

        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = self
            .decoder
            .read(&mut buf[..want])
            .map_err(TarballError::from_decoder)?;
        if n == 0 {
            return Err(self.truncated(remaining));
        }

        self.cursor = Cursor::Payload {
            remaining: remaining - n as u64,
            padding,
        };
        Ok(n)
    }

    fn discard_payload(&mut self, remaining: u64) -> Result<()> {
        let skipped = io::copy(&mut (&mut self.decoder).take(remaining), &mut io::sink())
            .map_err(TarballError::from_decoder)?;
        if skipped < remaining {
            return Err(self.truncated(remaining - skipped));
        }
        Ok(())
    }

    fn truncated(&self, missing: u64) -> TarballError {
        log::debug!("payload of {} ends {} bytes early", self.current_name, missing);
        TarballError::SizeMismatch {
            name: self.current_name.clone(),
            expected: self.current_size,
            actual: self.current_size.saturating_sub(missing),
        }
    }

    /// Skip padding or the body of a record nobody asked for
    fn discard(&mut self, len: u64) -> Result<()> {
        let skipped = io::copy(&mut (&mut self.decoder).take(len), &mut io::sink())
            .map_err(TarballError::from_decoder)?;
        if skipped < len {
            return Err(TarballError::Decode(
                "unexpected end of archive inside block padding".to_string(),
            ));
        }
        Ok(())
    }

    /// Read the body of an extension record (long name, PAX header) including its padding
    fn read_extension(&mut self, header: &tar::Header) -> Result<Vec<u8>> {
        let size = header
            .entry_size()
            .map_err(|e| TarballError::Decode(format!("invalid extension size: {}", e)))?;
        if size > MAX_EXTENSION_SIZE {
            return Err(TarballError::Decode(format!(
                "extension record of {} bytes exceeds limit of {} bytes",
                size, MAX_EXTENSION_SIZE
            )));
        }

        let mut data = vec![0u8; size as usize];
        self.decoder
            .read_exact(&mut data)
            .map_err(TarballError::from_decoder)?;
        self.discard(entry::padding_for(size))?;
        Ok(data)
    }

    /// Read one block; `None` on a clean end of stream before any byte of it
    fn read_block(&mut self) -> Result<Option<[u8; BLOCK_SIZE]>> {
        let mut block = [0u8; BLOCK_SIZE];
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            match self.decoder.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TarballError::from_decoder(e)),
            }
        }

        match filled {
            0 => Ok(None),
            BLOCK_SIZE => Ok(Some(block)),
            _ => Err(TarballError::Decode(format!(
                "unexpected end of archive after {} bytes of a header block",
                filled
            ))),
        }
    }

    /// The end marker is two zero blocks; the second may be missing but must not hold data
    fn read_end_marker(&mut self) -> Result<()> {
        match self.read_block()? {
            Some(block) if !is_zero_block(&block) => Err(TarballError::Decode(
                "data found after end-of-archive block".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl<R: Read> Read for TarballReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_payload_chunk(buf)?)
    }
}

fn is_zero_block(block: &[u8; BLOCK_SIZE]) -> bool {
    block.iter().all(|&b| b == 0)
}
