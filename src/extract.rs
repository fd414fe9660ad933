//! Pull a single named entry out of a tarball

use crate::error::{Result, TarballError};
use crate::reader::TarballReader;
use std::io::{Read, Write};

/// Return the payload of the first entry named exactly `name`.
///
/// Fails with [`TarballError::NotFound`] if the archive ends without such an entry.
pub fn extract_entry<R: Read>(source: R, name: &str) -> Result<Vec<u8>> {
    let mut reader = seek_entry(source, name)?;
    reader.read_payload()
}

/// Stream the payload of the first entry named exactly `name` into `dest`,
/// returning the number of bytes written
pub fn extract_entry_to<R: Read, W: Write + ?Sized>(
    source: R,
    name: &str,
    dest: &mut W,
) -> Result<u64> {
    let mut reader = seek_entry(source, name)?;
    reader.copy_payload_to(dest)
}

/// Advance a fresh reader until its current entry is `name`
fn seek_entry<R: Read>(source: R, name: &str) -> Result<TarballReader<R>> {
    let mut reader = TarballReader::new(source);
    while let Some(header) = reader.next_entry()? {
        if header.name == name {
            return Ok(reader);
        }
        reader.skip_entry()?;
    }
    Err(TarballError::NotFound(name.to_string()))
}
