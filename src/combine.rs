//! Concatenate the entries of several tarballs into one

use crate::error::Result;
use crate::transcode::write_tarball_to;
use crate::writer::TarballWriter;
use std::io::{Read, Write};

/// Combine tarballs into a single in-memory tarball.
///
/// Entries keep their order: all of the first source, then all of the second, and so
/// on. Duplicate names are kept. Any error aborts the combine and no output is
/// returned. Zero sources produce a valid empty tarball.
pub fn combine_tarballs<I>(sources: I) -> Result<Vec<u8>>
where
    I: IntoIterator,
    I::Item: Read,
{
    combine_tarballs_into(sources, Vec::new())
}

/// Combine tarballs, streaming the result into `dest` and returning it once finished
pub fn combine_tarballs_into<I, W>(sources: I, dest: W) -> Result<W>
where
    I: IntoIterator,
    I::Item: Read,
    W: Write,
{
    let mut writer = TarballWriter::new(dest);

    for (index, source) in sources.into_iter().enumerate() {
        let copied = write_tarball_to(source, &mut writer, None)?;
        log::debug!("combined {} entries from source #{}", copied, index);
    }

    writer.finish()
}
