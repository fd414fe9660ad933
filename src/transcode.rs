//! Re-stream the entries of one tarball into an open writer

use crate::error::Result;
use crate::reader::TarballReader;
use crate::writer::TarballWriter;
use std::io::{Read, Write};

/// Copy every entry of the tarball in `source` into `writer`.
///
/// When `strip_prefix` is non-empty, it is removed from the start of every entry name
/// that begins with it; other names pass through unchanged. Headers and payloads are
/// otherwise copied verbatim. The writer is not finished, so further entries (or
/// further tarballs) can follow. Returns the number of entries copied.
///
/// # Example
/// ```no_run
/// use s_tarball::{write_tarball_to, TarballWriter};
///
/// let mut writer = TarballWriter::create("merged.tar.gz")?;
/// write_tarball_to(std::fs::File::open("build.tar.gz")?, &mut writer, Some("build/"))?;
/// write_tarball_to(std::fs::File::open("docs.tar.gz")?, &mut writer, None)?;
/// writer.finish()?;
/// # Ok::<(), s_tarball::TarballError>(())
/// ```
pub fn write_tarball_to<R: Read, W: Write>(
    source: R,
    writer: &mut TarballWriter<W>,
    strip_prefix: Option<&str>,
) -> Result<u64> {
    let prefix = strip_prefix.filter(|p| !p.is_empty());
    let mut reader = TarballReader::new(source);
    let mut copied = 0;

    while let Some(mut header) = reader.next_entry()? {
        if let Some(prefix) = prefix {
            header.name = rename(&header.name, prefix);
        }

        writer.write_header(&header)?;
        reader.copy_payload_to(writer)?;
        copied += 1;
    }

    Ok(copied)
}

fn rename(name: &str, prefix: &str) -> String {
    name.strip_prefix(prefix).unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_strips_only_leading_prefix() {
        assert_eq!(rename("build/out.bin", "build/"), "out.bin");
        assert_eq!(rename("other.bin", "build/"), "other.bin");
        assert_eq!(rename("x/build/out.bin", "build/"), "x/build/out.bin");
        assert_eq!(rename("build/build/a", "build/"), "build/a");
    }
}
