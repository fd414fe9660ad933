//! Entry metadata and its mapping onto 512-byte tar header blocks
//!
//! Headers are written in GNU format. Names and link targets that do not fit the
//! 100-byte header fields are carried in a preceding GNU long-name / long-link
//! record; user and group names too long for their fields go into a PAX extended
//! header. On the read side both GNU records and PAX extended headers are folded
//! into the header that follows them.

use crate::error::{Result, TarballError};
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use tar::EntryType;

/// Size of one tar block
pub(crate) const BLOCK_SIZE: usize = 512;

/// Width of the name and link name fields of a tar header
const NAME_FIELD_LEN: usize = 100;

/// Width of the user and group name fields of a tar header
const OWNER_FIELD_LEN: usize = 32;

/// Name GNU tar gives to long-name and long-link records
const LONG_LINK_NAME: &[u8] = b"././@LongLink";

/// Name given to PAX extended header records
const PAX_HEADER_NAME: &[u8] = b"././@PaxHeader";

/// Byte range of the checksum field inside a header block
const CHECKSUM_RANGE: std::ops::Range<usize> = 148..156;

/// Metadata of one archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Path-like name, forward-slash separated
    pub name: String,
    /// Exact payload length in bytes (always 0 for header-only entry types)
    pub size: u64,
    /// Permission bits
    pub mode: u32,
    /// Modification time in seconds since the Unix epoch
    pub mtime: u64,
    /// Kind of entry: regular file, directory, link, device...
    pub entry_type: EntryType,
    /// Target of a symlink or hard link
    pub link_name: Option<String>,
    /// Numeric owner id
    pub uid: u64,
    /// Numeric group id
    pub gid: u64,
    /// Owner name, if recorded
    pub username: Option<String>,
    /// Group name, if recorded
    pub groupname: Option<String>,
    /// Major device number of a character or block device
    pub device_major: Option<u32>,
    /// Minor device number of a character or block device
    pub device_minor: Option<u32>,
}

impl EntryHeader {
    /// Header for a regular file with mode 0644 and a zero timestamp
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mode: 0o644,
            mtime: 0,
            entry_type: EntryType::Regular,
            link_name: None,
            uid: 0,
            gid: 0,
            username: None,
            groupname: None,
            device_major: None,
            device_minor: None,
        }
    }

    /// Header for a directory entry
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            mode: 0o755,
            entry_type: EntryType::Directory,
            ..Self::new(name, 0)
        }
    }

    /// Header for a symbolic link pointing at `target`
    pub fn symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            mode: 0o777,
            entry_type: EntryType::Symlink,
            link_name: Some(target.into()),
            ..Self::new(name, 0)
        }
    }

    /// Header for a character or block device node
    pub fn device(name: impl Into<String>, entry_type: EntryType, major: u32, minor: u32) -> Self {
        Self {
            entry_type,
            device_major: Some(major),
            device_minor: Some(minor),
            ..Self::new(name, 0)
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mtime(mut self, mtime: u64) -> Self {
        self.mtime = mtime;
        self
    }

    /// Set the modification time from a `SystemTime`, clamping pre-epoch times to 0
    pub fn with_modified(self, modified: SystemTime) -> Self {
        let mtime = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.with_mtime(mtime)
    }

    /// Modification time as a `SystemTime`
    pub fn modified(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.mtime)
    }

    /// Whether payload bytes follow this header in the archive
    pub fn has_payload(&self) -> bool {
        !matches!(
            self.entry_type,
            EntryType::Link
                | EntryType::Symlink
                | EntryType::Char
                | EntryType::Block
                | EntryType::Directory
                | EntryType::Fifo
        )
    }

    /// Number of payload bytes the archive holds for this entry
    pub(crate) fn payload_len(&self) -> u64 {
        if self.has_payload() {
            self.size
        } else {
            0
        }
    }
}

/// Zero bytes needed after `len` payload bytes to reach the next block boundary
pub(crate) fn padding_for(len: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    (block - len % block) % block
}

/// Extension records waiting to be applied to the next regular header
#[derive(Debug, Default)]
pub(crate) struct PendingExtensions {
    name: Option<String>,
    link_name: Option<String>,
    size: Option<u64>,
    mtime: Option<u64>,
    uid: Option<u64>,
    gid: Option<u64>,
    username: Option<String>,
    groupname: Option<String>,
}

impl PendingExtensions {
    pub(crate) fn set_long_name(&mut self, data: &[u8]) {
        self.name = Some(lossy(trim_nul(data)));
    }

    pub(crate) fn set_long_link(&mut self, data: &[u8]) {
        self.link_name = Some(lossy(trim_nul(data)));
    }

    /// Apply the records of a PAX extended header
    pub(crate) fn apply_pax(&mut self, data: &[u8]) -> Result<()> {
        for record in tar::PaxExtensions::new(data) {
            let record = record.map_err(|e| malformed_pax(&e.to_string()))?;
            let key = record.key().map_err(|_| malformed_pax("non-UTF-8 key"))?;
            let value = record.value_bytes();
            match key {
                "path" => self.name = Some(lossy(value)),
                "linkpath" => self.link_name = Some(lossy(value)),
                "size" => self.size = Some(pax_number(key, value)?),
                "mtime" => self.mtime = Some(pax_time(value)?),
                "uid" => self.uid = Some(pax_number(key, value)?),
                "gid" => self.gid = Some(pax_number(key, value)?),
                "uname" => self.username = Some(lossy(value)),
                "gname" => self.groupname = Some(lossy(value)),
                _ => log::trace!("ignoring PAX record {}", key),
            }
        }
        Ok(())
    }
}

/// Check the header checksum; both the unsigned and the historic signed sum are accepted
pub(crate) fn verify_checksum(block: &[u8; BLOCK_SIZE], header: &tar::Header) -> Result<()> {
    let stored = header.cksum().map_err(field_error("checksum"))?;

    let mut unsigned: u32 = 0;
    let mut signed: i64 = 0;
    for (i, &byte) in block.iter().enumerate() {
        let byte = if CHECKSUM_RANGE.contains(&i) { b' ' } else { byte };
        unsigned += u32::from(byte);
        signed += i64::from(byte as i8);
    }

    if stored == unsigned || i64::from(stored) == signed {
        Ok(())
    } else {
        Err(TarballError::Decode(format!(
            "header checksum mismatch: stored {}, computed {}",
            stored, unsigned
        )))
    }
}

/// Build an `EntryHeader` from a regular header block and any pending extensions
pub(crate) fn decode_header(header: &tar::Header, ext: PendingExtensions) -> Result<EntryHeader> {
    let entry_type = header.entry_type();

    let name = match ext.name {
        Some(name) => name,
        None => lossy(&header.path_bytes()),
    };
    let link_name = ext
        .link_name
        .or_else(|| header.link_name_bytes().map(|bytes| lossy(&bytes)))
        .filter(|link| !link.is_empty());

    let raw = header.as_old();
    let size = match ext.size {
        Some(size) => size,
        None => numeric(&raw.size, header.entry_size(), "size")?,
    };
    let mtime = match ext.mtime {
        Some(mtime) => mtime,
        None => numeric(&raw.mtime, header.mtime(), "mtime")?,
    };
    let uid = match ext.uid {
        Some(uid) => uid,
        None => numeric(&raw.uid, header.uid(), "uid")?,
    };
    let gid = match ext.gid {
        Some(gid) => gid,
        None => numeric(&raw.gid, header.gid(), "gid")?,
    };
    let mode = numeric(&raw.mode, header.mode().map(u64::from), "mode")? as u32;
    let (device_major, device_minor) = device_numbers(header)?;

    let mut entry = EntryHeader {
        name,
        size,
        mode,
        mtime,
        entry_type,
        link_name,
        uid,
        gid,
        username: ext
            .username
            .or_else(|| header.username_bytes().map(lossy))
            .filter(|s| !s.is_empty()),
        groupname: ext
            .groupname
            .or_else(|| header.groupname_bytes().map(lossy))
            .filter(|s| !s.is_empty()),
        device_major,
        device_minor,
    };
    entry.size = entry.payload_len();
    Ok(entry)
}

/// Encode `entry` as header blocks ready to be written to the tar stream
pub(crate) fn encode_header(entry: &EntryHeader) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(BLOCK_SIZE);

    let mut pax = Vec::new();
    let username = owner_field(&mut pax, "uname", entry.username.as_deref());
    let groupname = owner_field(&mut pax, "gname", entry.groupname.as_deref());
    if !pax.is_empty() {
        append_record(&mut out, EntryType::XHeader, PAX_HEADER_NAME, &pax);
    }

    let name = entry.name.as_bytes();
    if name.len() > NAME_FIELD_LEN {
        append_long_record(&mut out, EntryType::GNULongName, name);
    }
    let link = entry.link_name.as_deref().unwrap_or_default().as_bytes();
    if link.len() > NAME_FIELD_LEN {
        append_long_record(&mut out, EntryType::GNULongLink, link);
    }

    let mut header = tar::Header::new_gnu();
    {
        let fields = header.as_old_mut();
        copy_field(&mut fields.name, name);
        copy_field(&mut fields.linkname, link);
    }
    header.set_entry_type(entry.entry_type);
    header.set_size(entry.payload_len());
    header.set_mode(entry.mode);
    header.set_mtime(entry.mtime);
    header.set_uid(entry.uid);
    header.set_gid(entry.gid);
    if let Some(username) = username {
        header
            .set_username(username)
            .map_err(|e| invalid_header(&entry.name, "user name", e))?;
    }
    if let Some(groupname) = groupname {
        header
            .set_groupname(groupname)
            .map_err(|e| invalid_header(&entry.name, "group name", e))?;
    }
    if matches!(entry.entry_type, EntryType::Char | EntryType::Block) {
        header
            .set_device_major(entry.device_major.unwrap_or(0))
            .map_err(|e| invalid_header(&entry.name, "device major", e))?;
        header
            .set_device_minor(entry.device_minor.unwrap_or(0))
            .map_err(|e| invalid_header(&entry.name, "device minor", e))?;
    }
    header.set_cksum();

    out.extend_from_slice(header.as_bytes());
    Ok(out)
}

fn append_long_record(out: &mut Vec<u8>, kind: EntryType, value: &[u8]) {
    // The stored value is NUL-terminated
    let mut body = Vec::with_capacity(value.len() + 1);
    body.extend_from_slice(value);
    body.push(0);
    append_record(out, kind, LONG_LINK_NAME, &body);
}

/// Append an extension record header followed by its padded body
fn append_record(out: &mut Vec<u8>, kind: EntryType, record_name: &[u8], body: &[u8]) {
    let len = body.len() as u64;

    let mut header = tar::Header::new_gnu();
    copy_field(&mut header.as_old_mut().name, record_name);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_size(len);
    header.set_entry_type(kind);
    header.set_cksum();

    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(body);
    out.resize(out.len() + padding_for(len) as usize, 0);
}

/// Value to store in a fixed owner field; names that do not fit become PAX records
fn owner_field<'a>(pax: &mut Vec<u8>, key: &str, value: Option<&'a str>) -> Option<&'a str> {
    match value {
        Some(value) if value.len() > OWNER_FIELD_LEN => {
            push_pax_record(pax, key, value.as_bytes());
            None
        }
        other => other,
    }
}

/// Append one `"<len> <key>=<value>\n"` record; `len` counts its own digits
fn push_pax_record(pax: &mut Vec<u8>, key: &str, value: &[u8]) {
    let body = key.len() + value.len() + 3;
    let mut len = body;
    loop {
        let total = body + len.to_string().len();
        if total == len {
            break;
        }
        len = total;
    }

    pax.extend_from_slice(format!("{} {}=", len, key).as_bytes());
    pax.extend_from_slice(value);
    pax.push(b'\n');
}

fn copy_field(field: &mut [u8], value: &[u8]) {
    let n = value.len().min(field.len());
    field[..n].copy_from_slice(&value[..n]);
}

fn pax_number(key: &str, value: &[u8]) -> Result<u64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed_pax(&format!("invalid {} value", key)))
}

/// PAX times may carry a fractional part; only whole seconds are kept
fn pax_time(value: &[u8]) -> Result<u64> {
    let text = std::str::from_utf8(value).map_err(|_| malformed_pax("invalid mtime value"))?;
    let whole = text.split('.').next().unwrap_or_default();
    let secs: i64 = whole
        .parse()
        .map_err(|_| malformed_pax("invalid mtime value"))?;
    Ok(secs.max(0) as u64)
}

fn malformed_pax(reason: &str) -> TarballError {
    TarballError::Decode(format!("malformed PAX record: {}", reason))
}

/// Blank numeric fields read as zero
fn numeric(raw: &[u8], parsed: io::Result<u64>, field: &'static str) -> Result<u64> {
    if is_blank(raw) {
        return Ok(0);
    }
    parsed.map_err(field_error(field))
}

/// Device numbers of character and block devices; `None` for every other entry type
fn device_numbers(header: &tar::Header) -> Result<(Option<u32>, Option<u32>)> {
    if !matches!(header.entry_type(), EntryType::Char | EntryType::Block) {
        return Ok((None, None));
    }

    let raw = header
        .as_gnu()
        .map(|h| (&h.dev_major[..], &h.dev_minor[..]))
        .or_else(|| header.as_ustar().map(|h| (&h.dev_major[..], &h.dev_minor[..])));
    let (raw_major, raw_minor) = match raw {
        Some(fields) => fields,
        // Old-style headers carry no device fields
        None => return Ok((None, None)),
    };

    let major = if is_blank(raw_major) {
        Some(0)
    } else {
        header.device_major().map_err(field_error("device major"))?
    };
    let minor = if is_blank(raw_minor) {
        Some(0)
    } else {
        header.device_minor().map_err(field_error("device minor"))?
    };
    Ok((major, minor))
}

fn is_blank(raw: &[u8]) -> bool {
    raw.iter().all(|&b| b == 0 || b == b' ')
}

fn field_error(field: &'static str) -> impl Fn(io::Error) -> TarballError {
    move |e| TarballError::Decode(format!("invalid {} field in header: {}", field, e))
}

fn invalid_header(name: &str, field: &str, err: io::Error) -> TarballError {
    TarballError::InvalidState(format!("cannot encode {} of {}: {}", field, name, err))
}

fn trim_nul(data: &[u8]) -> &[u8] {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    &data[..end]
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
