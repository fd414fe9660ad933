//! Error types for s-tarball

use std::io;

/// Result type for s-tarball operations
pub type Result<T> = std::result::Result<T, TarballError>;

/// Error types that can occur while reading or writing tarballs
#[derive(Debug)]
pub enum TarballError {
    /// I/O error from the underlying source or destination
    Io(io::Error),
    /// Corrupt gzip envelope or tar framing
    Decode(String),
    /// Declared entry size does not match the payload bytes written or read
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },
    /// Invalid entry name pattern
    Pattern(regex::Error),
    /// Entry not found in the tarball
    NotFound(String),
    /// Reader or writer used out of order
    InvalidState(String),
}

impl TarballError {
    /// Classify an I/O error raised while decoding the gzip stream.
    ///
    /// flate2 reports corrupt input as `InvalidInput`/`InvalidData`, and a truncated
    /// member as `UnexpectedEof`; anything else came from the source itself.
    pub(crate) fn from_decoder(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::InvalidInput
            | io::ErrorKind::InvalidData
            | io::ErrorKind::UnexpectedEof => TarballError::Decode(err.to_string()),
            _ => TarballError::from(err),
        }
    }
}

impl std::fmt::Display for TarballError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TarballError::Io(e) => write!(f, "I/O error: {}", e),
            TarballError::Decode(msg) => write!(f, "Invalid tarball: {}", msg),
            TarballError::SizeMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Size mismatch for {}: header declares {} bytes, got {}",
                name, expected, actual
            ),
            TarballError::Pattern(e) => write!(f, "Invalid pattern: {}", e),
            TarballError::NotFound(name) => write!(f, "no file named {} in tarball", name),
            TarballError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for TarballError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TarballError::Io(e) => Some(e),
            TarballError::Pattern(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TarballError {
    fn from(err: io::Error) -> Self {
        // Errors raised inside our own Read/Write impls travel wrapped in io::Error.
        match err.downcast::<TarballError>() {
            Ok(inner) => inner,
            Err(err) => TarballError::Io(err),
        }
    }
}

impl From<TarballError> for io::Error {
    fn from(err: TarballError) -> Self {
        match err {
            TarballError::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}

impl From<regex::Error> for TarballError {
    fn from(err: regex::Error) -> Self {
        TarballError::Pattern(err)
    }
}
