//! Error types shared by the extraction engine and the command line.

use std::io;

use bstr::BString;
use thiserror::Error;

/// Reasons an extraction stops.
///
/// Every variant except [`TarError::Read`] and [`TarError::Backend`] is a
/// format error and carries no underlying cause.
#[derive(Debug, Error)]
pub enum TarError {
    #[error("header checksum error for entry {name}")]
    HeaderChecksum { name: BString },
    #[error("bad header data")]
    BadHeaderData,
    #[error("bad header field: unsupported type flag {type_flag:#04x} for entry {name}")]
    BadHeaderField { name: BString, type_flag: u8 },
    #[error("read error: continuation record truncated after {got} of {expected} bytes")]
    TruncatedContinuation { expected: usize, got: usize },
    #[error("read partial header record ({got} bytes)")]
    PartialHeaderRecord { got: usize },
    #[error("failed to read archive")]
    Read(#[source] io::Error),
    #[error(transparent)]
    Backend(anyhow::Error),
}

impl TarError {
    /// Whether this error describes malformed archive data rather than a
    /// failing system or backend call.
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        !matches!(self, Self::Read(_) | Self::Backend(_))
    }
}

/// Represents a user input error (invalid flags, missing paths, etc.).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UserInputError(pub String);

impl UserInputError {
    /// Convenience constructor.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
