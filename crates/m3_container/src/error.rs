//! Error types for container operations.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses
//! [`ContainerError`] as the error type. Every variant that concerns a specific
//! container carries its identity (the four-byte magic, e.g. `MD5T` or `CTMD`)
//! so callers can tell which format failed to parse.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors that can occur while building or reading a container.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// Filesystem I/O failed while building a container (file vanished,
    /// permission denied, ...). Fatal to the whole build.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream is not a valid container: wrong magic, unsupported version,
    /// truncated data or inconsistent tables.
    #[error("Malformed {container} container: {reason}")]
    Format {
        container: &'static str,
        reason: String,
    },

    /// The requested entry is not present in the container's index.
    #[error("Entry '{name}' not found in {container} container")]
    Lookup {
        container: &'static str,
        name: String,
    },

    /// A legacy container does not store the decompressed size of its entries,
    /// so the caller must supply it.
    #[error("Entry '{name}' in {container} version {version} container requires an external decompressed size")]
    MissingDecompressedSize {
        container: &'static str,
        name: String,
        version: u8,
    },

    /// The compression primitive failed.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Failed to read or write a fixed-size binary record.
    #[error("binrw error: {0}")]
    BinRw(#[from] binrw::Error),

    /// A value cannot be represented in the wire format (non-ASCII manifest
    /// path, size exceeding `i32`, ...).
    #[error("Cannot encode {what}: {reason}")]
    Encode { what: String, reason: String },
}

impl ContainerError {
    pub(crate) fn format(container: &'static str, reason: impl Into<String>) -> Self {
        Self::Format {
            container,
            reason: reason.into(),
        }
    }

    pub(crate) fn lookup(container: &'static str, name: impl Into<String>) -> Self {
        Self::Lookup {
            container,
            name: name.into(),
        }
    }

    /// Rewrites a generic truncation/format failure so it names the container
    /// that was being read.
    pub(crate) fn within(self, container: &'static str) -> Self {
        match self {
            Self::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Self::format(container, "unexpected end of stream")
            }
            Self::BinRw(binrw::Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Self::format(container, "unexpected end of stream")
            }
            Self::Format { reason, .. } => Self::Format { container, reason },
            other => other,
        }
    }
}
