//! Error types for the archive crate.

use thiserror::Error;

/// Errors that can occur when reading BAR, QAR and MAR archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] kpak_common::Error),

    /// Archive signature did not match the selected format.
    #[error("invalid {format} magic: expected {expected:?}, got {actual:?}")]
    MagicMismatch {
        format: &'static str,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// A MAR filename had no terminator within the bounded buffer.
    #[error("filename exceeds maximum length of {max} bytes")]
    FilenameTooLong { max: usize },

    /// Unrecognized MAR record tag.
    #[error("invalid entry type: {0}")]
    InvalidEntryType(u8),

    /// Entry name would escape the extraction directory.
    #[error("unsafe entry path: {0}")]
    UnsafePath(String),

    /// Failure reported by an entry callback.
    #[error("entry callback failed: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary error raised inside an entry callback.
    pub fn callback<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Callback(error.into())
    }
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
