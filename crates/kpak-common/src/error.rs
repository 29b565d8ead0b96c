//! Error types for kpak-common.

use thiserror::Error;

/// Common error type for kpak stream reading.
#[derive(Debug, Error)]
pub enum Error {
    /// No null terminator found within the bounded buffer.
    #[error("string exceeds maximum length of {max} bytes")]
    StringTooLong { max: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
