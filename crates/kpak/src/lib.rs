//! kpak - BAR, QAR and MAR game archive extraction library.
//!
//! This crate provides a unified interface to the kpak crates.
//!
//! # Crates
//!
//! - [`kpak_common`] - Common utilities (stream reading, CRC key hashing)
//! - [`kpak_archive`] - Archive detection, parsing, decryption and extraction
//!
//! # Example
//!
//! ```no_run
//! use kpak::prelude::*;
//!
//! let archive = Archive::open("data.qar")?;
//! println!("archive type: {}", archive.name());
//!
//! archive.for_each(|entry| {
//!     println!("{} ({} bytes)", entry.filename(), entry.size());
//!     entry.skip()?;
//!     Ok::<_, Error>(())
//! })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use kpak_archive as archive;
pub use kpak_common as common;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use kpak_archive::{
        detect, Archive, ArchiveEntry, ArchiveFormat, ArchiveReader, Error, Extractor,
    };
    pub use kpak_common::{crc, StreamReader};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
