//! Common utilities for kpak.
//!
//! This crate provides the foundational pieces shared by the archive readers:
//!
//! - [`StreamReader`] - Buffered archive source with non-consuming look-ahead
//! - [`ReadExt`] - Fixed-layout, complete-fill and C-string reads on any [`std::io::Read`]
//! - [`crc`] - CRC-32 and CRC-16 used for per-file key derivation

mod error;
mod reader;

pub mod crc;

pub use error::{Error, Result};
pub use reader::{trim_nul_padding, until_nul, ReadExt, StreamReader};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
