//! Streaming reader for BAR, QAR and MAR game asset archives.
//!
//! All three formats store their files back to back with no index, so an
//! archive is read in a single forward pass:
//!
//! - the format is detected by peeking at the first three bytes
//!   (`"QAR"` → QAR, `"MAS"` → MAR, anything else → BAR)
//! - the matching parser walks the records and hands each file to a
//!   callback as an [`ArchiveEntry`], a [`Read`](std::io::Read) bounded to
//!   the entry's payload
//! - MAR payloads can optionally be decrypted with a per-file XOR keystream
//!   derived from the entry name
//!
//! # Example
//!
//! ```no_run
//! use kpak_archive::{Archive, Extractor};
//!
//! let archive = Archive::open("data.bar")?;
//! let mut extractor = Extractor::new("out").silent(true);
//!
//! archive.for_each(|entry| {
//!     let path = extractor.extract(entry)?;
//!     println!("{} -> {}", entry.filename(), path.display());
//!     Ok::<_, kpak_archive::Error>(())
//! })?;
//! # Ok::<(), kpak_archive::Error>(())
//! ```

mod archive;
mod entry;
mod error;
mod extract;

pub mod crypto;
pub mod formats;

pub use archive::{detect, Archive, ArchiveFormat, ArchiveReader, MAGIC_LEN};
pub use entry::{ArchiveEntry, BoundedReader};
pub use error::{Error, Result};
pub use extract::{Extractor, COPY_BUFFER_SIZE};
pub use formats::{BarReader, MarReader, MarRecordType, QarReader};
