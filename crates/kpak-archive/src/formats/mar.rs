//! MAR archives.
//!
//! After the `"MASMAR0\0"` signature the archive is a sequence of tagged
//! records terminated by an end tag:
//!
//! ```text
//! tag       1 B    1 = file, 2 = marker, 255 = end of archive
//! name      n B    null-terminated, at most 127 bytes + terminator
//! [size     4 B]   u32, file records only
//! [payload]        file records only, optionally keystream-encrypted
//! ```

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use kpak_common::ReadExt;
use tracing::debug;

use super::deliver;
use crate::entry::ArchiveEntry;
use crate::Error;

/// MAR signature bytes.
pub const MAR_MAGIC: [u8; 8] = *b"MASMAR0\0";

/// Size of the filename buffer, terminator included.
pub const MAX_FILENAME: usize = 128;

/// Record tags used in MAR archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MarRecordType {
    /// A file with a payload.
    File = 1,
    /// A named record with no payload.
    Marker = 2,
    /// End of archive.
    End = 255,
}

impl TryFrom<u8> for MarRecordType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::File),
            2 => Ok(Self::Marker),
            255 => Ok(Self::End),
            other => Err(other),
        }
    }
}

/// Reader for MAR archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarReader {
    use_decryption: bool,
}

impl MarReader {
    /// Format name.
    pub const NAME: &'static str = "MAR";

    /// Create a reader, optionally decrypting file payloads.
    pub fn new(use_decryption: bool) -> Self {
        Self { use_decryption }
    }

    /// Get the format name.
    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Whether file payloads are decrypted.
    pub fn use_decryption(&self) -> bool {
        self.use_decryption
    }

    /// Read every file record, invoking `callback` once per file in archive order.
    ///
    /// Marker records are skipped without a callback.
    pub fn read<R, F, E>(&self, source: &mut R, mut callback: F) -> Result<(), E>
    where
        R: Read,
        F: FnMut(&mut ArchiveEntry<'_>) -> Result<(), E>,
        E: From<Error>,
    {
        let mut magic = [0u8; 8];
        source.read_exact(&mut magic).map_err(Error::from)?;
        if magic != MAR_MAGIC {
            return Err(Error::MagicMismatch {
                format: Self::NAME,
                expected: MAR_MAGIC.to_vec(),
                actual: magic.to_vec(),
            }
            .into());
        }
        debug!(decrypt = self.use_decryption, "reading MAR archive");

        let mut name = [0u8; MAX_FILENAME];
        loop {
            let tag = source.read_u8().map_err(Error::from)?;
            let kind = MarRecordType::try_from(tag).map_err(Error::InvalidEntryType)?;
            if kind == MarRecordType::End {
                return Ok(());
            }

            let len = source.read_cstring_into(&mut name).map_err(|e| match e {
                kpak_common::Error::StringTooLong { max } => Error::FilenameTooLong { max },
                other => Error::from(other),
            })?;
            let filename = &name[..len];

            if kind == MarRecordType::Marker {
                debug!(name = %String::from_utf8_lossy(filename), "marker record");
                continue;
            }

            let size = u64::from(source.read_u32::<LittleEndian>().map_err(Error::from)?);
            let entry = if self.use_decryption {
                ArchiveEntry::encrypted(filename, size, &mut *source)
            } else {
                ArchiveEntry::plain(filename, size, &mut *source)
            };
            deliver(entry, &mut callback)?;
        }
    }
}
