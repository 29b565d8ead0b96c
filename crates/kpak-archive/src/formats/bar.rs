//! BAR archives.
//!
//! BAR has no magic. The header carries an entry count, followed by one
//! record per file:
//!
//! ```text
//! header   12 B   bytes 10..12 = entry count (u16)
//! slot    256 B   null-terminated name; u32 layout tag at offset 252
//! [extra    4 B]  present only when the layout tag is not 3
//! meta     12 B   bytes 4..12 = payload size (u64)
//! payload
//! ```

use std::io::Read;

use kpak_common::{until_nul, ReadExt};
use tracing::debug;
use zerocopy::byteorder::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::deliver;
use crate::entry::ArchiveEntry;
use crate::Error;

/// BAR archive header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct BarHeader {
    /// Unused by extraction
    pub unknown: [u8; 10],
    /// Number of entries
    pub entry_count: U16,
}

/// Fixed-size filename slot that starts every BAR record.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct BarNameSlot {
    /// Null-terminated name
    pub name: [u8; 252],
    /// Record layout tag
    pub layout_tag: U32,
}

impl BarNameSlot {
    /// Layout tag of records without the extra 4-byte field.
    pub const STANDARD_LAYOUT: u32 = 3;

    /// The entry name: slot bytes up to the first null.
    pub fn name(&self) -> &[u8] {
        until_nul(self.as_bytes())
    }

    /// Whether an extra 4-byte field follows the slot.
    pub fn has_extra_field(&self) -> bool {
        self.layout_tag.get() != Self::STANDARD_LAYOUT
    }
}

/// Metadata record preceding each BAR payload.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct BarEntryMetadata {
    /// Unused by extraction
    pub unknown: U32,
    /// Payload size in bytes
    pub size: U64,
}

/// Reader for BAR archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarReader;

impl BarReader {
    /// Format name.
    pub const NAME: &'static str = "BAR";

    /// Get the format name.
    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Read every entry, invoking `callback` once per file in archive order.
    pub fn read<R, F, E>(&self, source: &mut R, mut callback: F) -> Result<(), E>
    where
        R: Read,
        F: FnMut(&mut ArchiveEntry<'_>) -> Result<(), E>,
        E: From<Error>,
    {
        let header: BarHeader = source.read_struct().map_err(Error::from)?;
        let count = header.entry_count.get();
        debug!(count, "reading BAR archive");

        for _ in 0..count {
            let slot: BarNameSlot = source.read_struct().map_err(Error::from)?;
            if slot.has_extra_field() {
                let mut extra = [0u8; 4];
                source.read_exact(&mut extra).map_err(Error::from)?;
            }

            let meta: BarEntryMetadata = source.read_struct().map_err(Error::from)?;
            let entry = ArchiveEntry::plain(slot.name(), meta.size.get(), &mut *source);
            deliver(entry, &mut callback)?;
        }

        Ok(())
    }
}
