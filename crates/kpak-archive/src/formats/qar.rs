//! QAR archives.
//!
//! An 8-byte header (`"QAR\0"` + u32 entry count) followed by fixed 144-byte
//! records, each immediately followed by its payload.

use std::io::Read;

use kpak_common::{trim_nul_padding, ReadExt};
use tracing::debug;
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::deliver;
use crate::entry::ArchiveEntry;
use crate::Error;

/// QAR archive header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct QarHeader {
    /// Signature, always `"QAR\0"`
    pub magic: [u8; 4],
    /// Number of entries
    pub entry_count: U32,
}

impl QarHeader {
    /// QAR signature bytes.
    pub const MAGIC: [u8; 4] = *b"QAR\0";
}

/// Per-entry QAR record.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct QarRecord {
    /// Null-padded name
    pub name: [u8; 128],
    /// Unused by extraction
    pub reserved: [u8; 8],
    /// Payload size in bytes
    pub size: U64,
}

impl QarRecord {
    /// The entry name with trailing null padding removed.
    pub fn name(&self) -> &[u8] {
        trim_nul_padding(&self.name)
    }
}

/// Reader for QAR archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QarReader;

impl QarReader {
    /// Format name.
    pub const NAME: &'static str = "QAR";

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
        let header: QarHeader = source.read_struct().map_err(Error::from)?;
        if header.magic != QarHeader::MAGIC {
            return Err(Error::MagicMismatch {
                format: Self::NAME,
                expected: QarHeader::MAGIC.to_vec(),
                actual: header.magic.to_vec(),
            }
            .into());
        }

        let count = header.entry_count.get();
        debug!(count, "reading QAR archive");

        for _ in 0..count {
            let record: QarRecord = source.read_struct().map_err(Error::from)?;
            let entry = ArchiveEntry::plain(record.name(), record.size.get(), &mut *source);
            deliver(entry, &mut callback)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::testing::{collect, TestError};
    use pretty_assertions::assert_eq;

    fn header(count: u32) -> Vec<u8> {
        QarHeader {
            magic: QarHeader::MAGIC,
            entry_count: U32::new(count),
        }
        .as_bytes()
        .to_vec()
    }

    fn record(name: &str, payload: &[u8]) -> Vec<u8> {
        let mut record = QarRecord {
            name: [0; 128],
            reserved: [0xCC; 8],
            size: U64::new(payload.len() as u64),
        };
        record.name[..name.len()].copy_from_slice(name.as_bytes());

        let mut out = record.as_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<QarHeader>(), 8);
        assert_eq!(std::mem::size_of::<QarRecord>(), 144);
    }

    #[test]
    fn test_single_entry() {
        let mut data = b"QAR\0".to_vec();
        data.extend_from_slice(&1u32.to_le_bytes());
        let mut record = [0u8; 144];
        record[..5].copy_from_slice(b"a.txt");
        record[136..].copy_from_slice(&3u64.to_le_bytes());
        data.extend_from_slice(&record);
        data.extend_from_slice(b"abc");

        let mut entries = Vec::new();
        QarReader.read(&mut &data[..], collect(&mut entries)).unwrap();

        assert_eq!(entries, vec![("a.txt".to_string(), b"abc".to_vec())]);
    }

    #[test]
    fn test_entries_in_order() {
        let mut data = header(3);
        data.extend(record("sys/one.xml", b"<one/>"));
        data.extend(record("sys/two.xml", b"<two/>"));
        data.extend(record("empty", b""));

        let mut entries = Vec::new();
        QarReader.read(&mut &data[..], collect(&mut entries)).unwrap();

        assert_eq!(
            entries,
            vec![
                ("sys/one.xml".to_string(), b"<one/>".to_vec()),
                ("sys/two.xml".to_string(), b"<two/>".to_vec()),
                ("empty".to_string(), Vec::new()),
            ]
        );
    }

    #[test]
    fn test_full_width_name() {
        let name = "n".repeat(128);
        let mut data = header(1);
        data.extend(record(&name, b"z"));

        let mut entries = Vec::new();
        QarReader.read(&mut &data[..], collect(&mut entries)).unwrap();
        assert_eq!(entries[0].0, name);
    }

    #[test]
    fn test_bad_magic() {
        let mut data = b"QARX".to_vec();
        data.extend_from_slice(&0u32.to_le_bytes());

        let mut entries = Vec::new();
        let err = QarReader.read(&mut &data[..], collect(&mut entries)).unwrap_err();
        assert!(matches!(err, Error::MagicMismatch { format: "QAR", .. }));
    }

    #[test]
    fn test_callback_error_is_returned_unchanged() {
        let mut data = header(4);
        for i in 0..4 {
            data.extend(record(&format!("{i}.bin"), b"data"));
        }

        let mut seen = Vec::new();
        let result = QarReader.read(&mut &data[..], |entry: &mut ArchiveEntry<'_>| {
            seen.push(entry.filename().into_owned());
            if seen.len() == 3 {
                return Err(TestError::Stop(seen.len()));
            }
            entry.skip().map_err(Error::from)?;
            Ok(())
        });

        assert_eq!(result, Err(TestError::Stop(3)));
        assert_eq!(seen, vec!["0.bin", "1.bin", "2.bin"]);
    }

    #[test]
    fn test_truncated_header() {
        let mut entries = Vec::new();
        let err = QarReader.read(&mut &b"QAR\0\x01"[..], collect(&mut entries)).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
