//! Format detection and the unified archive reader.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use kpak_common::StreamReader;
use tracing::debug;

use crate::entry::ArchiveEntry;
use crate::formats::{BarReader, MarReader, QarReader};
use crate::{Error, Result};

/// Number of bytes inspected by [`detect`].
pub const MAGIC_LEN: usize = 3;

/// Supported archive container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// BAR archive (no magic, used as the fallback).
    Bar,
    /// QAR archive (`"QAR\0"`).
    Qar,
    /// MAR archive (`"MASMAR0\0"`).
    Mar,
}

impl ArchiveFormat {
    /// Select a format from the first bytes of an archive.
    ///
    /// Anything that is not recognizably QAR or MAR is treated as BAR,
    /// which has no signature of its own.
    pub fn from_magic(magic: &[u8]) -> Self {
        match magic.get(..MAGIC_LEN) {
            Some(b"QAR") => Self::Qar,
            Some(b"MAS") => Self::Mar,
            _ => Self::Bar,
        }
    }

    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bar => BarReader::NAME,
            Self::Qar => QarReader::NAME,
            Self::Mar => MarReader::NAME,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reader for one of the supported formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveReader {
    /// BAR parser.
    Bar(BarReader),
    /// QAR parser.
    Qar(QarReader),
    /// MAR parser, with its decryption setting.
    Mar(MarReader),
}

impl ArchiveReader {
    /// Create a reader for a known format, without decryption.
    pub fn for_format(format: ArchiveFormat) -> Self {
        match format {
            ArchiveFormat::Bar => Self::Bar(BarReader),
            ArchiveFormat::Qar => Self::Qar(QarReader),
            ArchiveFormat::Mar => Self::Mar(MarReader::default()),
        }
    }

    /// Enable or disable payload decryption.
    ///
    /// Only MAR payloads can be encrypted; other formats are unaffected.
    pub fn with_decryption(self, enabled: bool) -> Self {
        match self {
            Self::Mar(_) => Self::Mar(MarReader::new(enabled)),
            other => other,
        }
    }

    /// The format this reader handles.
    pub fn format(&self) -> ArchiveFormat {
        match self {
            Self::Bar(_) => ArchiveFormat::Bar,
            Self::Qar(_) => ArchiveFormat::Qar,
            Self::Mar(_) => ArchiveFormat::Mar,
        }
    }

    /// Short display name of the format.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bar(reader) => reader.name(),
            Self::Qar(reader) => reader.name(),
            Self::Mar(reader) => reader.name(),
        }
    }

    /// Read every entry, invoking `callback` once per file in archive order.
    ///
    /// `source` must be positioned at the start of the archive. An error
    /// returned by `callback` stops enumeration and is returned unchanged.
    pub fn read<R, F, E>(&self, source: &mut R, callback: F) -> std::result::Result<(), E>
    where
        R: Read,
        F: FnMut(&mut ArchiveEntry<'_>) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        match self {
            Self::Bar(reader) => reader.read(source, callback),
            Self::Qar(reader) => reader.read(source, callback),
            Self::Mar(reader) => reader.read(source, callback),
        }
    }
}

/// Detect the archive format without consuming any input.
///
/// Fails only if fewer than [`MAGIC_LEN`] bytes are available.
pub fn detect<R: Read>(source: &mut StreamReader<R>) -> Result<ArchiveReader> {
    let magic = source.peek(MAGIC_LEN)?;
    let format = ArchiveFormat::from_magic(magic);
    debug!(%format, magic = ?magic, "detected archive format");
    Ok(ArchiveReader::for_format(format))
}

/// An archive opened for a single sequential pass.
///
/// # Example
///
/// ```no_run
/// use std::io::Read;
/// use kpak_archive::Archive;
///
/// let archive = Archive::open("data.mar")?.with_decryption(true);
/// println!("archive type: {}", archive.name());
///
/// archive.for_each(|entry| {
///     let mut data = Vec::new();
///     entry.read_to_end(&mut data)?;
///     println!("{}: {} bytes", entry.filename(), data.len());
///     Ok::<_, kpak_archive::Error>(())
/// })?;
/// # Ok::<(), kpak_archive::Error>(())
/// ```
pub struct Archive<R> {
    reader: ArchiveReader,
    source: StreamReader<R>,
}

impl Archive<File> {
    /// Open an archive file and detect its format.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }
}

impl<R: Read> Archive<R> {
    /// Wrap an arbitrary stream and detect its format.
    pub fn from_reader(inner: R) -> Result<Self> {
        let mut source = StreamReader::new(inner);
        let reader = detect(&mut source)?;
        Ok(Self { reader, source })
    }

    /// Enable or disable payload decryption (MAR only).
    pub fn with_decryption(mut self, enabled: bool) -> Self {
        self.reader = self.reader.with_decryption(enabled);
        self
    }

    /// The detected format.
    pub fn format(&self) -> ArchiveFormat {
        self.reader.format()
    }

    /// Short display name of the detected format.
    pub fn name(&self) -> &'static str {
        self.reader.name()
    }

    /// The reader selected for this archive.
    pub fn reader(&self) -> ArchiveReader {
        self.reader
    }

    /// Enumerate all entries. The archive is consumed: entries can only be
    /// read once, in order.
    pub fn for_each<F, E>(mut self, callback: F) -> std::result::Result<(), E>
    where
        F: FnMut(&mut ArchiveEntry<'_>) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        self.reader.read(&mut self.source, callback)
    }
}

impl<R> fmt::Debug for Archive<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("reader", &self.reader)
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::apply_keystream;
    use crate::formats::MarRecordType;

    fn read_all<R: Read>(archive: Archive<R>) -> Vec<(String, Vec<u8>)> {
        let mut entries = Vec::new();
        archive
            .for_each(|entry: &mut ArchiveEntry<'_>| {
                let mut data = Vec::new();
                entry.read_to_end(&mut data)?;
                entries.push((entry.filename().into_owned(), data));
                Ok::<_, Error>(())
            })
            .unwrap();
        entries
    }

    #[test]
    fn test_from_magic() {
        assert_eq!(ArchiveFormat::from_magic(b"QAR"), ArchiveFormat::Qar);
        assert_eq!(ArchiveFormat::from_magic(b"QAR\0\x01\0\0\0"), ArchiveFormat::Qar);
        assert_eq!(ArchiveFormat::from_magic(b"MAS"), ArchiveFormat::Mar);
        assert_eq!(ArchiveFormat::from_magic(b"MASMAR0\0"), ArchiveFormat::Mar);
        assert_eq!(ArchiveFormat::from_magic(b"\0\0\0"), ArchiveFormat::Bar);
        assert_eq!(ArchiveFormat::from_magic(b"qar"), ArchiveFormat::Bar);
        assert_eq!(ArchiveFormat::from_magic(b"\xFF\xFEZ"), ArchiveFormat::Bar);
        assert_eq!(ArchiveFormat::from_magic(b""), ArchiveFormat::Bar);
    }

    #[test]
    fn test_detect_does_not_consume() {
        let mut source = StreamReader::new(&b"QAR\0\0\0\0\0"[..]);
        let reader = detect(&mut source).unwrap();
        assert_eq!(reader.format(), ArchiveFormat::Qar);
        assert_eq!(reader.name(), "QAR");

        let mut rest = Vec::new();
        source.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"QAR\0\0\0\0\0");
    }

    #[test]
    fn test_detect_fallback_and_short_input() {
        let mut garbage = StreamReader::new(&b"zz\x01whatever"[..]);
        assert_eq!(detect(&mut garbage).unwrap().format(), ArchiveFormat::Bar);

        let mut short = StreamReader::new(&b"QA"[..]);
        assert!(matches!(detect(&mut short), Err(Error::Io(_))));

        let mut empty = StreamReader::new(&b""[..]);
        assert!(matches!(detect(&mut empty), Err(Error::Io(_))));
    }

    #[test]
    fn test_with_decryption_only_affects_mar() {
        let mar = ArchiveReader::for_format(ArchiveFormat::Mar).with_decryption(true);
        assert_eq!(mar, ArchiveReader::Mar(MarReader::new(true)));

        let bar = ArchiveReader::for_format(ArchiveFormat::Bar).with_decryption(true);
        assert_eq!(bar, ArchiveReader::Bar(BarReader));
    }

    #[test]
    fn test_crate_error_as_callback_error() {
        let mut data = b"QAR\0".to_vec();
        data.extend_from_slice(&2u32.to_le_bytes());
        for name in ["keep", "reject"] {
            let mut record = [0u8; 144];
            record[..name.len()].copy_from_slice(name.as_bytes());
            data.extend_from_slice(&record);
        }

        let reader = ArchiveReader::for_format(ArchiveFormat::Qar);
        let mut seen = Vec::new();
        let result = reader.read(&mut &data[..], |entry: &mut ArchiveEntry<'_>| {
            let name = entry.filename().into_owned();
            seen.push(name.clone());
            if name == "reject" {
                return Err(Error::callback(format!("refusing {name}")));
            }
            Ok(())
        });

        match result {
            Err(err @ Error::Callback(_)) => {
                assert_eq!(err.to_string(), "entry callback failed: refusing reject");
            }
            other => panic!("expected callback error, got {other:?}"),
        }
        assert_eq!(seen, vec!["keep".to_string(), "reject".to_string()]);
    }

    #[test]
    fn test_archive_qar_end_to_end() {
        let mut data = b"QAR\0".to_vec();
        data.extend_from_slice(&2u32.to_le_bytes());
        for (name, payload) in [("one", &b"1"[..]), ("two", &b"22"[..])] {
            let mut record = [0u8; 144];
            record[..name.len()].copy_from_slice(name.as_bytes());
            record[136..].copy_from_slice(&(payload.len() as u64).to_le_bytes());
            data.extend_from_slice(&record);
            data.extend_from_slice(payload);
        }

        let archive = Archive::from_reader(&data[..]).unwrap();
        assert_eq!(archive.format(), ArchiveFormat::Qar);
        assert_eq!(
            read_all(archive),
            vec![
                ("one".to_string(), b"1".to_vec()),
                ("two".to_string(), b"22".to_vec()),
            ]
        );
    }

    #[test]
    fn test_archive_bar_end_to_end() {
        let mut data = vec![0u8; 10];
        data.extend_from_slice(&1u16.to_le_bytes());
        let mut slot = [0u8; 256];
        slot[..8].copy_from_slice(b"test.txt");
        slot[252..].copy_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&slot);
        let mut meta = [0u8; 12];
        meta[4..].copy_from_slice(&5u64.to_le_bytes());
        data.extend_from_slice(&meta);
        data.extend_from_slice(b"hello");

        let archive = Archive::from_reader(&data[..]).unwrap();
        assert_eq!(archive.name(), "BAR");
        assert_eq!(read_all(archive), vec![("test.txt".to_string(), b"hello".to_vec())]);
    }

    #[test]
    fn test_archive_mar_decrypted_end_to_end() {
        let payload: Vec<u8> = (0..=255).cycle().take(2049).collect();
        let mut cipher = payload.clone();
        apply_keystream(b"bgm\\track.wav", &mut cipher);

        let mut data = b"MASMAR0\0".to_vec();
        data.push(MarRecordType::File as u8);
        data.extend_from_slice(b"bgm\\track.wav\0");
        data.extend_from_slice(&(cipher.len() as u32).to_le_bytes());
        data.extend_from_slice(&cipher);
        data.push(MarRecordType::End as u8);

        let archive = Archive::from_reader(&data[..]).unwrap().with_decryption(true);
        assert_eq!(archive.format(), ArchiveFormat::Mar);
        assert_eq!(read_all(archive), vec![("bgm\\track.wav".to_string(), payload)]);
    }
}
