//! Writing archive entries to disk.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::entry::ArchiveEntry;
use crate::{Error, Result};

/// Size of the buffer payloads are copied through.
pub const COPY_BUFFER_SIZE: usize = 1024;

/// Writes entries below a destination directory.
///
/// Entry names use `\` as a separator on disk; it is converted to `/` on
/// non-Windows hosts. Names that are absolute or climb out of the
/// destination with `..` are rejected.
///
/// Each extracted file is logged as `name -> path` at info level unless the
/// extractor is silent.
#[derive(Debug, Clone)]
pub struct Extractor {
    dest: PathBuf,
    silent: bool,
    buffer: Box<[u8; COPY_BUFFER_SIZE]>,
}

impl Extractor {
    /// Create an extractor writing below `dest`.
    pub fn new<P: Into<PathBuf>>(dest: P) -> Self {
        Self {
            dest: dest.into(),
            silent: false,
            buffer: Box::new([0u8; COPY_BUFFER_SIZE]),
        }
    }

    /// Suppress the per-file log line.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// The destination directory.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Whether per-file logging is suppressed.
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Map an entry name to its output path.
    pub fn destination_for(&self, name: &str) -> Result<PathBuf> {
        let normalized = if cfg!(windows) {
            name.to_string()
        } else {
            name.replace('\\', "/")
        };

        let mut path = self.dest.clone();
        let mut depth = 0;
        for component in Path::new(&normalized).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::UnsafePath(name.to_string()));
                }
            }
        }

        if depth == 0 {
            return Err(Error::UnsafePath(name.to_string()));
        }
        Ok(path)
    }

    /// Stream one entry's payload into its output file.
    ///
    /// Parent directories are created as needed. Returns the written path.
    pub fn extract(&mut self, entry: &mut ArchiveEntry<'_>) -> Result<PathBuf> {
        let name = entry.filename().into_owned();
        let path = self.destination_for(&name)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&path)?);
        let mut written = 0u64;
        loop {
            let n = match entry.read(&mut self.buffer[..]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            writer.write_all(&self.buffer[..n])?;
            written += n as u64;
        }
        writer.flush()?;

        debug!(path = %path.display(), written, "extracted entry");
        if !self.silent {
            info!("{} -> {}", name, path.display());
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::QarReader;

    #[test]
    fn test_destination_normalizes_separators() {
        let extractor = Extractor::new("out");
        let path = extractor.destination_for("data\\sound\\a.ogg").unwrap();

        if cfg!(windows) {
            assert_eq!(path, Path::new("out\\data\\sound\\a.ogg"));
        } else {
            assert_eq!(path, Path::new("out/data/sound/a.ogg"));
        }
    }

    #[test]
    fn test_destination_rejects_escapes() {
        let extractor = Extractor::new("out");

        for name in ["..\\evil.dll", "a/../../b", "/etc/passwd", "\\root", "", "."] {
            assert!(
                matches!(extractor.destination_for(name), Err(Error::UnsafePath(_))),
                "{name:?} accepted"
            );
        }
        assert!(extractor.destination_for("./fine.txt").is_ok());
    }

    #[test]
    fn test_extract_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = Extractor::new(dir.path());

        let mut data = b"QAR\0".to_vec();
        data.extend_from_slice(&2u32.to_le_bytes());
        for (name, payload) in [("a\\b\\c.txt", &b"nested"[..]), ("top.bin", &b"\x00\x01"[..])] {
            let mut record = [0u8; 144];
            record[..name.len()].copy_from_slice(name.as_bytes());
            record[136..].copy_from_slice(&(payload.len() as u64).to_le_bytes());
            data.extend_from_slice(&record);
            data.extend_from_slice(payload);
        }

        let mut written = Vec::new();
        QarReader
            .read(&mut &data[..], |entry: &mut ArchiveEntry<'_>| {
                written.push(extractor.extract(entry)?);
                Ok::<_, Error>(())
            })
            .unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(fs::read(&written[0]).unwrap(), b"nested");
        assert_eq!(fs::read(&written[1]).unwrap(), b"\x00\x01");
        assert!(written[0].starts_with(dir.path()));
    }

    #[test]
    fn test_extract_payload_larger_than_copy_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = Extractor::new(dir.path()).silent(true);
        assert!(extractor.is_silent());

        let payload: Vec<u8> = (0..3 * COPY_BUFFER_SIZE + 7).map(|i| (i % 251) as u8).collect();
        let mut data = b"QAR\0".to_vec();
        data.extend_from_slice(&1u32.to_le_bytes());
        let mut record = [0u8; 144];
        record[..7].copy_from_slice(b"big.bin");
        record[136..].copy_from_slice(&(payload.len() as u64).to_le_bytes());
        data.extend_from_slice(&record);
        data.extend_from_slice(&payload);

        let mut written = Vec::new();
        QarReader
            .read(&mut &data[..], |entry: &mut ArchiveEntry<'_>| {
                written.push(extractor.extract(entry)?);
                assert_eq!(entry.remaining(), 0);
                Ok::<_, Error>(())
            })
            .unwrap();

        assert_eq!(written, vec![dir.path().join("big.bin")]);
        assert_eq!(fs::read(&written[0]).unwrap(), payload);
    }
}
