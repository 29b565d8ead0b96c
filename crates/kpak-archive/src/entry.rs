//! Archive entries and bounded payload streams.

use std::borrow::Cow;
use std::io::{self, Read};

use crate::crypto::KeystreamDecryptor;

/// A read-only view that yields exactly `size` bytes of its source.
///
/// Archive entries are stored back to back with no index, so each payload is
/// exposed through one of these to keep callers from reading into the next
/// entry's header. If the source ends early the reader fails with
/// [`io::ErrorKind::UnexpectedEof`] instead of returning a short payload.
#[derive(Debug)]
pub struct BoundedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> BoundedReader<R> {
    /// Create a reader over the next `size` bytes of `inner`.
    pub fn new(inner: R, size: u64) -> Self {
        Self {
            inner,
            remaining: size,
        }
    }

    /// Bytes left before the bound is reached.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Unwrap the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for BoundedReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || out.is_empty() {
            return Ok(0);
        }

        let max = usize::try_from(self.remaining).map_or(out.len(), |r| r.min(out.len()));
        let n = self.inner.read(&mut out[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("archive ended with {} entry bytes remaining", self.remaining),
            ));
        }

        self.remaining -= n as u64;
        Ok(n)
    }
}

enum Payload<'a> {
    Plain(BoundedReader<&'a mut dyn Read>),
    Encrypted(KeystreamDecryptor<BoundedReader<&'a mut dyn Read>>),
}

/// A single file within an archive, handed to the entry callback.
///
/// The entry borrows the archive source, so it is only valid for the
/// duration of the callback. Reading it yields the (decrypted, when
/// applicable) payload. Anything the callback leaves unread is discarded by
/// the parser before it moves to the next record.
pub struct ArchiveEntry<'a> {
    name: Vec<u8>,
    size: u64,
    position: u64,
    payload: Payload<'a>,
}

impl<'a> ArchiveEntry<'a> {
    /// Create an entry whose payload is stored as-is.
    pub(crate) fn plain(name: &[u8], size: u64, source: &'a mut dyn Read) -> Self {
        Self {
            name: name.to_vec(),
            size,
            position: 0,
            payload: Payload::Plain(BoundedReader::new(source, size)),
        }
    }

    /// Create an entry whose payload is keystream-encrypted.
    pub(crate) fn encrypted(name: &[u8], size: u64, source: &'a mut dyn Read) -> Self {
        let bounded = BoundedReader::new(source, size);
        Self {
            name: name.to_vec(),
            size,
            position: 0,
            payload: Payload::Encrypted(KeystreamDecryptor::new(bounded, name)),
        }
    }

    /// The entry's path within the archive.
    ///
    /// Invalid UTF-8 sequences are replaced; use [`name_bytes`](Self::name_bytes)
    /// for the stored bytes.
    pub fn filename(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// The entry's path exactly as stored in the archive.
    #[inline]
    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    /// Declared payload size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Payload bytes not yet read.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.size - self.position
    }

    /// Whether the payload is decrypted while reading.
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        matches!(self.payload, Payload::Encrypted(_))
    }

    /// Discard the rest of the payload, returning how many bytes were dropped.
    ///
    /// Encrypted payloads are skipped without decrypting them.
    pub fn skip(&mut self) -> io::Result<u64> {
        let skipped = self.remaining();
        match &mut self.payload {
            Payload::Plain(reader) => io::copy(reader, &mut io::sink())?,
            Payload::Encrypted(decryptor) => io::copy(decryptor.get_mut(), &mut io::sink())?,
        };
        self.position = self.size;
        Ok(skipped)
    }
}

impl Read for ArchiveEntry<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.size {
            return Ok(0);
        }

        let n = match &mut self.payload {
            Payload::Plain(reader) => reader.read(out)?,
            Payload::Encrypted(decryptor) => decryptor.read(out)?,
        };
        self.position += n as u64;
        Ok(n)
    }
}

impl std::fmt::Debug for ArchiveEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("filename", &self.filename())
            .field("size", &self.size)
            .field("position", &self.position)
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}
