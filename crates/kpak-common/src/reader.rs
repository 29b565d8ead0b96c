//! Stream reading primitives for sequential archive parsing.
//!
//! Archives are read in a single forward pass, so everything here works on
//! [`Read`] streams rather than byte slices:
//!
//! - [`StreamReader`] - a buffered source with non-consuming look-ahead
//! - [`ReadExt`] - fixed-layout struct reads, complete-fill reads and
//!   bounded null-terminated string reads

use std::io::{self, BufRead, Read};

use zerocopy::FromBytes;

use crate::{Error, Result};

/// A buffered reader that can look ahead without consuming.
///
/// Unlike [`std::io::BufReader`], [`peek`](Self::peek) keeps reading from the
/// inner stream until the requested number of bytes is buffered, so format
/// detection never sees a spuriously short prefix.
///
/// # Example
///
/// ```
/// use std::io::Read;
/// use kpak_common::StreamReader;
///
/// let mut reader = StreamReader::new(&b"QAR\0rest"[..]);
/// assert_eq!(reader.peek(3).unwrap(), b"QAR");
///
/// let mut all = Vec::new();
/// reader.read_to_end(&mut all).unwrap();
/// assert_eq!(all, b"QAR\0rest");
/// ```
pub struct StreamReader<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
}

impl<R: Read> StreamReader<R> {
    /// Default internal buffer size.
    pub const DEFAULT_CAPACITY: usize = 64 * 1024;

    /// Create a new reader with the default buffer size.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY, inner)
    }

    /// Create a new reader with a specific buffer size.
    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            inner,
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }

    /// Look at the next `count` bytes without consuming them.
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] if the stream ends first.
    pub fn peek(&mut self, count: usize) -> io::Result<&[u8]> {
        if count > self.buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "peek larger than the reader buffer",
            ));
        }

        if self.filled - self.pos < count {
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;

            while self.filled < count {
                match self.inner.read(&mut self.buf[self.filled..]) {
                    Ok(0) => {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("needed {count} bytes but only {} available", self.filled),
                        ))
                    }
                    Ok(n) => self.filled += n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(&self.buf[self.pos..self.pos + count])
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwrap the reader, discarding any buffered bytes.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for StreamReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        // Large reads on an empty buffer bypass it entirely.
        if self.pos == self.filled && out.len() >= self.buf.len() {
            return self.inner.read(out);
        }

        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for StreamReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled {
            self.pos = 0;
            self.filled = loop {
                match self.inner.read(&mut self.buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            };
        }
        Ok(&self.buf[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.filled);
    }
}

impl<R> std::fmt::Debug for StreamReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("buffered", &(self.filled - self.pos))
            .field("capacity", &self.buf.len())
            .finish()
    }
}

/// Trait for reading binary data from streams.
///
/// This extends `Read` with methods for reading fixed-size structures.
pub trait ReadExt: Read {
    /// Read a fixed-layout structure from the stream.
    fn read_struct<T: FromBytes>(&mut self) -> io::Result<T> {
        let size = std::mem::size_of::<T>();
        let mut bytes = vec![0u8; size];
        self.read_exact(&mut bytes)?;
        T::read_from_bytes(&bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", e)))
    }

    /// Fill `buf` completely, or as far as the stream allows.
    ///
    /// Short and interrupted reads are retried. A return value smaller than
    /// `buf.len()` means the stream is exhausted.
    fn read_full(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Read a null-terminated string into `buf`, returning its length.
    ///
    /// The terminator is consumed but not stored. Fails with
    /// [`Error::StringTooLong`] if `buf` fills up before a terminator is seen.
    fn read_cstring_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        for i in 0..buf.len() {
            let mut byte = 0u8;
            self.read_exact(std::slice::from_mut(&mut byte))?;
            if byte == 0 {
                return Ok(i);
            }
            buf[i] = byte;
        }
        Err(Error::StringTooLong { max: buf.len() })
    }
}

impl<R: Read + ?Sized> ReadExt for R {}

/// Get the bytes before the first null in a fixed-size slot.
#[inline]
pub fn until_nul(bytes: &[u8]) -> &[u8] {
    match memchr::memchr(0, bytes) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// Strip trailing null padding from a fixed-size slot.
#[inline]
pub fn trim_nul_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map(|i| i + 1).unwrap_or(0);
    &bytes[..end]
}
