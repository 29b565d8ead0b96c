//! MAR payload decryption.
//!
//! MAR archives can obscure file payloads with an XOR keystream keyed per
//! file. The key state is seeded from two CRCs of the raw filename bytes and
//! advanced once per 4-byte group:
//!
//! ```text
//! key32 = rotl5(key32 + 3 * key16)
//! ```
//!
//! Data is processed in 1024-byte blocks. A block is filled completely
//! before any byte of it is transformed, because the grouping (and therefore
//! the keystream) is anchored to block offsets. The final group of a block
//! that is shorter than 4 bytes is XORed entirely with key byte 0.

use std::io::{self, Read};

use kpak_common::{crc, ReadExt};
use tracing::trace;

/// Size of one decryption block.
pub const BLOCK_SIZE: usize = 1024;

/// Per-file keystream state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyState {
    key32: u32,
    key16: u16,
}

impl KeyState {
    /// Derive the initial key state from a filename's raw bytes.
    pub fn from_filename(name: &[u8]) -> Self {
        Self {
            key32: crc::crc32(name),
            key16: crc::crc16(name),
        }
    }

    /// Current 32-bit key.
    #[inline]
    pub fn key32(&self) -> u32 {
        self.key32
    }

    /// 16-bit key (constant for the lifetime of the state).
    #[inline]
    pub fn key16(&self) -> u16 {
        self.key16
    }

    /// Advance the key and return its little-endian bytes.
    #[inline]
    pub fn advance(&mut self) -> [u8; 4] {
        self.key32 = self
            .key32
            .wrapping_add(u32::from(self.key16) * 3)
            .rotate_left(5);
        self.key32.to_le_bytes()
    }

    /// Transform one block in place.
    ///
    /// `block` must be a complete block, or the final block of a stream.
    /// Calling this on a partially filled block desynchronizes the keystream.
    pub fn apply(&mut self, block: &mut [u8]) {
        let mut groups = block.chunks_exact_mut(4);
        for group in &mut groups {
            let key = self.advance();
            for (byte, k) in group.iter_mut().zip(key) {
                *byte ^= k;
            }
        }

        // Every tail byte takes key byte 0. Some packers only key the first
        // tail byte; such archives differ in their last 1-3 bytes per block.
        let tail = groups.into_remainder();
        if !tail.is_empty() {
            let key = self.advance();
            for byte in tail {
                *byte ^= key[0];
            }
        }
    }
}

/// Apply the MAR keystream to a whole payload in memory.
///
/// The transform is its own inverse, so this both encrypts and decrypts.
/// Block boundaries match [`KeystreamDecryptor`].
pub fn apply_keystream(filename: &[u8], data: &mut [u8]) {
    let mut keys = KeyState::from_filename(filename);
    for block in data.chunks_mut(BLOCK_SIZE) {
        keys.apply(block);
    }
}

/// Streaming decryptor for one MAR entry.
///
/// Wraps the entry's bounded payload stream; it never reads past the
/// declared entry size because the inner reader cannot.
pub struct KeystreamDecryptor<R> {
    inner: R,
    keys: KeyState,
    block: [u8; BLOCK_SIZE],
    /// Number of valid bytes in `block`.
    head: usize,
    /// Read position within `block`.
    tail: usize,
    exhausted: bool,
    /// Set once a refill fails; the block alignment is lost after that.
    failed: Option<io::ErrorKind>,
}

impl<R: Read> KeystreamDecryptor<R> {
    /// Create a decryptor keyed by the entry's raw filename bytes.
    pub fn new(inner: R, filename: &[u8]) -> Self {
        Self {
            inner,
            keys: KeyState::from_filename(filename),
            block: [0u8; BLOCK_SIZE],
            head: 0,
            tail: 0,
            exhausted: false,
            failed: None,
        }
    }

    /// Get a reference to the wrapped stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Get a mutable reference to the wrapped stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwrap the decryptor.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn refill(&mut self) -> io::Result<()> {
        self.head = 0;
        self.tail = 0;

        let filled = match self.inner.read_full(&mut self.block) {
            Ok(filled) => filled,
            Err(err) => {
                self.failed = Some(err.kind());
                return Err(err);
            }
        };
        if filled < BLOCK_SIZE {
            self.exhausted = true;
        }

        self.keys.apply(&mut self.block[..filled]);
        self.head = filled;

        trace!(filled, exhausted = self.exhausted, "decrypted block");
        Ok(())
    }
}

impl<R: Read> Read for KeystreamDecryptor<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        if let Some(kind) = self.failed {
            return Err(io::Error::new(kind, "payload stream failed mid-block"));
        }

        if self.tail >= self.head {
            if self.exhausted {
                return Ok(0);
            }
            self.refill()?;
        }

        let n = (self.head - self.tail).min(out.len());
        out[..n].copy_from_slice(&self.block[self.tail..self.tail + n]);
        self.tail += n;
        Ok(n)
    }
}

impl<R> std::fmt::Debug for KeystreamDecryptor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystreamDecryptor")
            .field("keys", &self.keys)
            .field("buffered", &(self.head - self.tail))
            .field("exhausted", &self.exhausted)
            .field("failed", &self.failed)
            .finish()
    }
}
