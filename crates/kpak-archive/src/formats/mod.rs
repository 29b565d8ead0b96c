//! On-disk layouts and parsers for the supported archive formats.
//!
//! Each parser consumes the raw archive stream from its first byte (the
//! detector only peeks) and hands every file to the caller's callback as an
//! [`ArchiveEntry`].

mod bar;
mod mar;
mod qar;

pub use bar::{BarEntryMetadata, BarHeader, BarNameSlot, BarReader};
pub use mar::{MarReader, MarRecordType, MAR_MAGIC, MAX_FILENAME};
pub use qar::{QarHeader, QarReader, QarRecord};

use tracing::{debug, trace};

use crate::entry::ArchiveEntry;
use crate::Error;

/// Hand one entry to the callback, then drain whatever it left unread.
///
/// Draining keeps the source positioned at the next record header even when
/// the callback only inspects part of a payload.
pub(crate) fn deliver<F, E>(mut entry: ArchiveEntry<'_>, callback: &mut F) -> Result<(), E>
where
    F: FnMut(&mut ArchiveEntry<'_>) -> Result<(), E>,
    E: From<Error>,
{
    debug!(
        name = %entry.filename(),
        size = entry.size(),
        encrypted = entry.is_encrypted(),
        "entry"
    );

    callback(&mut entry)?;

    let leftover = entry.skip().map_err(Error::from)?;
    if leftover > 0 {
        trace!(leftover, "discarded unread payload");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by the parser tests.

    use std::io::Read;

    use crate::entry::ArchiveEntry;
    use crate::Error;

    /// Callback error type distinct from the crate error.
    #[derive(Debug, PartialEq, Eq)]
    pub enum TestError {
        Stop(usize),
        Archive(String),
    }

    impl From<Error> for TestError {
        fn from(error: Error) -> Self {
            Self::Archive(error.to_string())
        }
    }

    /// Collect `(filename, payload)` pairs from an entry callback.
    pub fn collect(
        entries: &mut Vec<(String, Vec<u8>)>,
    ) -> impl FnMut(&mut ArchiveEntry<'_>) -> Result<(), Error> + '_ {
        move |entry: &mut ArchiveEntry<'_>| {
            let mut payload = Vec::new();
            entry.read_to_end(&mut payload)?;
            entries.push((entry.filename().into_owned(), payload));
            Ok(())
        }
    }
}
