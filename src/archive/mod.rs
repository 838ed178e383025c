//! The extraction driver.
//!
//! [`Extractor::extract`] reads header blocks from a backend, decodes them,
//! folds GNU continuation records into the entry that follows, dispatches
//! each entry and finally applies the deferred symbolic links.

use bstr::ByteSlice;
use log::debug;

use crate::backend::TarOperations;
use crate::error::TarError;
use crate::owner::{OwnerLookup, SystemOwners};

use self::dispatch::{dispatch, Dispatched};
use self::header::{HeaderBlock, BLOCK_SIZE};
use self::longname::{read_continuation, LongKind, LongNameState};
use self::symlinks::SymlinkQueue;

pub mod dispatch;
pub mod header;
pub mod longname;
pub mod symlinks;

pub use self::header::{EntryType, TarEntry, TarFormat};

/// How the main pass over the archive ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveEnd {
    /// A header block with an empty name and no valid checksum.
    Terminator,
    /// The byte source ran dry on a block boundary.
    EndOfStream,
}

/// Outcome of a successful extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Entries handed to a backend operation during the main pass.
    pub entries: usize,
    /// Symbolic links applied after the main pass.
    pub symlinks: usize,
    pub end: ArchiveEnd,
}

/// Drives a [`TarOperations`] backend over one archive stream.
pub struct Extractor {
    owners: Box<dyn OwnerLookup>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Create an extractor that resolves owner names through the system.
    #[must_use]
    pub fn new() -> Self {
        Self {
            owners: Box::new(SystemOwners::new()),
        }
    }

    /// Replace the owner name resolver.
    #[must_use]
    pub fn with_owner_lookup(mut self, owners: Box<dyn OwnerLookup>) -> Self {
        self.owners = owners;
        self
    }

    /// Process every entry of the archive supplied by `ops`.
    ///
    /// The first error stops the pass. Queued symbolic links are only
    /// applied when the main pass succeeded.
    pub fn extract(&mut self, ops: &mut dyn TarOperations) -> Result<ExtractSummary, TarError> {
        let mut long_names = LongNameState::new();
        let mut symlinks = SymlinkQueue::new();
        let mut entries = 0;
        let mut block = [0u8; BLOCK_SIZE];

        let end = loop {
            let got = ops.read(&mut block).map_err(TarError::Read)?;
            match got {
                BLOCK_SIZE => {}
                0 => break ArchiveEnd::EndOfStream,
                got => return Err(TarError::PartialHeaderRecord { got }),
            }

            let header = HeaderBlock::new(&block);
            if !header.is_checksum_valid() {
                // A ustar prefix alone still names an entry.
                let name = header.name();
                if name.is_empty() {
                    break ArchiveEnd::Terminator;
                }
                return Err(TarError::HeaderChecksum { name });
            }

            let mut entry = header.decode(self.owners.as_mut());
            let long_kind = LongKind::from_entry_type(entry.entry_type);
            if long_kind.is_none() {
                long_names.apply(&mut entry);
            }
            if entry.name.is_empty() {
                return Err(TarError::BadHeaderData);
            }

            if let Some(kind) = long_kind {
                let payload = read_continuation(ops, entry.size)?;
                debug!("GNU long {kind:?}: {}", payload.as_bstr());
                long_names.stash(kind, payload);
                continue;
            }

            if dispatch(ops, entry, &mut symlinks)? == Dispatched::Applied {
                entries += 1;
            }
        };

        if long_names.is_pending() {
            debug!("archive ended with an unused GNU long name or link");
        }
        debug!("end of archive ({end:?}), applying {} symlinks", symlinks.len());
        let applied = symlinks.drain(ops)?;
        Ok(ExtractSummary {
            entries,
            symlinks: applied,
            end,
        })
    }
}

/// Extract an archive with the default [`Extractor`].
pub fn extract(ops: &mut dyn TarOperations) -> Result<ExtractSummary, TarError> {
    Extractor::new().extract(ops)
}
