//! Deferred symbolic links.
//!
//! A link may point at something created later in the archive, so links are
//! held back and applied in archive order once everything else exists.

use std::collections::VecDeque;

use bstr::ByteSlice;
use log::trace;

use super::header::TarEntry;
use crate::backend::TarOperations;
use crate::error::TarError;

/// FIFO of symlink entries waiting for the end of the main pass.
#[derive(Debug, Default)]
pub struct SymlinkQueue {
    pending: VecDeque<TarEntry>,
}

impl SymlinkQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TarEntry) {
        trace!(
            "deferring symlink {} -> {}",
            entry.name.as_bstr(),
            entry.link_name.as_bstr()
        );
        self.pending.push_back(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply every queued link in order, stopping at the first failure.
    ///
    /// Entries not yet applied when a failure occurs are dropped with the
    /// queue.
    pub fn drain(mut self, ops: &mut dyn TarOperations) -> Result<usize, TarError> {
        let mut applied = 0;
        while let Some(entry) = self.pending.pop_front() {
            ops.symlink(&entry).map_err(TarError::Backend)?;
            applied += 1;
        }
        Ok(applied)
    }
}
