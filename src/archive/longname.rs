//! GNU long name / long link continuation handling.
//!
//! A `'L'` or `'K'` header only announces the length of a payload stored in
//! the blocks that follow it. The payload replaces the name (or link name) of
//! the next real entry.

use bstr::{BString, ByteSlice};
use log::{trace, warn};

use super::header::{EntryType, TarEntry, BLOCK_SIZE};
use crate::backend::TarOperations;
use crate::error::TarError;

/// Which field a continuation payload overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongKind {
    Name,
    Link,
}

impl LongKind {
    /// Kind announced by `entry_type`, if it is a continuation header.
    #[must_use]
    pub fn from_entry_type(entry_type: EntryType) -> Option<Self> {
        match entry_type {
            EntryType::GnuLongName => Some(Self::Name),
            EntryType::GnuLongLink => Some(Self::Link),
            _ => None,
        }
    }
}

/// Pending continuation payloads, carried across loop iterations.
#[derive(Debug, Default)]
pub struct LongNameState {
    name: Option<BString>,
    link: Option<BString>,
}

impl LongNameState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload, replacing any pending one of the same kind.
    pub fn stash(&mut self, kind: LongKind, value: BString) {
        let slot = match kind {
            LongKind::Name => &mut self.name,
            LongKind::Link => &mut self.link,
        };
        if let Some(previous) = slot.replace(value) {
            warn!("discarding unused GNU long {kind:?} {}", previous.as_bstr());
        }
    }

    /// Move pending payloads into `entry` and clear both slots.
    pub fn apply(&mut self, entry: &mut TarEntry) {
        if let Some(name) = self.name.take() {
            entry.name = name;
        }
        if let Some(link) = self.link.take() {
            entry.link_name = link;
        }
    }

    /// Whether either payload is waiting for an entry.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.name.is_some() || self.link.is_some()
    }
}

/// Read the `size`-byte continuation payload that follows a long record.
///
/// Padding in the final block is discarded and the result is cut at its
/// first NUL, mirroring how fixed-width text fields are read.
pub fn read_continuation(ops: &mut dyn TarOperations, size: u64) -> Result<BString, TarError> {
    let expected = usize::try_from(size).map_err(|_| TarError::TruncatedContinuation {
        expected: usize::MAX,
        got: 0,
    })?;
    let mut payload = Vec::new();
    let mut block = [0u8; BLOCK_SIZE];
    while payload.len() < expected {
        let got = ops.read(&mut block).map_err(TarError::Read)?;
        if got != BLOCK_SIZE {
            return Err(TarError::TruncatedContinuation {
                expected,
                got: payload.len() + got,
            });
        }
        let take = (expected - payload.len()).min(BLOCK_SIZE);
        payload.extend_from_slice(&block[..take]);
        trace!("continuation block: {}/{} bytes", payload.len(), expected);
    }
    if let Some(nul) = payload.find_byte(0) {
        payload.truncate(nul);
    }
    Ok(BString::from(payload))
}
