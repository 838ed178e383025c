//! Routing of resolved entries to backend operations.

use bstr::ByteSlice;
use log::debug;

use super::header::{EntryType, TarEntry};
use super::symlinks::SymlinkQueue;
use crate::backend::TarOperations;
use crate::error::TarError;

/// What happened to a dispatched entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A backend operation ran and succeeded.
    Applied,
    /// The entry was queued for the symlink pass.
    Deferred,
}

/// Hand `entry` to the matching backend operation.
///
/// `entry` must already carry any long name/link substitution and a
/// non-empty name. Symbolic links move into `symlinks` instead of reaching
/// the backend.
pub fn dispatch(
    ops: &mut dyn TarOperations,
    mut entry: TarEntry,
    symlinks: &mut SymlinkQueue,
) -> Result<Dispatched, TarError> {
    debug!(
        "{:?} {} ({} bytes)",
        entry.entry_type,
        entry.name.as_bstr(),
        entry.size
    );
    let result = match entry.entry_type {
        // Pre-POSIX archives mark directories as regular files with a
        // trailing slash.
        EntryType::OldRegular | EntryType::Regular if !entry.name.ends_with(b"/") => {
            ops.extract_file(&entry)
        }
        EntryType::OldRegular | EntryType::Regular | EntryType::Directory => {
            if entry.name.ends_with(b"/") {
                entry.name.pop();
            }
            ops.mkdir(&entry)
        }
        EntryType::HardLink => ops.link(&entry),
        EntryType::Symlink => {
            symlinks.push(entry);
            return Ok(Dispatched::Deferred);
        }
        EntryType::CharDevice | EntryType::BlockDevice | EntryType::Fifo => ops.mknod(&entry),
        EntryType::Contiguous
        | EntryType::GnuLongLink
        | EntryType::GnuLongName
        | EntryType::Unrecognized(_) => {
            return Err(TarError::BadHeaderField {
                type_flag: entry.entry_type.as_byte(),
                name: entry.name,
            });
        }
    };
    result.map_err(TarError::Backend)?;
    Ok(Dispatched::Applied)
}
