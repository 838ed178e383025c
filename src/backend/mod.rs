//! The capability set the extraction driver drives.
//!
//! A backend owns the archive byte stream and decides what materialising an
//! entry means: writing to a filesystem tree, printing a listing, or anything
//! else. The driver only ever talks to it through [`TarOperations`].

use std::io;

use anyhow::Result;

use crate::archive::header::TarEntry;

pub mod fs;
pub mod list;

pub use self::fs::{FsBackend, FsOptions};
pub use self::list::{ListBackend, ListFormat, ListedEntry};

/// Operations invoked by [`crate::archive::Extractor`].
///
/// Every materialising call returns `Ok(())` to continue or an error to stop
/// the extraction; the error is handed back to the caller unchanged.
pub trait TarOperations {
    /// Read up to `buf.len()` bytes of archive data.
    ///
    /// Implementations fill the whole buffer unless the stream ends; a short
    /// count is interpreted as end of stream or truncation.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Materialise a regular file.
    ///
    /// The entry's data area (`size` bytes plus padding up to the block
    /// size) follows in the stream and must be consumed here.
    fn extract_file(&mut self, entry: &TarEntry) -> Result<()>;

    /// Materialise a directory. Any trailing `/` has been stripped.
    fn mkdir(&mut self, entry: &TarEntry) -> Result<()>;

    /// Materialise a character device, block device or FIFO.
    fn mknod(&mut self, entry: &TarEntry) -> Result<()>;

    /// Create `entry.name` as a hard link to `entry.link_name`.
    fn link(&mut self, entry: &TarEntry) -> Result<()>;

    /// Create `entry.name` as a symbolic link pointing at `entry.link_name`.
    ///
    /// Only called once the rest of the archive has been processed.
    fn symlink(&mut self, entry: &TarEntry) -> Result<()>;
}
