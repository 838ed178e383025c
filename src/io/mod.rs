//! Block-oriented helpers over an arbitrary byte source.
//!
//! Backends own the archive stream. [`BlockReader`] gives them the
//! whole-block reads the extraction driver expects, plus the data-area
//! helpers a backend needs to consume a regular file's contents.

use std::io::{self, ErrorKind, Read, Write};

use crate::archive::header::BLOCK_SIZE;

/// Reader that hands out complete tar blocks.
#[derive(Debug)]
pub struct BlockReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> BlockReader<R> {
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes consumed from the underlying reader so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fill `buf` completely unless the stream ends first.
    ///
    /// Returns the number of bytes stored; anything short of `buf.len()`
    /// means end of stream was reached.
    pub fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }

    /// Copy the `size`-byte data area of an entry into `out`, consuming the
    /// block padding that follows it.
    pub fn copy_data<W: Write + ?Sized>(&mut self, size: u64, out: &mut W) -> io::Result<u64> {
        let mut block = [0u8; BLOCK_SIZE];
        let mut remaining = size;
        while remaining > 0 {
            let got = self.fill(&mut block)?;
            if got != BLOCK_SIZE {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("entry data truncated with {remaining} of {size} bytes outstanding"),
                ));
            }
            let take = remaining.min(BLOCK_SIZE as u64) as usize;
            out.write_all(&block[..take])?;
            remaining -= take as u64;
        }
        Ok(size)
    }

    /// Discard the data area of an entry.
    pub fn skip_data(&mut self, size: u64) -> io::Result<u64> {
        self.copy_data(size, &mut io::sink())
    }
}
