//! Shared helpers: hand-built header blocks and a backend that records calls.

#![allow(dead_code)]

use std::io::{self, Cursor, Read};

use anyhow::{anyhow, Result};
use tarx::archive::header::BLOCK_SIZE;
use tarx::archive::TarEntry;
use tarx::backend::TarOperations;
use tarx::io::BlockReader;

pub const MAGIC_GNU: &[u8; 8] = b"ustar  \0";
pub const MAGIC_USTAR: &[u8; 8] = b"ustar\000";

/// Builder for a single raw header block.
#[derive(Clone)]
pub struct RawHeader {
    block: [u8; BLOCK_SIZE],
    fix_checksum: bool,
}

impl RawHeader {
    pub fn new(name: &str, type_flag: u8) -> Self {
        let mut header = Self {
            block: [0u8; BLOCK_SIZE],
            fix_checksum: true,
        };
        header
            .name(name.as_bytes())
            .octal(100..108, 0o644)
            .octal(108..116, 1000)
            .octal(116..124, 1000)
            .octal(124..136, 0)
            .octal(136..148, 1_700_000_000)
            .magic(MAGIC_GNU);
        header.block[156] = type_flag;
        header
    }

    pub fn file(name: &str, size: u64) -> Self {
        let mut header = Self::new(name, b'0');
        header.size(size);
        header
    }

    pub fn dir(name: &str) -> Self {
        Self::new(name, b'5')
    }

    pub fn symlink(name: &str, target: &str) -> Self {
        let mut header = Self::new(name, b'2');
        header.link(target.as_bytes());
        header
    }

    pub fn hard_link(name: &str, target: &str) -> Self {
        let mut header = Self::new(name, b'1');
        header.link(target.as_bytes());
        header
    }

    pub fn long_name(size: u64) -> Self {
        let mut header = Self::new("././@LongLink", b'L');
        header.size(size);
        header
    }

    pub fn long_link(size: u64) -> Self {
        let mut header = Self::new("././@LongLink", b'K');
        header.size(size);
        header
    }

    pub fn set(&mut self, start: usize, value: &[u8]) -> &mut Self {
        self.block[start..start + value.len()].copy_from_slice(value);
        self
    }

    pub fn name(&mut self, name: &[u8]) -> &mut Self {
        self.block[..100].fill(0);
        self.set(0, name)
    }

    pub fn link(&mut self, target: &[u8]) -> &mut Self {
        self.block[157..257].fill(0);
        self.set(157, target)
    }

    pub fn prefix(&mut self, prefix: &[u8]) -> &mut Self {
        self.set(345, prefix)
    }

    pub fn magic(&mut self, magic: &[u8; 8]) -> &mut Self {
        self.set(257, magic)
    }

    pub fn size(&mut self, size: u64) -> &mut Self {
        self.octal(124..136, size)
    }

    pub fn owner(&mut self, user: &str, group: &str) -> &mut Self {
        self.set(265, user.as_bytes()).set(297, group.as_bytes())
    }

    pub fn device(&mut self, major: u64, minor: u64) -> &mut Self {
        self.octal(329..337, major).octal(337..345, minor)
    }

    /// Write `value` as zero-padded octal followed by a NUL.
    pub fn octal(&mut self, range: std::ops::Range<usize>, value: u64) -> &mut Self {
        let width = range.len() - 1;
        let text = format!("{value:0width$o}\0");
        self.block[range].copy_from_slice(text.as_bytes());
        self
    }

    /// Keep whatever is in the checksum field instead of recomputing it.
    pub fn raw_checksum(&mut self, field: &[u8; 8]) -> &mut Self {
        self.fix_checksum = false;
        self.set(148, field)
    }

    pub fn to_block(&self) -> [u8; BLOCK_SIZE] {
        let mut block = self.block;
        if self.fix_checksum {
            block[148..156].fill(b' ');
            let sum: u64 = block.iter().map(|&b| u64::from(b)).sum();
            let text = format!("{sum:06o}\0 ");
            block[148..156].copy_from_slice(text.as_bytes());
        }
        block
    }
}

/// Assembles an archive byte stream.
#[derive(Default)]
pub struct ArchiveBuilder {
    bytes: Vec<u8>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, header: &RawHeader) -> Self {
        self.bytes.extend_from_slice(&header.to_block());
        self
    }

    /// Append `data` padded to a whole number of blocks.
    pub fn data(mut self, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(data);
        let rem = data.len() % BLOCK_SIZE;
        if rem != 0 {
            self.bytes.resize(self.bytes.len() + BLOCK_SIZE - rem, 0);
        }
        self
    }

    pub fn file(self, name: &str, contents: &[u8]) -> Self {
        self.header(&RawHeader::file(name, contents.len() as u64))
            .data(contents)
    }

    /// GNU long name record carrying `name` verbatim (no trailing NUL).
    pub fn long_name(self, name: &[u8]) -> Self {
        self.header(&RawHeader::long_name(name.len() as u64))
            .data(name)
    }

    pub fn long_link(self, target: &[u8]) -> Self {
        self.header(&RawHeader::long_link(target.len() as u64))
            .data(target)
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Two all-zero terminator blocks.
    pub fn finish(self) -> Vec<u8> {
        self.raw(&[0u8; 2 * BLOCK_SIZE]).bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// One observed backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    File { name: String, data: Vec<u8> },
    Mkdir(String),
    Mknod { name: String, device: u32 },
    Link { name: String, target: String },
    Symlink { name: String, target: String },
}

/// Backend recording every call, optionally failing on the n-th one.
pub struct Recorder<R> {
    source: BlockReader<R>,
    pub calls: Vec<Call>,
    pub entries: Vec<TarEntry>,
    fail_on: Option<usize>,
}

impl Recorder<Cursor<Vec<u8>>> {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl<R: Read> Recorder<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            source: BlockReader::new(reader),
            calls: Vec::new(),
            entries: Vec::new(),
            fail_on: None,
        }
    }

    /// Make the `index`-th (zero based) materialising call fail.
    pub fn failing_on(mut self, index: usize) -> Self {
        self.fail_on = Some(index);
        self
    }

    fn push(&mut self, entry: &TarEntry, call: Call) -> Result<()> {
        let index = self.calls.len();
        self.calls.push(call);
        self.entries.push(entry.clone());
        if self.fail_on == Some(index) {
            return Err(anyhow!("backend refused entry {index}"));
        }
        Ok(())
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl<R: Read> TarOperations for Recorder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.source.fill(buf)
    }

    fn extract_file(&mut self, entry: &TarEntry) -> Result<()> {
        let mut data = Vec::new();
        self.source.copy_data(entry.size, &mut data)?;
        self.push(
            entry,
            Call::File {
                name: text(&entry.name),
                data,
            },
        )
    }

    fn mkdir(&mut self, entry: &TarEntry) -> Result<()> {
        self.push(entry, Call::Mkdir(text(&entry.name)))
    }

    fn mknod(&mut self, entry: &TarEntry) -> Result<()> {
        self.push(
            entry,
            Call::Mknod {
                name: text(&entry.name),
                device: entry.device,
            },
        )
    }

    fn link(&mut self, entry: &TarEntry) -> Result<()> {
        self.push(
            entry,
            Call::Link {
                name: text(&entry.name),
                target: text(&entry.link_name),
            },
        )
    }

    fn symlink(&mut self, entry: &TarEntry) -> Result<()> {
        self.push(
            entry,
            Call::Symlink {
                name: text(&entry.name),
                target: text(&entry.link_name),
            },
        )
    }
}

pub fn file(name: &str, data: &[u8]) -> Call {
    Call::File {
        name: name.into(),
        data: data.to_vec(),
    }
}

pub fn mkdir(name: &str) -> Call {
    Call::Mkdir(name.into())
}

pub fn symlink(name: &str, target: &str) -> Call {
    Call::Symlink {
        name: name.into(),
        target: target.into(),
    }
}

pub fn link(name: &str, target: &str) -> Call {
    Call::Link {
        name: name.into(),
        target: target.into(),
    }
}
