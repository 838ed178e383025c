//! Decoding of a single 512-byte tar header block.
//!
//! The layout is the conventional ustar/GNU one. Numeric fields are octal
//! ASCII and are decoded leniently: leading spaces are skipped and the scan
//! stops at the first byte that is not an octal digit.

use std::fmt;
use std::ops::Range;

use bstr::{BString, ByteSlice};
use serde::Serialize;

use crate::owner::OwnerLookup;

/// Size of every tar record.
pub const BLOCK_SIZE: usize = 512;

/// Magic and version fields of a POSIX ustar header.
const MAGIC_USTAR: &[u8; 8] = b"ustar\000";
/// Magic and version fields as written by GNU tar.
const MAGIC_GNU: &[u8; 8] = b"ustar  \0";

const NAME: Range<usize> = 0..100;
const MODE: Range<usize> = 100..108;
const UID: Range<usize> = 108..116;
const GID: Range<usize> = 116..124;
const SIZE: Range<usize> = 124..136;
const MTIME: Range<usize> = 136..148;
const CHECKSUM: Range<usize> = 148..156;
const TYPEFLAG: usize = 156;
const LINKNAME: Range<usize> = 157..257;
const MAGIC: Range<usize> = 257..265;
const UNAME: Range<usize> = 265..297;
const GNAME: Range<usize> = 297..329;
const DEVMAJOR: Range<usize> = 329..337;
const DEVMINOR: Range<usize> = 337..345;
const PREFIX: Range<usize> = 345..500;

/// Header dialect, derived from the magic field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TarFormat {
    Old,
    Ustar,
    Gnu,
}

impl fmt::Display for TarFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Old => write!(f, "old"),
            Self::Ustar => write!(f, "ustar"),
            Self::Gnu => write!(f, "gnu"),
        }
    }
}

/// The kind of object a header describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    /// Regular file written by pre-POSIX tars (type flag NUL).
    OldRegular,
    /// Regular file (`'0'`).
    Regular,
    HardLink,
    Symlink,
    CharDevice,
    BlockDevice,
    Directory,
    Fifo,
    Contiguous,
    /// GNU continuation carrying the link name of the next entry (`'K'`).
    GnuLongLink,
    /// GNU continuation carrying the name of the next entry (`'L'`).
    GnuLongName,
    Unrecognized(u8),
}

impl EntryType {
    /// Map a raw type flag byte onto the enumeration.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'\0' => Self::OldRegular,
            b'0' => Self::Regular,
            b'1' => Self::HardLink,
            b'2' => Self::Symlink,
            b'3' => Self::CharDevice,
            b'4' => Self::BlockDevice,
            b'5' => Self::Directory,
            b'6' => Self::Fifo,
            b'7' => Self::Contiguous,
            b'K' => Self::GnuLongLink,
            b'L' => Self::GnuLongName,
            other => Self::Unrecognized(other),
        }
    }

    /// The raw type flag byte.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::OldRegular => b'\0',
            Self::Regular => b'0',
            Self::HardLink => b'1',
            Self::Symlink => b'2',
            Self::CharDevice => b'3',
            Self::BlockDevice => b'4',
            Self::Directory => b'5',
            Self::Fifo => b'6',
            Self::Contiguous => b'7',
            Self::GnuLongLink => b'K',
            Self::GnuLongName => b'L',
            Self::Unrecognized(byte) => byte,
        }
    }
}

/// A fully decoded archive entry.
///
/// `size` is only meaningful for regular files and continuation records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    pub name: BString,
    pub link_name: BString,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub user_name: BString,
    pub group_name: BString,
    pub size: u64,
    pub mtime: u64,
    /// Major number in the high byte, minor number in the low byte.
    pub device: u32,
    pub entry_type: EntryType,
    pub format: TarFormat,
}

impl TarEntry {
    /// Device major number.
    #[must_use]
    pub fn dev_major(&self) -> u32 {
        (self.device >> 8) & 0xff
    }

    /// Device minor number.
    #[must_use]
    pub fn dev_minor(&self) -> u32 {
        self.device & 0xff
    }
}

/// A borrowed raw header block.
#[derive(Clone, Copy)]
pub struct HeaderBlock<'a> {
    block: &'a [u8; BLOCK_SIZE],
}

impl<'a> HeaderBlock<'a> {
    #[must_use]
    pub fn new(block: &'a [u8; BLOCK_SIZE]) -> Self {
        Self { block }
    }

    /// Dialect of this header, from an exact match of the magic field.
    #[must_use]
    pub fn format(&self) -> TarFormat {
        let magic = &self.block[MAGIC];
        if magic == MAGIC_GNU {
            TarFormat::Gnu
        } else if magic == MAGIC_USTAR {
            TarFormat::Ustar
        } else {
            TarFormat::Old
        }
    }

    /// The effective name, joining the ustar prefix when one is present.
    #[must_use]
    pub fn name(&self) -> BString {
        let name = parse_text(&self.block[NAME]);
        let prefix = parse_text(&self.block[PREFIX]);
        if self.format() == TarFormat::Ustar && !prefix.is_empty() {
            let mut joined = prefix;
            joined.push(b'/');
            joined.extend_from_slice(&name);
            joined
        } else {
            name
        }
    }

    /// The checksum value recorded in the header.
    #[must_use]
    pub fn stored_checksum(&self) -> u64 {
        parse_octal(&self.block[CHECKSUM])
    }

    /// Whether the recorded checksum matches the block contents.
    #[must_use]
    pub fn is_checksum_valid(&self) -> bool {
        checksum(self.block) == self.stored_checksum()
    }

    /// Decode every field, resolving owner names through `owners`.
    pub fn decode(&self, owners: &mut dyn OwnerLookup) -> TarEntry {
        let block = self.block;
        let user_name = parse_text(&block[UNAME]);
        let group_name = parse_text(&block[GNAME]);

        let mut uid = parse_octal(&block[UID]) as u32;
        let mut gid = parse_octal(&block[GID]) as u32;
        if !user_name.is_empty() {
            if let Some(resolved) = owners.uid_by_name(user_name.as_bstr()) {
                uid = resolved;
            }
        }
        if !group_name.is_empty() {
            if let Some(resolved) = owners.gid_by_name(group_name.as_bstr()) {
                gid = resolved;
            }
        }

        let major = (parse_octal(&block[DEVMAJOR]) & 0xff) as u32;
        let minor = (parse_octal(&block[DEVMINOR]) & 0xff) as u32;

        TarEntry {
            name: self.name(),
            link_name: parse_text(&block[LINKNAME]),
            mode: parse_octal(&block[MODE]) as u32,
            uid,
            gid,
            user_name,
            group_name,
            size: parse_octal(&block[SIZE]),
            mtime: parse_octal(&block[MTIME]),
            device: (major << 8) | minor,
            entry_type: EntryType::from_byte(block[TYPEFLAG]),
            format: self.format(),
        }
    }
}

impl fmt::Debug for HeaderBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderBlock")
            .field("name", &self.name())
            .field("format", &self.format())
            .field("type", &EntryType::from_byte(self.block[TYPEFLAG]))
            .finish()
    }
}

/// Decode an octal ASCII field.
///
/// Leading spaces are skipped and count against the field width. Digits are
/// accumulated until a non-octal byte or the end of the field; whatever
/// follows is ignored. A field without digits decodes to zero.
#[must_use]
pub fn parse_octal(field: &[u8]) -> u64 {
    let start = field.iter().take_while(|&&b| b == b' ').count();
    field[start..]
        .iter()
        .take_while(|&&b| (b'0'..=b'7').contains(&b))
        .fold(0u64, |acc, &b| (acc << 3) | u64::from(b - b'0'))
}

/// Copy a text field up to its first NUL byte or its full width.
#[must_use]
pub fn parse_text(field: &[u8]) -> BString {
    let len = field.find_byte(0).unwrap_or(field.len());
    BString::from(&field[..len])
}

/// Sum of all header bytes, counting the checksum field as ASCII spaces.
#[must_use]
pub fn checksum(block: &[u8; BLOCK_SIZE]) -> u64 {
    let head: u64 = block[..CHECKSUM.start].iter().map(|&b| u64::from(b)).sum();
    let tail: u64 = block[CHECKSUM.end..].iter().map(|&b| u64::from(b)).sum();
    head + u64::from(b' ') * CHECKSUM.len() as u64 + tail
}
