//! Dry-run backend that reports entries instead of materialising them.

use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use bstr::ByteSlice;
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::TarOperations;
use crate::archive::header::{EntryType, TarEntry, TarFormat};
use crate::io::BlockReader;

/// Output style of [`ListBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    /// One name per line.
    Names,
    /// `tar tv`-like lines with mode, owner, size and mtime.
    Verbose,
    /// Nothing per entry; the caller renders [`ListBackend::entries`].
    Json,
    /// Nothing at all.
    Silent,
}

impl ListFormat {
    /// Whether file data is hashed rather than skipped.
    fn wants_digest(self) -> bool {
        matches!(self, Self::Verbose | Self::Json)
    }
}

/// Record of one backend call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListedEntry {
    pub path: String,
    pub kind: EntryType,
    pub format: TarFormat,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub size: u64,
    pub mtime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ListedEntry {
    fn from_entry(entry: &TarEntry) -> Self {
        let target = matches!(entry.entry_type, EntryType::HardLink | EntryType::Symlink)
            .then(|| entry.link_name.to_str_lossy().into_owned());
        let device = matches!(
            entry.entry_type,
            EntryType::CharDevice | EntryType::BlockDevice
        )
        .then(|| (entry.dev_major(), entry.dev_minor()));
        Self {
            path: entry.name.to_str_lossy().into_owned(),
            kind: entry.entry_type,
            format: entry.format,
            mode: entry.mode,
            uid: entry.uid,
            gid: entry.gid,
            user: non_empty(&entry.user_name),
            group: non_empty(&entry.group_name),
            size: if is_file(entry.entry_type) { entry.size } else { 0 },
            mtime: entry.mtime,
            target,
            device,
            sha256: None,
        }
    }

    /// A `tar tv`-like line.
    #[must_use]
    pub fn verbose_line(&self) -> String {
        let owner = match (&self.user, &self.group) {
            (Some(user), Some(group)) => format!("{user}/{group}"),
            _ => format!("{}/{}", self.uid, self.gid),
        };
        let size = match self.device {
            Some((major, minor)) => format!("{major},{minor}"),
            None => self.size.to_string(),
        };
        let mut line = format!(
            "{} {owner:<16} {size:>10} {} {}",
            mode_string(self.kind, self.mode),
            format_mtime(self.mtime),
            self.path
        );
        match (self.kind, &self.target) {
            (EntryType::Symlink, Some(target)) => line.push_str(&format!(" -> {target}")),
            (EntryType::HardLink, Some(target)) => line.push_str(&format!(" link to {target}")),
            _ => {}
        }
        line
    }
}

/// Lists an archive read from `R`, writing progress lines to `W`.
pub struct ListBackend<R, W> {
    source: BlockReader<R>,
    out: W,
    format: ListFormat,
    entries: Vec<ListedEntry>,
}

impl<R: Read, W: Write> ListBackend<R, W> {
    #[must_use]
    pub fn new(reader: R, out: W, format: ListFormat) -> Self {
        Self {
            source: BlockReader::new(reader),
            out,
            format,
            entries: Vec::new(),
        }
    }

    /// Entries reported so far, in call order.
    #[must_use]
    pub fn entries(&self) -> &[ListedEntry] {
        &self.entries
    }

    /// Consume the backend, returning the recorded entries.
    pub fn into_entries(self) -> Vec<ListedEntry> {
        self.entries
    }

    fn record(&mut self, listed: ListedEntry) -> Result<()> {
        match self.format {
            ListFormat::Names => writeln!(self.out, "{}", listed.path),
            ListFormat::Verbose => writeln!(self.out, "{}", listed.verbose_line()),
            ListFormat::Json | ListFormat::Silent => Ok(()),
        }
        .context("failed to write listing")?;
        self.entries.push(listed);
        Ok(())
    }
}

impl<R: Read, W: Write> TarOperations for ListBackend<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.source.fill(buf)
    }

    fn extract_file(&mut self, entry: &TarEntry) -> Result<()> {
        let mut listed = ListedEntry::from_entry(entry);
        if self.format.wants_digest() {
            let mut hasher = Sha256::new();
            self.source
                .copy_data(entry.size, &mut hasher)
                .with_context(|| format!("failed to read data of {}", entry.name.as_bstr()))?;
            listed.sha256 = Some(hex::encode(hasher.finalize()));
        } else {
            self.source
                .skip_data(entry.size)
                .with_context(|| format!("failed to skip data of {}", entry.name.as_bstr()))?;
        }
        self.record(listed)
    }

    fn mkdir(&mut self, entry: &TarEntry) -> Result<()> {
        self.record(ListedEntry::from_entry(entry))
    }

    fn mknod(&mut self, entry: &TarEntry) -> Result<()> {
        self.record(ListedEntry::from_entry(entry))
    }

    fn link(&mut self, entry: &TarEntry) -> Result<()> {
        self.record(ListedEntry::from_entry(entry))
    }

    fn symlink(&mut self, entry: &TarEntry) -> Result<()> {
        self.record(ListedEntry::from_entry(entry))
    }
}

fn is_file(entry_type: EntryType) -> bool {
    matches!(entry_type, EntryType::OldRegular | EntryType::Regular)
}

fn non_empty(text: &[u8]) -> Option<String> {
    (!text.is_empty()).then(|| text.to_str_lossy().into_owned())
}

fn mode_string(kind: EntryType, mode: u32) -> String {
    let kind = match kind {
        EntryType::Directory => 'd',
        EntryType::Symlink => 'l',
        EntryType::HardLink => 'h',
        EntryType::CharDevice => 'c',
        EntryType::BlockDevice => 'b',
        EntryType::Fifo => 'p',
        _ => '-',
    };
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

fn format_mtime(mtime: u64) -> String {
    i64::try_from(mtime)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .and_then(|time| time.format(&Rfc3339).ok())
        .unwrap_or_else(|| mtime.to_string())
}
