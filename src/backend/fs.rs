//! Backend that materialises entries below a destination directory.

use std::io::{self, Read};

use anyhow::{anyhow, Context, Result};
use bstr::ByteSlice;
use camino::{Utf8Path, Utf8PathBuf};
use filetime::FileTime;
use indicatif::ProgressBar;
use log::{debug, info};

use super::TarOperations;
use crate::archive::header::{EntryType, TarEntry};
use crate::io::BlockReader;
use crate::policy::{LinkType, SecurityPolicy, UsageTracker, ValidatedPath};

/// Metadata restoration switches for [`FsBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsOptions {
    /// Apply the archived permission bits.
    pub preserve_permissions: bool,
    /// Apply the archived modification time to files and directories.
    pub preserve_mtime: bool,
    /// Change ownership to the archived (or name-resolved) uid and gid.
    pub preserve_owner: bool,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            preserve_permissions: true,
            preserve_mtime: true,
            preserve_owner: false,
        }
    }
}

/// Extracts an archive read from `R` into a directory tree.
pub struct FsBackend<R> {
    source: BlockReader<R>,
    root: Utf8PathBuf,
    policy: SecurityPolicy,
    usage: UsageTracker,
    options: FsOptions,
    progress: Option<ProgressBar>,
}

impl<R: Read> FsBackend<R> {
    /// Create a backend writing below `destination`, creating it if needed.
    pub fn new(
        reader: R,
        destination: &Utf8Path,
        policy: SecurityPolicy,
        options: FsOptions,
    ) -> Result<Self> {
        fs_err::create_dir_all(destination.as_std_path())
            .with_context(|| format!("failed to prepare destination {destination}"))?;
        let canonical = fs_err::canonicalize(destination.as_std_path())?;
        let root = Utf8PathBuf::from_path_buf(canonical)
            .map_err(|path| anyhow!("destination not valid UTF-8: {}", path.display()))?;
        let usage = policy.usage();
        Ok(Self {
            source: BlockReader::new(reader),
            root,
            policy,
            usage,
            options,
            progress: None,
        })
    }

    /// Report each materialised entry on `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The canonical extraction root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Entries materialised so far.
    #[must_use]
    pub fn entries_written(&self) -> u64 {
        self.usage.entries()
    }

    /// Bytes of file data written so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.usage.data_bytes()
    }

    /// Stop reporting progress and hand the bar back.
    pub fn take_progress(&mut self) -> Option<ProgressBar> {
        self.progress.take()
    }

    fn admit(&mut self, entry: &TarEntry, size: u64) -> Result<ValidatedPath> {
        let validated = self
            .policy
            .resolve_entry(entry.name.as_bstr(), &self.root)
            .with_context(|| format!("refusing entry {}", entry.name.as_bstr()))?;
        self.usage
            .observe(&validated, size)
            .with_context(|| format!("refusing entry {validated}"))?;
        if let Some(pb) = &self.progress {
            pb.set_message(format!("{:?} {validated}", entry.entry_type));
            pb.inc(1);
        } else {
            info!("extracting {validated} ({:?})", entry.entry_type);
        }
        Ok(validated)
    }

    fn admit_leaf(&mut self, entry: &TarEntry, size: u64) -> Result<ValidatedPath> {
        let validated = self.admit(entry, size)?;
        if validated.is_root() {
            return Err(anyhow!(
                "entry {} resolves to the extraction root",
                entry.name.as_bstr()
            ));
        }
        ensure_parent_exists(&validated)?;
        remove_existing(&validated.abs)?;
        Ok(validated)
    }

    fn apply_metadata(&self, path: &Utf8Path, entry: &TarEntry) -> Result<()> {
        if self.options.preserve_owner {
            set_owner(path, entry)?;
        }
        if self.options.preserve_permissions {
            set_mode(path, entry.mode)?;
        }
        if self.options.preserve_mtime {
            let mtime = FileTime::from_unix_time(entry.mtime as i64, 0);
            filetime::set_file_mtime(path, mtime)
                .with_context(|| format!("failed to set mtime on {path}"))?;
        }
        Ok(())
    }
}

impl<R: Read> TarOperations for FsBackend<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.source.fill(buf)
    }

    fn extract_file(&mut self, entry: &TarEntry) -> Result<()> {
        let validated = self.admit_leaf(entry, entry.size)?;
        debug!(
            "{validated}: {} bytes at offset {}",
            entry.size,
            self.source.position()
        );
        let mut file = fs_err::File::create(validated.abs.as_std_path())?;
        self.source
            .copy_data(entry.size, &mut file)
            .with_context(|| format!("failed to extract {validated}"))?;
        drop(file);
        self.apply_metadata(&validated.abs, entry)
    }

    fn mkdir(&mut self, entry: &TarEntry) -> Result<()> {
        let validated = self.admit(entry, 0)?;
        if !validated.abs.is_dir() {
            remove_existing(&validated.abs)?;
        }
        fs_err::create_dir_all(validated.abs.as_std_path())?;
        if validated.is_root() {
            return Ok(());
        }
        self.apply_metadata(&validated.abs, entry)
    }

    fn mknod(&mut self, entry: &TarEntry) -> Result<()> {
        let validated = self.admit_leaf(entry, 0)?;
        make_node(&validated.abs, entry)?;
        self.apply_metadata(&validated.abs, entry)
    }

    fn link(&mut self, entry: &TarEntry) -> Result<()> {
        let validated = self.admit_leaf(entry, 0)?;
        let target = self
            .policy
            .enforce_link_policy(
                &validated,
                entry.link_name.as_bstr(),
                &self.root,
                LinkType::Hardlink,
            )
            .with_context(|| format!("refusing hard link {validated}"))?;
        debug!("hard link {validated} => {target}");
        fs_err::hard_link(target.as_std_path(), validated.abs.as_std_path())?;
        Ok(())
    }

    fn symlink(&mut self, entry: &TarEntry) -> Result<()> {
        let validated = self.admit_leaf(entry, 0)?;
        self.policy
            .enforce_link_policy(
                &validated,
                entry.link_name.as_bstr(),
                &self.root,
                LinkType::Symlink,
            )
            .with_context(|| format!("refusing symlink {validated}"))?;
        let target = entry
            .link_name
            .to_str()
            .map_err(|_| anyhow!("symlink target not UTF-8: {validated}"))?;
        debug!("symlink {validated} -> {target}");
        make_symlink(target, &validated.abs)
            .with_context(|| format!("failed to create symlink {validated}"))?;
        if self.options.preserve_owner {
            set_owner(&validated.abs, entry)?;
        }
        Ok(())
    }
}

fn ensure_parent_exists(validated: &ValidatedPath) -> Result<()> {
    if let Some(parent) = validated.abs.parent() {
        fs_err::create_dir_all(parent.as_std_path())
            .with_context(|| format!("failed to create parent {parent}"))?;
    }
    Ok(())
}

/// Remove a non-directory left at `path` so it can be replaced.
fn remove_existing(path: &Utf8Path) -> Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if meta.is_dir() => Err(anyhow!("refusing to replace directory {path}")),
        Ok(_) => {
            fs_err::remove_file(path.as_std_path())?;
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(anyhow!(err).context(format!("failed to inspect {path}"))),
    }
}

#[cfg(unix)]
fn make_symlink(target: &str, link: &Utf8Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn make_symlink(_target: &str, link: &Utf8Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("symbolic links are not supported here: {link}"),
    ))
}

#[cfg(unix)]
fn set_mode(path: &Utf8Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs_err::set_permissions(
        path.as_std_path(),
        std::fs::Permissions::from_mode(mode & 0o7777),
    )?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(path: &Utf8Path, mode: u32) -> Result<()> {
    let mut perms = fs_err::metadata(path.as_std_path())?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    fs_err::set_permissions(path.as_std_path(), perms)?;
    Ok(())
}

#[cfg(unix)]
fn set_owner(path: &Utf8Path, entry: &TarEntry) -> Result<()> {
    std::os::unix::fs::lchown(path, Some(entry.uid), Some(entry.gid))
        .with_context(|| format!("failed to change owner of {path}"))
}

#[cfg(not(unix))]
fn set_owner(_path: &Utf8Path, _entry: &TarEntry) -> Result<()> {
    Ok(())
}

#[cfg(all(unix, not(target_vendor = "apple")))]
fn make_node(path: &Utf8Path, entry: &TarEntry) -> Result<()> {
    use rustix::fs::{makedev, mknodat, FileType, Mode, CWD};

    let (kind, dev) = match entry.entry_type {
        EntryType::CharDevice => (
            FileType::CharacterDevice,
            makedev(entry.dev_major(), entry.dev_minor()),
        ),
        EntryType::BlockDevice => (
            FileType::BlockDevice,
            makedev(entry.dev_major(), entry.dev_minor()),
        ),
        EntryType::Fifo => (FileType::Fifo, 0),
        other => return Err(anyhow!("{other:?} is not a device node: {path}")),
    };
    let mode = Mode::from_raw_mode((entry.mode & 0o7777) as _);
    mknodat(CWD, path.as_std_path(), kind, mode, dev)
        .with_context(|| format!("failed to mknod {path}"))
}

#[cfg(any(not(unix), target_vendor = "apple"))]
fn make_node(path: &Utf8Path, _entry: &TarEntry) -> Result<()> {
    Err(anyhow!("device nodes are not supported here: {path}"))
}
