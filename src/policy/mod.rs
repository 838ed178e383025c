//! Path confinement and resource limits applied while materialising entries.
//!
//! Archive names are untrusted. Before a backend touches the filesystem the
//! name is decoded, cleaned and checked to stay below the extraction root,
//! and the running totals are checked against [`PolicyLimits`].
use bstr::BStr;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use path_clean::PathClean;
use std::fmt;
use thiserror::Error;

/// Quotas enforced by [`SecurityPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyLimits {
    pub max_files: u64,
    pub max_total_bytes: u64,
    pub max_single_file: u64,
    pub max_depth: u32,
}

impl Default for PolicyLimits {
    fn default() -> Self {
        Self {
            max_files: 200_000,
            max_total_bytes: 8u64 << 30,
            max_single_file: 2u64 << 30,
            max_depth: 64,
        }
    }
}

/// Kind of link whose target is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Symlink,
    Hardlink,
}

/// Confinement rules and quotas applied before an entry touches the disk.
#[derive(Debug, Clone, Default)]
pub struct SecurityPolicy {
    limits: PolicyLimits,
    allow_symlink_outside_root: bool,
}

impl SecurityPolicy {
    /// Default limits, links confined to the root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every limit at once.
    #[must_use]
    pub fn with_limits(mut self, limits: PolicyLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Override the entry count limit.
    #[must_use]
    pub fn with_max_files(mut self, value: Option<u64>) -> Self {
        if let Some(value) = value {
            self.limits.max_files = value;
        }
        self
    }

    /// Override the total data limit.
    #[must_use]
    pub fn with_max_total_bytes(mut self, value: Option<u64>) -> Self {
        if let Some(value) = value {
            self.limits.max_total_bytes = value;
        }
        self
    }

    /// Override the per-file size limit.
    #[must_use]
    pub fn with_max_single_file(mut self, value: Option<u64>) -> Self {
        if let Some(value) = value {
            self.limits.max_single_file = value;
        }
        self
    }

    /// Override the nesting limit.
    #[must_use]
    pub fn with_max_depth(mut self, value: Option<u32>) -> Self {
        if let Some(value) = value {
            self.limits.max_depth = value;
        }
        self
    }

    /// Permit symlink targets that resolve outside the extraction root.
    #[must_use]
    pub fn with_symlinks_outside_root(mut self, allow: bool) -> Self {
        self.allow_symlink_outside_root = allow;
        self
    }

    /// Map an archive entry name onto a path below `root`.
    ///
    /// Absolute names and `..` components are rejected rather than
    /// rewritten. `.` and `./` map onto `root` itself.
    pub fn resolve_entry(
        &self,
        name: &BStr,
        root: &Utf8Path,
    ) -> Result<ValidatedPath, PolicyError> {
        let name =
            std::str::from_utf8(name).map_err(|_| PolicyError::InvalidUtf8(name.to_string()))?;
        if name.is_empty() {
            return Err(PolicyError::EmptyPath);
        }
        let path = Utf8Path::new(name);
        if path.is_absolute() {
            return Err(PolicyError::AbsolutePath(path.to_owned()));
        }
        if path
            .components()
            .any(|component| matches!(component, Utf8Component::ParentDir))
        {
            return Err(PolicyError::ParentTraversal(path.to_owned()));
        }
        let abs = clean_utf8(&root.join(path), path)?;
        if !abs.starts_with(root) {
            return Err(PolicyError::RootEscape(abs));
        }
        let rel = abs
            .strip_prefix(root)
            .map(Utf8Path::to_owned)
            .unwrap_or_default();
        Ok(ValidatedPath { rel, abs })
    }

    /// Check that a link created at `link` pointing at `target` stays within
    /// `root`, returning the resolved target.
    ///
    /// Symlink targets are relative to the directory holding the link; hard
    /// link targets are archive names, relative to `root`.
    pub fn enforce_link_policy(
        &self,
        link: &ValidatedPath,
        target: &BStr,
        root: &Utf8Path,
        kind: LinkType,
    ) -> Result<Utf8PathBuf, PolicyError> {
        let target = std::str::from_utf8(target)
            .map_err(|_| PolicyError::InvalidUtf8(target.to_string()))?;
        let target = Utf8Path::new(target);
        let base = match kind {
            LinkType::Symlink => link.abs.parent().unwrap_or(root),
            LinkType::Hardlink => root,
        };
        let joined = if target.is_absolute() {
            target.to_owned()
        } else {
            base.join(target)
        };
        let resolved = clean_utf8(&joined, target)?;

        let allow_outside = kind == LinkType::Symlink && self.allow_symlink_outside_root;
        if allow_outside || resolved.starts_with(root) {
            Ok(resolved)
        } else {
            Err(PolicyError::LinkOutsideRoot(target.to_owned()))
        }
    }

    /// Fresh counters for one extraction.
    #[must_use]
    pub fn usage(&self) -> UsageTracker {
        UsageTracker {
            limits: self.limits,
            entries: 0,
            data_bytes: 0,
        }
    }
}

fn clean_utf8(joined: &Utf8Path, original: &Utf8Path) -> Result<Utf8PathBuf, PolicyError> {
    let cleaned = joined.as_std_path().to_path_buf().clean();
    Utf8PathBuf::from_path_buf(cleaned).map_err(|_| PolicyError::InvalidUtf8(original.to_string()))
}

/// An entry name mapped below the extraction root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath {
    pub rel: Utf8PathBuf,
    pub abs: Utf8PathBuf,
}

impl ValidatedPath {
    /// Whether the path is the extraction root itself.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.rel.as_str().is_empty()
    }
}

impl fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.rel)
        }
    }
}

/// Running totals for one extraction.
#[derive(Debug, Clone)]
pub struct UsageTracker {
    limits: PolicyLimits,
    entries: u64,
    data_bytes: u64,
}

impl UsageTracker {
    /// Account for one materialised entry carrying `size` data bytes.
    pub fn observe(&mut self, validated: &ValidatedPath, size: u64) -> Result<(), PolicyError> {
        let limits = self.limits;
        let depth = validated.rel.components().count() as u32;

        if size > limits.max_single_file {
            return Err(PolicyError::SingleFileTooLarge {
                path: validated.rel.clone(),
                actual: size,
                limit: limits.max_single_file,
            });
        }

        if depth > limits.max_depth {
            return Err(PolicyError::DepthExceeded {
                path: validated.rel.clone(),
                actual: depth,
                limit: limits.max_depth,
            });
        }

        self.entries = self.entries.saturating_add(1);
        if self.entries > limits.max_files {
            return Err(PolicyError::FileCountExceeded {
                limit: limits.max_files,
                actual: self.entries,
            });
        }

        self.data_bytes = self.data_bytes.saturating_add(size);
        if self.data_bytes > limits.max_total_bytes {
            return Err(PolicyError::TotalBytesExceeded {
                limit: limits.max_total_bytes,
                actual: self.data_bytes,
            });
        }

        Ok(())
    }

    /// Entries accounted so far.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// File data bytes accounted so far.
    #[must_use]
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("entry name is empty")]
    EmptyPath,
    #[error("absolute entry name: {0}")]
    AbsolutePath(Utf8PathBuf),
    #[error("entry resolves outside the destination: {0}")]
    RootEscape(Utf8PathBuf),
    #[error("entry name contains `..`: {0}")]
    ParentTraversal(Utf8PathBuf),
    #[error("path is not valid UTF-8: {0}")]
    InvalidUtf8(String),
    #[error("link target leaves the destination: {0}")]
    LinkOutsideRoot(Utf8PathBuf),
    #[error("too many entries: {actual} > {limit}")]
    FileCountExceeded { limit: u64, actual: u64 },
    #[error("archive data too large: {actual} > {limit} bytes")]
    TotalBytesExceeded { limit: u64, actual: u64 },
    #[error("{path} is {actual} bytes, over the {limit} byte limit")]
    SingleFileTooLarge {
        path: Utf8PathBuf,
        actual: u64,
        limit: u64,
    },
    #[error("{path} is nested {actual} levels deep, over the limit of {limit}")]
    DepthExceeded {
        path: Utf8PathBuf,
        actual: u32,
        limit: u32,
    },
}
