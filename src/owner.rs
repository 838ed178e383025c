//! User and group name resolution for header owner fields.

use std::collections::HashMap;

use bstr::{BStr, BString};

/// Resolves textual owner names to numeric ids.
///
/// Returning `None` keeps the numeric id stored in the header.
pub trait OwnerLookup {
    fn uid_by_name(&mut self, name: &BStr) -> Option<u32>;
    fn gid_by_name(&mut self, name: &BStr) -> Option<u32>;
}

/// Never resolves names, so header ids are used verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericOwners;

impl OwnerLookup for NumericOwners {
    fn uid_by_name(&mut self, _name: &BStr) -> Option<u32> {
        None
    }

    fn gid_by_name(&mut self, _name: &BStr) -> Option<u32> {
        None
    }
}

/// Resolves names through the system user and group databases.
///
/// Results, including misses, are cached for the lifetime of the value.
#[derive(Debug, Default)]
pub struct SystemOwners {
    users: HashMap<BString, Option<u32>>,
    groups: HashMap<BString, Option<u32>>,
}

impl SystemOwners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OwnerLookup for SystemOwners {
    fn uid_by_name(&mut self, name: &BStr) -> Option<u32> {
        *self
            .users
            .entry(name.to_owned())
            .or_insert_with(|| sys::lookup_user(name))
    }

    fn gid_by_name(&mut self, name: &BStr) -> Option<u32> {
        *self
            .groups
            .entry(name.to_owned())
            .or_insert_with(|| sys::lookup_group(name))
    }
}

#[cfg(unix)]
mod sys {
    use bstr::{BStr, ByteSlice};
    use nix::unistd::{Group, User};

    // The system databases are keyed by C strings, so names that are not
    // UTF-8 or that carry a NUL never match.
    fn c_name(name: &BStr) -> Option<&str> {
        name.to_str().ok().filter(|name| !name.contains('\0'))
    }

    pub(super) fn lookup_user(name: &BStr) -> Option<u32> {
        let user = User::from_name(c_name(name)?).ok()??;
        Some(user.uid.as_raw())
    }

    pub(super) fn lookup_group(name: &BStr) -> Option<u32> {
        let group = Group::from_name(c_name(name)?).ok()??;
        Some(group.gid.as_raw())
    }
}

#[cfg(not(unix))]
mod sys {
    use bstr::BStr;

    pub(super) fn lookup_user(_name: &BStr) -> Option<u32> {
        None
    }

    pub(super) fn lookup_group(_name: &BStr) -> Option<u32> {
        None
    }
}
