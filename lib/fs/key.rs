use std::ffi::{OsStr, OsString};
use std::fmt;

use crate::fs::{NamespaceId, ROOT_NAME, ROOT_PARENT_ID};

/// Address of one entry in the [`NamespaceIndex`](super::index::NamespaceIndex).
///
/// Ordered by parent id first and name bytes second, so every child of a directory sits in one
/// contiguous run of the index starting at [`NamespaceKey::first_child_of`]. The name is kept as
/// a separate field, which means a `#` (or any other byte) inside a name can never make two keys
/// collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceKey {
    parent: NamespaceId,
    name: OsString,
}

impl NamespaceKey {
    /// Key of `name` inside the directory whose namespace id is `parent`.
    pub fn new(parent: NamespaceId, name: impl Into<OsString>) -> Self {
        Self {
            parent,
            name: name.into(),
        }
    }

    /// The key of the root directory.
    #[must_use]
    pub fn root() -> Self {
        Self::new(ROOT_PARENT_ID, ROOT_NAME)
    }

    /// The smallest possible key among the children of `parent`.
    #[must_use]
    pub fn first_child_of(parent: NamespaceId) -> Self {
        Self {
            parent,
            name: OsString::new(),
        }
    }

    /// Namespace id of the directory holding this entry.
    #[must_use]
    pub fn parent(&self) -> NamespaceId {
        self.parent
    }

    /// The entry's name component.
    #[must_use]
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    /// Consume the key, keeping the name.
    #[must_use]
    pub fn into_name(self) -> OsString {
        self.name
    }
}

impl fmt::Display for NamespaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.parent, self.name.to_string_lossy())
    }
}
