use std::ffi::OsStr;
use std::path::{Component, Path};

use crate::fs::arena::DentryTable;
use crate::fs::index::NamespaceIndex;
use crate::fs::key::NamespaceKey;
use crate::fs::{Dentry, DentryHandle, NamespaceId, ROOT_PARENT_ID};

/// A successfully resolved path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// Handle of the final component.
    pub handle: DentryHandle,
    /// Snapshot of the final component's dentry.
    pub dentry: Dentry,
    /// Namespace id of the directory holding the final component.
    pub parent_id: NamespaceId,
    /// Handle of the directory holding the final component. The root is its own parent.
    pub parent: DentryHandle,
}

/// A path that did not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// Some ancestor of the final component is missing.
    MissDirectory,
    /// Some ancestor of the final component is a file or symlink.
    NotADirectory,
    /// Every ancestor resolved; only the final component is missing.
    MissFile {
        /// Handle of the directory that would hold the final component.
        parent: DentryHandle,
        /// Snapshot of that directory.
        parent_dentry: Dentry,
    },
}

/// The names a path walks through, in order.
///
/// `.` components are skipped and `..` is kept as an ordinary name.
pub fn components(path: &Path) -> impl Iterator<Item = &OsStr> {
    path.components().filter_map(|c| match c {
        Component::Normal(name) => Some(name),
        Component::ParentDir => Some(OsStr::new("..")),
        Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
    })
}

/// The final name of `path`, or `None` for the root.
#[must_use]
pub fn leaf_name(path: &Path) -> Option<&OsStr> {
    components(path).last()
}

/// Walk `path` through the index, one component at a time.
///
/// The whole walk holds one shared snapshot of the index. `.` components are skipped and `..` is
/// treated as an ordinary name, so `/a/../b` only resolves if a directory literally named `..`
/// exists. An empty or root-only path resolves to the root.
pub fn resolve(
    index: &NamespaceIndex,
    table: &DentryTable,
    path: &Path,
) -> Result<Resolved, ResolveError> {
    let view = index.read();
    let root_handle = view
        .get(&NamespaceKey::root())
        .ok_or(ResolveError::MissDirectory)?;
    let root = table.get(root_handle).ok_or(ResolveError::MissDirectory)?;

    let names: Vec<_> = components(path).collect();

    let mut current = Resolved {
        handle: root_handle,
        dentry: root,
        parent_id: ROOT_PARENT_ID,
        parent: root_handle,
    };
    let last = names.len().saturating_sub(1);
    for (i, name) in names.into_iter().enumerate() {
        if !current.dentry.is_dir() {
            return Err(ResolveError::NotADirectory);
        }
        let parent_id = current.dentry.namespace_id;
        let found = view
            .lookup(parent_id, name)
            .and_then(|handle| table.get(handle).map(|dentry| (handle, dentry)));
        match found {
            Some((handle, dentry)) => {
                current = Resolved {
                    handle,
                    dentry,
                    parent_id,
                    parent: current.handle,
                };
            }
            None if i == last => {
                return Err(ResolveError::MissFile {
                    parent: current.handle,
                    parent_dentry: current.dentry,
                });
            }
            None => return Err(ResolveError::MissDirectory),
        }
    }
    Ok(current)
}
