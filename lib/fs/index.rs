use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::ops::Bound;

use crate::fs::DentryHandle;
use crate::fs::NamespaceId;
use crate::fs::key::NamespaceKey;
use crate::sync::{RwLock, RwLockReadGuard, unpoison};

/// Result of [`NamespaceIndex::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was vacant and now maps to the new handle.
    Inserted,
    /// The key was already taken; the index was left untouched.
    AlreadyPresent(DentryHandle),
}

/// Why [`NamespaceIndex::remove_empty_dir`] refused to remove a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveDirError {
    /// The key no longer maps to the expected handle.
    Changed,
    /// The directory still has children.
    NotEmpty,
}

/// Why [`NamespaceIndex::rekey`] refused to move an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RekeyError {
    /// The source key no longer maps to the expected handle.
    SourceChanged,
    /// The destination key is taken.
    TargetExists(DentryHandle),
}

/// Ordered map from [`NamespaceKey`] to dentry handle.
///
/// Keys of one directory are contiguous, so listing a directory is a single range scan. Readers
/// share the lock; every mutation is exclusive and atomic with respect to readers.
#[derive(Default)]
pub struct NamespaceIndex {
    tree: RwLock<BTreeMap<NamespaceKey, DentryHandle>>,
}

/// A consistent read-only snapshot of the index, held for the duration of a multi-step walk.
pub struct IndexView<'a> {
    tree: RwLockReadGuard<'a, BTreeMap<NamespaceKey, DentryHandle>>,
}

impl IndexView<'_> {
    /// Look up `name` under `parent`.
    #[must_use]
    pub fn lookup(&self, parent: NamespaceId, name: &OsStr) -> Option<DentryHandle> {
        self.tree.get(&NamespaceKey::new(parent, name)).copied()
    }

    /// Look up an exact key.
    #[must_use]
    pub fn get(&self, key: &NamespaceKey) -> Option<DentryHandle> {
        self.tree.get(key).copied()
    }

    /// Every entry, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&NamespaceKey, DentryHandle)> {
        self.tree.iter().map(|(k, h)| (k, *h))
    }
}

impl NamespaceIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a shared snapshot.
    pub fn read(&self) -> IndexView<'_> {
        IndexView {
            tree: unpoison(self.tree.read()),
        }
    }

    /// Look up a single key.
    #[must_use]
    pub fn lookup(&self, key: &NamespaceKey) -> Option<DentryHandle> {
        unpoison(self.tree.read()).get(key).copied()
    }

    /// Insert `key → handle` unless the key is already taken. Never overwrites.
    pub fn insert(&self, key: NamespaceKey, handle: DentryHandle) -> InsertOutcome {
        let mut tree = unpoison(self.tree.write());
        if let Some(existing) = tree.get(&key) {
            return InsertOutcome::AlreadyPresent(*existing);
        }
        tree.insert(key, handle);
        InsertOutcome::Inserted
    }

    /// Remove `key` unconditionally.
    pub fn remove(&self, key: &NamespaceKey) -> Option<DentryHandle> {
        unpoison(self.tree.write()).remove(key)
    }

    /// Remove `key` only if it still maps to `expected`.
    pub fn remove_entry(&self, key: &NamespaceKey, expected: DentryHandle) -> bool {
        let mut tree = unpoison(self.tree.write());
        if tree.get(key) != Some(&expected) {
            return false;
        }
        tree.remove(key);
        true
    }

    /// Remove the directory at `key` if it still maps to `expected` and has no children.
    ///
    /// The emptiness check and the removal happen under the same exclusive lock, so a concurrent
    /// create inside the directory either lands before the check (and the removal fails) or after
    /// the removal (and the create fails to resolve its parent).
    pub fn remove_empty_dir(
        &self,
        key: &NamespaceKey,
        expected: DentryHandle,
        dir_ns: NamespaceId,
    ) -> Result<(), RemoveDirError> {
        let mut tree = unpoison(self.tree.write());
        if tree.get(key) != Some(&expected) {
            return Err(RemoveDirError::Changed);
        }
        if has_children(&tree, dir_ns) {
            return Err(RemoveDirError::NotEmpty);
        }
        tree.remove(key);
        Ok(())
    }

    /// Move the entry at `from` to `to` as one atomic step.
    pub fn rekey(
        &self,
        from: &NamespaceKey,
        to: NamespaceKey,
        expected: DentryHandle,
    ) -> Result<(), RekeyError> {
        let mut tree = unpoison(self.tree.write());
        if tree.get(from) != Some(&expected) {
            return Err(RekeyError::SourceChanged);
        }
        if let Some(existing) = tree.get(&to) {
            return Err(RekeyError::TargetExists(*existing));
        }
        tree.remove(from);
        tree.insert(to, expected);
        Ok(())
    }

    /// Visit the children of `parent` in name order.
    ///
    /// When `resume_after` is given the scan starts strictly after that name. The visitor returns
    /// `true` to stop early.
    pub fn scan_prefix(
        &self,
        parent: NamespaceId,
        resume_after: Option<&OsStr>,
        mut f: impl FnMut(&OsStr, DentryHandle) -> bool,
    ) {
        let tree = unpoison(self.tree.read());
        let start = match resume_after {
            Some(name) => Bound::Excluded(NamespaceKey::new(parent, name)),
            None => Bound::Included(NamespaceKey::first_child_of(parent)),
        };
        for (key, handle) in tree
            .range((start, Bound::Unbounded))
            .take_while(|(key, _)| key.parent() == parent)
        {
            if f(key.name(), *handle) {
                break;
            }
        }
    }

    /// Whether any key has `parent` as its parent component.
    #[must_use]
    pub fn has_children(&self, parent: NamespaceId) -> bool {
        let tree = unpoison(self.tree.read());
        has_children(&tree, parent)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        unpoison(self.tree.read()).len()
    }

    /// Whether the index holds no key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        unpoison(self.tree.read()).is_empty()
    }

    /// Drop every key.
    pub fn clear(&self) {
        unpoison(self.tree.write()).clear();
    }
}

fn has_children(tree: &BTreeMap<NamespaceKey, DentryHandle>, parent: NamespaceId) -> bool {
    tree.range(NamespaceKey::first_child_of(parent)..)
        .next()
        .is_some_and(|(key, _)| key.parent() == parent)
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    fn h(n: u32) -> DentryHandle {
        DentryHandle(n)
    }

    fn names(index: &NamespaceIndex, parent: NamespaceId) -> Vec<String> {
        let mut out = Vec::new();
        index.scan_prefix(parent, None, |name, _| {
            out.push(name.to_string_lossy().into_owned());
            false
        });
        out
    }

    #[test]
    fn insert_never_overwrites() {
        let index = NamespaceIndex::new();
        let key = NamespaceKey::new(1, "a");
        assert_eq!(index.insert(key.clone(), h(1)), InsertOutcome::Inserted);
        assert_eq!(
            index.insert(key.clone(), h(2)),
            InsertOutcome::AlreadyPresent(h(1))
        );
        assert_eq!(index.lookup(&key), Some(h(1)));
    }

    #[test]
    fn scan_lists_only_direct_children_in_order() {
        let index = NamespaceIndex::new();
        index.insert(NamespaceKey::new(1, "b"), h(1));
        index.insert(NamespaceKey::new(1, "a"), h(2));
        index.insert(NamespaceKey::new(2, "c"), h(3));
        index.insert(NamespaceKey::new(10, "d"), h(4));
        assert_eq!(names(&index, 1), vec!["a", "b"]);
        assert_eq!(names(&index, 2), vec!["c"]);
        assert!(names(&index, 3).is_empty());
    }

    #[test]
    fn scan_resumes_after_name_and_stops_early() {
        let index = NamespaceIndex::new();
        for (i, name) in (0..).zip(["a", "b", "c", "d"]) {
            index.insert(NamespaceKey::new(5, name), h(i));
        }
        let mut seen = Vec::new();
        index.scan_prefix(5, Some(OsStr::new("a")), |name, _| {
            seen.push(name.to_owned());
            seen.len() == 2
        });
        assert_eq!(seen, vec!["b", "c"]);
    }

    #[test]
    fn remove_empty_dir_checks_children_and_identity() {
        let index = NamespaceIndex::new();
        let dir = NamespaceKey::new(1, "d");
        index.insert(dir.clone(), h(7));
        index.insert(NamespaceKey::new(9, "child"), h(8));

        assert_eq!(
            index.remove_empty_dir(&dir, h(6), 9),
            Err(RemoveDirError::Changed)
        );
        assert_eq!(
            index.remove_empty_dir(&dir, h(7), 9),
            Err(RemoveDirError::NotEmpty)
        );
        assert_eq!(index.len(), 2);

        index.remove(&NamespaceKey::new(9, "child"));
        assert_eq!(index.remove_empty_dir(&dir, h(7), 9), Ok(()));
        assert!(index.is_empty());
    }

    #[test]
    fn rekey_moves_atomically() {
        let index = NamespaceIndex::new();
        let from = NamespaceKey::new(1, "x");
        let to = NamespaceKey::new(2, "x");
        index.insert(from.clone(), h(3));
        index.insert(NamespaceKey::new(2, "y"), h(4));

        assert_eq!(
            index.rekey(&from, NamespaceKey::new(2, "y"), h(3)),
            Err(RekeyError::TargetExists(h(4)))
        );
        assert_eq!(
            index.rekey(&from, to.clone(), h(9)),
            Err(RekeyError::SourceChanged)
        );
        assert_eq!(index.rekey(&from, to.clone(), h(3)), Ok(()));
        assert_eq!(index.lookup(&from), None);
        assert_eq!(index.lookup(&to), Some(h(3)));
    }

    #[test]
    fn remove_entry_requires_matching_handle() {
        let index = NamespaceIndex::new();
        let key = NamespaceKey::new(1, "f");
        index.insert(key.clone(), h(1));
        assert!(!index.remove_entry(&key, h(2)));
        assert!(index.remove_entry(&key, h(1)));
        assert!(!index.has_children(1));
    }
}
