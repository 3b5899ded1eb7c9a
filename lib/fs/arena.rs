use crate::fs::{Dentry, DentryHandle};
use crate::sync::atomic::{AtomicU32, Ordering};

/// Arena owning every dentry of a mount.
///
/// The namespace index, the pool and the active registry only ever hold [`DentryHandle`]s into
/// this table, so a dentry can move between them without any of them owning it.
pub struct DentryTable {
    entries: scc::HashMap<DentryHandle, Dentry>,
    next: AtomicU32,
}

impl Default for DentryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DentryTable {
    /// Creates an empty table. The first inserted dentry receives [`DentryHandle::ROOT`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: scc::HashMap::new(),
            next: AtomicU32::new(DentryHandle::ROOT.0),
        }
    }

    /// Store `dentry` under a fresh handle.
    ///
    /// Returns `None` once the handle space is exhausted. Handles are never reissued.
    pub fn insert(&self, dentry: Dentry) -> Option<DentryHandle> {
        let raw = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .ok()?;
        let handle = DentryHandle(raw);
        self.entries.insert_sync(handle, dentry).ok()?;
        Some(handle)
    }

    /// Copy out the dentry behind `handle`.
    #[must_use]
    pub fn get(&self, handle: DentryHandle) -> Option<Dentry> {
        self.entries.read_sync(&handle, |_, dentry| *dentry)
    }

    /// Whether `handle` is live.
    #[must_use]
    pub fn contains(&self, handle: DentryHandle) -> bool {
        self.entries.contains_sync(&handle)
    }

    /// Mutate the dentry behind `handle` in place.
    pub fn update<R>(&self, handle: DentryHandle, f: impl FnOnce(&mut Dentry) -> R) -> Option<R> {
        self.entries.update_sync(&handle, |_, dentry| f(dentry))
    }

    /// Drop the dentry behind `handle`, returning it.
    pub fn remove(&self, handle: DentryHandle) -> Option<Dentry> {
        self.entries.remove_sync(&handle).map(|(_, dentry)| dentry)
    }

    /// Number of live dentries, pooled ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no dentry at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every dentry.
    pub fn clear(&self) {
        self.entries.retain_sync(|_, _| false);
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    fn dir() -> Dentry {
        Dentry::directory(7, 0o755, 0, 0)
    }

    #[test]
    fn handles_start_at_root_and_count_up() {
        let table = DentryTable::new();
        assert_eq!(table.insert(dir()), Some(DentryHandle::ROOT));
        assert_eq!(table.insert(dir()), Some(DentryHandle(1)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn exhausted_handle_space_never_wraps() {
        let table = DentryTable {
            entries: scc::HashMap::new(),
            next: AtomicU32::new(u32::MAX - 1),
        };
        assert_eq!(table.insert(dir()), Some(DentryHandle(u32::MAX - 1)));
        assert_eq!(table.insert(dir()), None);
        assert_eq!(table.insert(dir()), None);
        assert_eq!(table.len(), 1);
        assert!(!table.contains(DentryHandle::ROOT));
    }
}
