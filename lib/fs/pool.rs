use rustc_hash::FxHashMap;

use crate::fs::arena::DentryTable;
use crate::fs::{DentryFlags, DentryHandle};
use crate::sync::{RwLock, unpoison};

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<DentryHandle>,
    next: Option<DentryHandle>,
}

/// Intrusive doubly-linked list of dentry handles.
///
/// Links live in a side table keyed by handle, so push, pop and unlink of an arbitrary member are
/// all O(1) and a handle can be a member of at most one list position.
#[derive(Debug, Default)]
pub struct DentryList {
    head: Option<DentryHandle>,
    tail: Option<DentryHandle>,
    links: FxHashMap<DentryHandle, Link>,
}

impl DentryList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `handle` at the head. A handle that is already a member is left where it is.
    pub fn push_front(&mut self, handle: DentryHandle) -> bool {
        if self.links.contains_key(&handle) {
            return false;
        }
        let old_head = self.head;
        self.links.insert(
            handle,
            Link {
                prev: None,
                next: old_head,
            },
        );
        match old_head {
            Some(h) => {
                if let Some(link) = self.links.get_mut(&h) {
                    link.prev = Some(handle);
                }
            }
            None => self.tail = Some(handle),
        }
        self.head = Some(handle);
        true
    }

    /// Detach and return the tail.
    pub fn pop_back(&mut self) -> Option<DentryHandle> {
        let tail = self.tail?;
        self.remove(tail);
        Some(tail)
    }

    /// Unlink `handle` from wherever it sits.
    pub fn remove(&mut self, handle: DentryHandle) -> bool {
        let Some(link) = self.links.remove(&handle) else {
            return false;
        };
        match link.prev {
            Some(p) => {
                if let Some(prev) = self.links.get_mut(&p) {
                    prev.next = link.next;
                }
            }
            None => self.head = link.next,
        }
        match link.next {
            Some(n) => {
                if let Some(next) = self.links.get_mut(&n) {
                    next.prev = link.prev;
                }
            }
            None => self.tail = link.prev,
        }
        true
    }

    /// Whether `handle` is a member.
    #[must_use]
    pub fn contains(&self, handle: DentryHandle) -> bool {
        self.links.contains_key(&handle)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the list has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Members from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = DentryHandle> + '_ {
        std::iter::successors(self.head, |h| self.links.get(h).and_then(|l| l.next))
    }

    /// Unlink every member, head to tail.
    pub fn drain(&mut self) -> Vec<DentryHandle> {
        let out: Vec<_> = self.iter().collect();
        self.head = None;
        self.tail = None;
        self.links.clear();
        out
    }
}

/// The recycle pool of unused file dentries and the registry of active ones.
///
/// Unused dentries leave from the tail and come back at the head, so a released slot is reused
/// only after every older free slot. Each list has its own lock and no code path holds both.
#[derive(Default)]
pub struct SlotPool {
    unused: RwLock<DentryList>,
    active: RwLock<DentryList>,
}

impl SlotPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest free dentry.
    pub fn acquire(&self) -> Option<DentryHandle> {
        unpoison(self.unused.write()).pop_back()
    }

    /// Return a dentry to the pool, clearing its `DIRTY` bit.
    pub fn release(&self, table: &DentryTable, handle: DentryHandle) {
        table.update(handle, |d| d.flags.remove(DentryFlags::DIRTY));
        unpoison(self.unused.write()).push_front(handle);
    }

    /// Record `handle` as visible in the namespace, setting its `DIRTY` bit.
    pub fn activate(&self, table: &DentryTable, handle: DentryHandle) {
        table.update(handle, |d| d.flags.insert(DentryFlags::DIRTY));
        unpoison(self.active.write()).push_front(handle);
    }

    /// Drop `handle` from the active registry.
    pub fn deactivate(&self, handle: DentryHandle) -> bool {
        unpoison(self.active.write()).remove(handle)
    }

    /// Whether `handle` is in the active registry.
    #[must_use]
    pub fn is_active(&self, handle: DentryHandle) -> bool {
        unpoison(self.active.read()).contains(handle)
    }

    /// Dentries waiting in the pool.
    #[must_use]
    pub fn free_slots(&self) -> usize {
        unpoison(self.unused.read()).len()
    }

    /// Dentries in the active registry.
    #[must_use]
    pub fn active_len(&self) -> usize {
        unpoison(self.active.read()).len()
    }

    /// Pool members in reuse order, oldest first.
    #[must_use]
    pub fn unused_in_reuse_order(&self) -> Vec<DentryHandle> {
        let unused = unpoison(self.unused.read());
        let mut out: Vec<_> = unused.iter().collect();
        out.reverse();
        out
    }

    /// Empty both lists, returning `(unused, active)`.
    pub fn drain(&self) -> (Vec<DentryHandle>, Vec<DentryHandle>) {
        let unused = unpoison(self.unused.write()).drain();
        let active = unpoison(self.active.write()).drain();
        (unused, active)
    }
}
