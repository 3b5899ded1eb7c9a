//! Reference-counted keys with context-aware cleanup.
//!
//! [`DropWard`] counts live references per key and runs a cleanup hook once a key's count reaches
//! zero. The hook is selected by a zero-sized tag type implementing [`StatelessDrop`], so the ward
//! stores nothing per key beyond the count and hands the hook a shared context instead.
//!
//! The FUSE adapter keeps an inode-to-path mapping alive for exactly as long as the kernel holds
//! lookups on that inode: every entry reply is an `inc`, every `forget` a `dec_count`, and the
//! path is dropped when the count reaches zero.
//!
//! # Example
//!
//! ```
//! use slotfs::drop_ward::{DropWard, StatelessDrop};
//! use std::cell::RefCell;
//!
//! struct LogDrop;
//!
//! impl StatelessDrop<RefCell<Vec<u64>>, u64> for LogDrop {
//!     fn delete(dropped: &RefCell<Vec<u64>>, key: &u64) {
//!         dropped.borrow_mut().push(*key);
//!     }
//! }
//!
//! let mut ward: DropWard<RefCell<Vec<u64>>, u64, LogDrop> = DropWard::new(RefCell::default());
//! ward.inc(7);
//! ward.inc(7);
//! assert_eq!(ward.dec(&7), Some(1));
//! assert_eq!(ward.dec_count(&7, 5), Some(0));
//! assert_eq!(ward.context().borrow().as_slice(), &[7]);
//! ```

use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::marker::PhantomData;

use rustc_hash::FxHashMap;

/// Cleanup hook run with the ward's shared context.
///
/// Implement this on a zero-sized tag type; the tag is never instantiated.
pub trait StatelessDrop<Ctx, K> {
    /// Called exactly once each time `key`'s count drops to zero. Runs synchronously inside
    /// [`DropWard::dec`] or [`DropWard::dec_count`].
    fn delete(ctx: &Ctx, key: &K);
}

/// A reference-counted key set that calls [`StatelessDrop::delete`] when a key's count drops to
/// zero.
///
/// Not thread-safe: every mutation takes `&mut self`.
#[derive(Debug, Clone)]
pub struct DropWard<Ctx, K, T> {
    counts: FxHashMap<K, usize>,
    ctx: Ctx,
    _tag: PhantomData<T>,
}

impl<Ctx, K, T> DropWard<Ctx, K, T>
where
    K: Eq + Hash,
    T: StatelessDrop<Ctx, K>,
{
    const TAG_IS_ZST: () = assert!(size_of::<T>() == 0, "T must be zero-sized");

    /// Create a ward handing `ctx` to every cleanup.
    pub fn new(ctx: Ctx) -> Self {
        let () = Self::TAG_IS_ZST;
        Self {
            counts: FxHashMap::default(),
            ctx,
            _tag: PhantomData,
        }
    }

    /// The shared cleanup context.
    pub fn context(&self) -> &Ctx {
        &self.ctx
    }

    /// Add one reference to `key`. Returns the new count.
    pub fn inc(&mut self, key: K) -> usize {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop one reference to `key`.
    ///
    /// Returns the remaining count, or `None` if `key` was not tracked.
    pub fn dec(&mut self, key: &K) -> Option<usize>
    where
        K: Clone,
    {
        self.dec_count(key, 1)
    }

    /// Drop `by` references to `key`, saturating at zero.
    ///
    /// Returns the remaining count, or `None` if `key` was not tracked.
    pub fn dec_count(&mut self, key: &K, by: usize) -> Option<usize>
    where
        K: Clone,
    {
        let Entry::Occupied(mut slot) = self.counts.entry(key.clone()) else {
            return None;
        };
        let remaining = slot.get().saturating_sub(by);
        if remaining == 0 {
            slot.remove();
            T::delete(&self.ctx, key);
        } else {
            *slot.get_mut() = remaining;
        }
        Some(remaining)
    }

    /// Current count of `key`, zero if untracked.
    pub fn count(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }
}
