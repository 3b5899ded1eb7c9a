//! Synchronization primitives.
//!
//! Every lock in the engine is taken from here so the id generator, the slot lists, and the
//! namespace index can be model-checked under `--cfg loom` without touching their code.
pub mod atomic;

#[cfg(loom)]
pub use loom::sync::{Mutex, RwLock, RwLockReadGuard};

#[cfg(not(loom))]
pub use std::sync::{Mutex, RwLock, RwLockReadGuard};

/// Recover the guard from a poisoned lock.
///
/// Every critical section in the engine is a single map or list update, so the inner value is
/// never half-written.
pub(crate) fn unpoison<G>(res: Result<G, std::sync::PoisonError<G>>) -> G {
    res.unwrap_or_else(std::sync::PoisonError::into_inner)
}
