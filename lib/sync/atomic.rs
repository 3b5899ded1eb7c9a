//! Atomics used by the dentry arena, swapped for loom's under `--cfg loom`.

#[cfg(loom)]
pub use loom::sync::atomic::{AtomicU32, Ordering};

#[cfg(not(loom))]
pub use std::sync::atomic::{AtomicU32, Ordering};
