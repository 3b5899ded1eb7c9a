//! slotfs shared library: the namespace and slot-allocation engine.

pub mod drop_ward;
/// The namespace engine and its FUSE adapter.
pub mod fs;
pub mod io;
pub mod sync;
