//! Capability interface between the dispatch layer and a namespace engine.
//!
//! Every verb takes a path (plus verb-specific arguments) and returns a typed result; the
//! dispatch layer turns failures into negative status codes with
//! [`FsError::status`](super::FsError::status).
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;

use crate::fs::{AccessMask, Attr, DirEntry, FileHandle, FsError, FsStats, OpenFile, OpenFlags};

/// One method per POSIX-like verb.
pub trait FsOps: Send + Sync {
    /// Copy out the attributes of `path` and touch its access time.
    fn getattr(&self, path: &Path) -> Result<Attr, FsError>;

    /// Open `path`, creating it when `flags` carries `O_CREAT` and it does not exist.
    fn open(&self, path: &Path, flags: OpenFlags, mode: u32) -> Result<OpenFile, FsError>;

    /// Create and open a file that must not exist yet.
    fn create(&self, path: &Path, mode: u32) -> Result<OpenFile, FsError>;

    /// Create a directory that must not exist yet.
    fn mkdir(&self, path: &Path, mode: u32) -> Result<Attr, FsError>;

    /// Open a directory for listing.
    fn opendir(&self, path: &Path) -> Result<FileHandle, FsError>;

    /// List a directory, starting after the first `offset` entries.
    ///
    /// `.` and `..` come first. Each entry is handed to `filler` together with the offset of the
    /// entry after it; the listing stops as soon as `filler` returns `true`.
    fn readdir(
        &self,
        path: &Path,
        offset: u64,
        filler: impl FnMut(DirEntry<'_>, u64) -> bool,
    ) -> Result<(), FsError>;

    /// Names of the children of a directory, in index order.
    fn list_children(&self, path: &Path) -> Result<Vec<OsString>, FsError> {
        let mut names = Vec::new();
        self.readdir(path, 0, |entry, _| {
            if entry.name != "." && entry.name != ".." {
                names.push(entry.name.to_owned());
            }
            false
        })?;
        Ok(names)
    }

    /// Remove an empty directory.
    fn rmdir(&self, path: &Path) -> Result<(), FsError>;

    /// Move `from` to `to`.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError>;

    /// Remove a file or symlink. A file's slot goes back to the pool.
    fn unlink(&self, path: &Path) -> Result<(), FsError>;

    /// Create `link` as an alias of the file at `target`.
    fn symlink(&self, target: &Path, link: &Path) -> Result<Attr, FsError>;

    /// The absolute path of the file a symlink aliases.
    fn readlink(&self, path: &Path) -> Result<PathBuf, FsError>;

    /// Read up to `size` bytes at `offset` from an open file.
    fn read(&self, fh: FileHandle, offset: u64, size: u32) -> Result<Bytes, FsError>;

    /// Write `data` at `offset` to an open file.
    fn write(&self, fh: FileHandle, offset: u64, data: &[u8]) -> Result<usize, FsError>;

    /// Close a handle returned by [`open`](Self::open) or [`create`](Self::create).
    fn release(&self, fh: FileHandle) -> Result<(), FsError>;

    /// Close a handle returned by [`opendir`](Self::opendir).
    fn releasedir(&self, fh: FileHandle) -> Result<(), FsError>;

    /// Set access and/or modification time. `None` leaves a time unchanged.
    fn utimens(
        &self,
        path: &Path,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> Result<Attr, FsError>;

    /// Change a file's length.
    fn truncate(&self, path: &Path, size: u64) -> Result<Attr, FsError>;

    /// Change permission bits.
    fn chmod(&self, path: &Path, mode: u32) -> Result<Attr, FsError>;

    /// Change ownership.
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<Attr, FsError>;

    /// Check that `path` exists and permits `mask`.
    fn access(&self, path: &Path, mask: AccessMask) -> Result<(), FsError>;

    /// Filesystem-wide statistics.
    fn statfs(&self) -> Result<FsStats, FsError>;

    /// Tear the mount down, closing every slot.
    fn destroy(&self);
}
