//! Namespace and slot-allocation engine.
/// Stable storage for dentries, addressed by [`DentryHandle`].
pub mod arena;
/// Mount-time configuration.
pub mod config;
/// The operation layer: [`SlotFs`](engine::SlotFs).
pub mod engine;
/// Error taxonomy and status-code mapping.
pub mod error;
/// FUSE adapter: maps [`fuser::Filesystem`] callbacks to [`ops::FsOps`].
pub mod fuser;
/// Namespace id generator.
pub mod ids;
/// Ordered namespace index.
pub mod index;
/// Typed namespace keys.
pub mod key;
/// The capability interface exposed to the dispatch layer.
pub mod ops;
/// Recycle pool and active registry.
pub mod pool;
/// Path resolution.
pub mod resolve;
/// Allocation seeder for backing slots.
pub mod seeder;
/// Pre-opened backing files.
pub mod slots;

pub use engine::SlotFs;
pub use error::{FsError, status_of};
pub use ops::FsOps;

use std::ffi::OsStr;
use std::time::SystemTime;

use bitflags::bitflags;

/// Identity of a pre-opened backing slot. This is the raw descriptor of the open backing file.
pub type SlotId = u32;

/// Identity of a namespace entry when it is used as the parent component of a key.
pub type NamespaceId = u32;

/// Type representing a file handle handed to the dispatch layer.
pub type FileHandle = u64;

/// Parent component of the root key.
pub const ROOT_PARENT_ID: NamespaceId = 0;

/// Namespace id of the root directory.
pub const ROOT_NAMESPACE_ID: NamespaceId = 1;

/// Name component of the root key.
pub const ROOT_NAME: &str = "/";

/// File type bits for directories (`mode_t` is narrower than `u32` on some platforms).
pub(crate) const MODE_DIR: u32 = libc::S_IFDIR as u32;
/// File type bits for regular files.
pub(crate) const MODE_REG: u32 = libc::S_IFREG as u32;
/// File type bits for symlinks.
pub(crate) const MODE_LNK: u32 = libc::S_IFLNK as u32;
/// Mask of the file type bits.
pub(crate) const MODE_TYPE_MASK: u32 = libc::S_IFMT as u32;

/// Handle of a dentry inside the [`arena::DentryTable`].
///
/// Handles are small integers rather than addresses. A handle stays valid for as long as its
/// dentry lives in the table; file dentries live for the whole mount, cycling between the pool and
/// the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DentryHandle(pub u32);

impl DentryHandle {
    /// The root directory is always the first dentry inserted at mount.
    pub const ROOT: Self = Self(0);

    /// The inode number reported to the kernel for this handle. The root maps to 1.
    #[must_use]
    pub fn ino(self) -> u64 {
        u64::from(self.0) + 1
    }

    /// Inverse of [`ino`](Self::ino).
    #[must_use]
    pub fn from_ino(ino: u64) -> Option<Self> {
        ino.checked_sub(1)
            .and_then(|raw| u32::try_from(raw).ok())
            .map(Self)
    }
}

bitflags! {
    /// The flag word carried by every dentry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DentryFlags: u32 {
        /// Set for files and symlinks, clear for directories.
        const FILE       = 1 << 0;
        /// Reserved for small-file packing. No operation sets it.
        const SMALL_FILE = 1 << 1;
        /// The dentry is visible in the namespace (member of the active registry).
        const DIRTY      = 1 << 2;
        /// The dentry is an alias of another file's slot.
        const SYMLINK    = 1 << 3;
    }
}

bitflags! {
    /// Flags for opening a file, similar to Unix open(2) flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: i32 {
        /// Open for reading only.
        const RDONLY = libc::O_RDONLY;
        /// Open for writing only.
        const WRONLY = libc::O_WRONLY;
        /// Open for reading and writing.
        const RDWR = libc::O_RDWR;

        /// Append on each write.
        const APPEND = libc::O_APPEND;
        /// Truncate to zero length.
        const TRUNC = libc::O_TRUNC;
        /// Create file if it does not exist.
        const CREAT = libc::O_CREAT;
        /// Error if file already exists (with `CREAT`).
        const EXCL = libc::O_EXCL;

        /// Do not follow symlinks.
        const NOFOLLOW = libc::O_NOFOLLOW;
        /// Fail if not a directory.
        const DIRECTORY = libc::O_DIRECTORY;
    }
}

impl OpenFlags {
    /// Whether the access mode allows writing.
    #[must_use]
    pub fn writable(self) -> bool {
        self.intersects(Self::WRONLY | Self::RDWR)
    }
}

bitflags! {
    /// Permission probe for [`FsOps::access`]. The empty set is an existence check.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMask: i32 {
        /// Read permission.
        const READ = libc::R_OK;
        /// Write permission.
        const WRITE = libc::W_OK;
        /// Execute or search permission.
        const EXECUTE = libc::X_OK;
    }
}

/// The type of a namespace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DentryKind {
    /// A directory.
    Directory,
    /// A regular file backed by its own slot.
    File,
    /// An alias sharing another file's slot.
    Symlink,
}

/// A namespace entry: identity plus metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dentry {
    /// The backing slot. Meaningless for directories.
    pub slot_id: SlotId,
    /// Parent component for this entry's children.
    pub namespace_id: NamespaceId,
    /// Type and state bits.
    pub flags: DentryFlags,
    /// Full `st_mode`, type bits included.
    pub mode: u32,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// Link count.
    pub nlink: u32,
    /// Content length in bytes.
    pub size: u64,
    /// Last status change.
    pub ctime: SystemTime,
    /// Last modification.
    pub mtime: SystemTime,
    /// Last access.
    pub atime: SystemTime,
}

impl Dentry {
    /// A fresh, not yet active, directory.
    #[must_use]
    pub fn directory(namespace_id: NamespaceId, perm: u32, uid: u32, gid: u32) -> Self {
        let now = SystemTime::now();
        Self {
            slot_id: 0,
            namespace_id,
            flags: DentryFlags::empty(),
            mode: MODE_DIR | (perm & 0o7777),
            uid,
            gid,
            nlink: 2,
            size: 0,
            ctime: now,
            mtime: now,
            atime: now,
        }
    }

    /// A fresh pool member wrapping backing slot `slot_id`.
    #[must_use]
    pub fn file(slot_id: SlotId, namespace_id: NamespaceId, uid: u32, gid: u32) -> Self {
        let now = SystemTime::now();
        Self {
            slot_id,
            namespace_id,
            flags: DentryFlags::FILE,
            mode: MODE_REG | 0o644,
            uid,
            gid,
            nlink: 0,
            size: 0,
            ctime: now,
            mtime: now,
            atime: now,
        }
    }

    /// Forget everything a previous name left on a file dentry. The slot identity survives.
    pub fn reset(&mut self) {
        let now = SystemTime::now();
        self.flags = DentryFlags::FILE;
        self.mode = MODE_REG | 0o644;
        self.nlink = 0;
        self.size = 0;
        self.ctime = now;
        self.mtime = now;
        self.atime = now;
    }

    /// The kind encoded in the flag word.
    #[must_use]
    pub fn kind(&self) -> DentryKind {
        if !self.flags.contains(DentryFlags::FILE) {
            DentryKind::Directory
        } else if self.flags.contains(DentryFlags::SYMLINK) {
            DentryKind::Symlink
        } else {
            DentryKind::File
        }
    }

    /// Whether this dentry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind() == DentryKind::Directory
    }

    /// Whether this dentry is a symlink alias.
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.kind() == DentryKind::Symlink
    }

    /// Whether this dentry is currently visible in the namespace.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(DentryFlags::DIRTY)
    }

    /// Permission bits only.
    #[must_use]
    pub fn perm(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Attributes copied out of a dentry by `getattr` and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    /// Inode number (see [`DentryHandle::ino`]).
    pub ino: u64,
    /// Entry type.
    pub kind: DentryKind,
    /// Permission bits.
    pub perm: u16,
    /// Link count.
    pub nlink: u32,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// Content length in bytes.
    pub size: u64,
    /// Last access.
    pub atime: SystemTime,
    /// Last modification.
    pub mtime: SystemTime,
    /// Last status change.
    pub ctime: SystemTime,
    /// Backing slot (files and symlinks).
    pub slot_id: SlotId,
    /// Namespace id.
    pub namespace_id: NamespaceId,
}

impl Attr {
    /// Copy the attributes of `dentry`, addressed by `handle`.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "perm is masked to 12 bits before narrowing"
    )]
    pub fn new(handle: DentryHandle, dentry: &Dentry) -> Self {
        Self {
            ino: handle.ino(),
            kind: dentry.kind(),
            perm: dentry.perm() as u16,
            nlink: dentry.nlink,
            uid: dentry.uid,
            gid: dentry.gid,
            size: dentry.size,
            atime: dentry.atime,
            mtime: dentry.mtime,
            ctime: dentry.ctime,
            slot_id: dentry.slot_id,
            namespace_id: dentry.namespace_id,
        }
    }
}

/// A directory entry yielded by [`FsOps::readdir`].
#[derive(Debug, Clone, Copy)]
pub struct DirEntry<'a> {
    /// The name of this entry within its parent directory.
    pub name: &'a OsStr,
    /// Inode number of the entry.
    pub ino: u64,
    /// Entry type.
    pub kind: DentryKind,
}

/// A file opened through [`FsOps::open`] or [`FsOps::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    /// Handle for subsequent read/write/release calls.
    pub fh: FileHandle,
    /// The slot the handle addresses.
    pub slot_id: SlotId,
    /// Attributes at open time.
    pub attr: Attr,
}

/// Filesystem statistics returned by [`FsOps::statfs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FsStats {
    /// Filesystem block size (bytes).
    pub block_size: u32,
    /// Slots created by the seeder so far.
    pub total_slots: u64,
    /// Slots waiting in the pool.
    pub free_slots: u64,
    /// Entries visible in the namespace, root included.
    pub active_entries: u64,
    /// Maximum filename length (bytes).
    pub max_filename_length: u32,
}
