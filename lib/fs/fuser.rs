//! FUSE adapter: maps [`fuser::Filesystem`] callbacks to [`FsOps`].
//!
//! The kernel addresses entries by inode number while the engine addresses them by path. The
//! adapter keeps an inode-to-path map fed by every reply that hands the kernel a new entry
//! (`lookup`, `create`, `mkdir`, `symlink`) and pruned by `forget`.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, instrument};

use super::{AccessMask, Attr, DentryKind, FsError, FsOps, OpenFlags};
use crate::drop_ward::{DropWard, StatelessDrop};

/// Inode number of the root directory.
pub const ROOT_INO: u64 = fuser::FUSE_ROOT_ID;

/// `renameat2` flag asking for an atomic swap, which the engine cannot express.
const RENAME_EXCHANGE: u32 = 1 << 1;

const BLOCK_SIZE: u32 = 4096;

/// How long the kernel may cache entries and attributes.
const TTL: Duration = Duration::from_secs(1);

type PathMap = Arc<scc::HashMap<u64, PathBuf>>;

/// Drops an inode's path once the kernel has forgotten every lookup of it.
struct ForgetPath;

impl StatelessDrop<PathMap, u64> for ForgetPath {
    fn delete(paths: &PathMap, ino: &u64) {
        if *ino != ROOT_INO {
            paths.remove_sync(ino);
        }
    }
}

/// Trait abstracting the `.error(errno)` method common to all fuser reply types.
trait FuseReply {
    fn error(self, errno: i32);
}

macro_rules! impl_fuse_reply {
    ($($ty:ty),* $(,)?) => {
        $(impl FuseReply for $ty {
            fn error(self, errno: i32) {
                // Calls the inherent fuser method (not this trait method).
                self.error(errno);
            }
        })*
    };
}

impl_fuse_reply!(
    fuser::ReplyEntry,
    fuser::ReplyAttr,
    fuser::ReplyDirectory,
    fuser::ReplyOpen,
    fuser::ReplyData,
    fuser::ReplyEmpty,
    fuser::ReplyWrite,
    fuser::ReplyCreate,
    fuser::ReplyStatfs,
);

/// Extension trait on `Result<T, FsError>` for FUSE reply handling.
///
/// Centralizes the error-logging + errno-reply path so each FUSE callback
/// only has to express its success path.
trait FuseResultExt<T> {
    fn fuse_reply<R: FuseReply>(self, reply: R, on_ok: impl FnOnce(T, R));
}

impl<T> FuseResultExt<T> for Result<T, FsError> {
    fn fuse_reply<R: FuseReply>(self, reply: R, on_ok: impl FnOnce(T, R)) {
        match self {
            Ok(val) => on_ok(val, reply),
            Err(e) => {
                debug!(error = %e, "replying error");
                reply.error(i32::from(&e));
            }
        }
    }
}

fn kind_to_fuser(kind: DentryKind) -> fuser::FileType {
    match kind {
        DentryKind::Directory => fuser::FileType::Directory,
        DentryKind::File => fuser::FileType::RegularFile,
        DentryKind::Symlink => fuser::FileType::Symlink,
    }
}

impl From<Attr> for fuser::FileAttr {
    fn from(attr: Attr) -> Self {
        Self {
            ino: attr.ino,
            size: attr.size,
            blocks: attr.size.div_ceil(512),
            atime: attr.atime,
            mtime: attr.mtime,
            ctime: attr.ctime,
            crtime: attr.ctime,
            kind: kind_to_fuser(attr.kind),
            perm: attr.perm,
            nlink: attr.nlink,
            uid: attr.uid,
            gid: attr.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }
}

fn time_or_now(t: fuser::TimeOrNow) -> SystemTime {
    match t {
        fuser::TimeOrNow::SpecificTime(t) => t,
        fuser::TimeOrNow::Now => SystemTime::now(),
    }
}

fn offset_of(offset: i64) -> Result<u64, FsError> {
    u64::try_from(offset).map_err(|_| FsError::InvalidArgument)
}

/// Bridges a path-addressed [`FsOps`] engine to the [`fuser::Filesystem`] trait.
pub struct FuserAdapter<F: FsOps> {
    fs: Arc<F>,
    paths: PathMap,
    lookups: DropWard<PathMap, u64, ForgetPath>,
}

impl<F: FsOps> FuserAdapter<F> {
    /// Wrap an already mounted engine.
    pub fn new(fs: Arc<F>) -> Self {
        let paths: PathMap = Arc::new(scc::HashMap::new());
        let _ = paths.insert_sync(ROOT_INO, PathBuf::from("/"));
        Self {
            fs,
            lookups: DropWard::new(Arc::clone(&paths)),
            paths,
        }
    }

    fn path_of(&self, ino: u64) -> Result<PathBuf, FsError> {
        self.paths
            .read_sync(&ino, |_, path| path.clone())
            .ok_or(FsError::NotFound)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Result<PathBuf, FsError> {
        Ok(self.path_of(parent)?.join(name))
    }

    /// Record that the kernel now holds one more reference to `attr.ino`, reachable at `path`.
    fn remember(&mut self, path: PathBuf, attr: &Attr) {
        self.paths.upsert_sync(attr.ino, path);
        self.lookups.inc(attr.ino);
    }

    /// Rewrite every mapped path at or below `from` to live below `to`.
    fn move_paths(&self, from: &Path, to: &Path) {
        self.paths.retain_sync(|_, path| {
            if let Ok(rest) = path.strip_prefix(from) {
                *path = if rest.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rest)
                };
            }
            true
        });
    }
}

impl<F: FsOps> fuser::Filesystem for FuserAdapter<F> {
    #[instrument(name = "FuserAdapter::destroy", skip(self))]
    fn destroy(&mut self) {
        self.fs.destroy();
    }

    #[instrument(name = "FuserAdapter::lookup", skip(self, _req, reply))]
    fn lookup(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEntry,
    ) {
        self.child_path(parent, name)
            .and_then(|path| {
                let attr = self.fs.getattr(&path)?;
                self.remember(path, &attr);
                Ok(attr)
            })
            .fuse_reply(reply, |attr, reply| {
                let f_attr = fuser::FileAttr::from(attr);
                debug!(?f_attr, "replying...");
                reply.entry(&TTL, &f_attr, 0);
            });
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "nlookups fits in usize on supported 64-bit platforms"
    )]
    #[instrument(name = "FuserAdapter::forget", skip(self, _req, nlookup))]
    fn forget(&mut self, _req: &fuser::Request<'_>, ino: u64, nlookup: u64) {
        self.lookups.dec_count(&ino, nlookup as usize);
    }

    #[instrument(name = "FuserAdapter::getattr", skip(self, _req, _fh, reply))]
    fn getattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: Option<u64>,
        reply: fuser::ReplyAttr,
    ) {
        self.path_of(ino)
            .and_then(|path| self.fs.getattr(&path))
            .fuse_reply(reply, |attr, reply| {
                reply.attr(&TTL, &attr.into());
            });
    }

    #[instrument(
        name = "FuserAdapter::setattr",
        skip(self, _req, _ctime, _fh, _crtime, _chgtime, _bkuptime, _flags, reply)
    )]
    fn setattr(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<fuser::TimeOrNow>,
        mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: fuser::ReplyAttr,
    ) {
        self.path_of(ino)
            .and_then(|path| {
                if let Some(size) = size {
                    self.fs.truncate(&path, size)?;
                }
                if uid.is_some() || gid.is_some() {
                    self.fs.chown(&path, uid, gid)?;
                }
                if let Some(mode) = mode {
                    self.fs.chmod(&path, mode)?;
                }
                if atime.is_some() || mtime.is_some() {
                    self.fs
                        .utimens(&path, atime.map(time_or_now), mtime.map(time_or_now))?;
                }
                self.fs.getattr(&path)
            })
            .fuse_reply(reply, |attr, reply| {
                reply.attr(&TTL, &attr.into());
            });
    }

    #[instrument(name = "FuserAdapter::readlink", skip(self, _req, reply))]
    fn readlink(&mut self, _req: &fuser::Request<'_>, ino: u64, reply: fuser::ReplyData) {
        self.path_of(ino)
            .and_then(|path| self.fs.readlink(&path))
            .fuse_reply(reply, |target, reply| {
                reply.data(target.as_os_str().as_bytes());
            });
    }

    #[instrument(name = "FuserAdapter::mkdir", skip(self, _req, reply))]
    fn mkdir(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: fuser::ReplyEntry,
    ) {
        self.child_path(parent, name)
            .and_then(|path| {
                let attr = self.fs.mkdir(&path, mode & !umask)?;
                self.remember(path, &attr);
                Ok(attr)
            })
            .fuse_reply(reply, |attr, reply| {
                reply.entry(&TTL, &attr.into(), 0);
            });
    }

    #[instrument(name = "FuserAdapter::unlink", skip(self, _req, reply))]
    fn unlink(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEmpty,
    ) {
        self.child_path(parent, name)
            .and_then(|path| self.fs.unlink(&path))
            .fuse_reply(reply, |(), reply| reply.ok());
    }

    #[instrument(name = "FuserAdapter::rmdir", skip(self, _req, reply))]
    fn rmdir(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        reply: fuser::ReplyEmpty,
    ) {
        self.child_path(parent, name)
            .and_then(|path| self.fs.rmdir(&path))
            .fuse_reply(reply, |(), reply| reply.ok());
    }

    #[instrument(name = "FuserAdapter::symlink", skip(self, _req, reply))]
    fn symlink(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: fuser::ReplyEntry,
    ) {
        self.child_path(parent, link_name)
            .and_then(|path| {
                let attr = self.fs.symlink(target, &path)?;
                self.remember(path, &attr);
                Ok(attr)
            })
            .fuse_reply(reply, |attr, reply| {
                reply.entry(&TTL, &attr.into(), 0);
            });
    }

    #[instrument(name = "FuserAdapter::rename", skip(self, _req, reply))]
    fn rename(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: fuser::ReplyEmpty,
    ) {
        let result = (|| {
            if flags & RENAME_EXCHANGE != 0 {
                return Err(FsError::InvalidArgument);
            }
            let from = self.child_path(parent, name)?;
            let to = self.child_path(newparent, newname)?;
            let moved = self.fs.getattr(&from)?.ino;
            self.fs.rename(&from, &to)?;

            // A rename onto an existing directory moves the source inside it.
            let landed = match self.fs.getattr(&to) {
                Ok(attr) if attr.ino == moved => to,
                _ => to.join(name),
            };
            self.move_paths(&from, &landed);
            Ok(())
        })();
        result.fuse_reply(reply, |(), reply| reply.ok());
    }

    #[instrument(name = "FuserAdapter::open", skip(self, _req, reply))]
    fn open(&mut self, _req: &fuser::Request<'_>, ino: u64, flags: i32, reply: fuser::ReplyOpen) {
        let flags = OpenFlags::from_bits_truncate(flags);
        self.path_of(ino)
            .and_then(|path| self.fs.open(&path, flags, 0o644))
            .fuse_reply(reply, |open_file, reply| {
                debug!(handle = open_file.fh, "replying...");
                reply.opened(open_file.fh, 0);
            });
    }

    #[instrument(
        name = "FuserAdapter::read",
        skip(self, _req, _ino, _flags, _lock_owner, reply)
    )]
    fn read(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyData,
    ) {
        offset_of(offset)
            .and_then(|offset| self.fs.read(fh, offset, size))
            .fuse_reply(reply, |data, reply| {
                debug!(read_bytes = data.len(), "replying...");
                reply.data(&data);
            });
    }

    #[instrument(
        name = "FuserAdapter::write",
        skip(self, _req, _ino, data, _write_flags, _flags, _lock_owner, reply),
        fields(len = data.len())
    )]
    fn write(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: fuser::ReplyWrite,
    ) {
        offset_of(offset)
            .and_then(|offset| self.fs.write(fh, offset, data))
            .fuse_reply(reply, |written, reply| {
                reply.written(u32::try_from(written).unwrap_or(u32::MAX));
            });
    }

    #[instrument(
        name = "FuserAdapter::release",
        skip(self, _req, _ino, _flags, _lock_owner, _flush, reply)
    )]
    fn release(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: fuser::ReplyEmpty,
    ) {
        self.fs
            .release(fh)
            .fuse_reply(reply, |(), reply| reply.ok());
    }

    #[instrument(name = "FuserAdapter::opendir", skip(self, _req, _flags, reply))]
    fn opendir(&mut self, _req: &fuser::Request<'_>, ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        self.path_of(ino)
            .and_then(|path| self.fs.opendir(&path))
            .fuse_reply(reply, |fh, reply| reply.opened(fh, 0));
    }

    #[instrument(name = "FuserAdapter::readdir", skip(self, _req, _fh, reply))]
    fn readdir(
        &mut self,
        _req: &fuser::Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: fuser::ReplyDirectory,
    ) {
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(e) => {
                reply.error(i32::from(&e));
                return;
            }
        };
        let result = offset_of(offset).and_then(|offset| {
            self.fs.readdir(&path, offset, |entry, next| {
                let full = reply.add(
                    entry.ino,
                    next.cast_signed(),
                    kind_to_fuser(entry.kind),
                    entry.name,
                );
                if full {
                    debug!("buffer full for now, stopping readdir");
                }
                full
            })
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => {
                debug!(error = %e, "replying error");
                reply.error(i32::from(&e));
            }
        }
    }

    #[instrument(name = "FuserAdapter::releasedir", skip(self, _req, _ino, _flags, reply))]
    fn releasedir(
        &mut self,
        _req: &fuser::Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        reply: fuser::ReplyEmpty,
    ) {
        self.fs
            .releasedir(fh)
            .fuse_reply(reply, |(), reply| reply.ok());
    }

    #[instrument(name = "FuserAdapter::statfs", skip(self, _req, _ino, reply))]
    fn statfs(&mut self, _req: &fuser::Request<'_>, _ino: u64, reply: fuser::ReplyStatfs) {
        self.fs.statfs().fuse_reply(reply, |stats, reply| {
            debug!(?stats, "replying...");
            reply.statfs(
                stats.total_slots,
                stats.free_slots,
                stats.free_slots,
                stats.total_slots,
                stats.free_slots,
                stats.block_size,
                stats.max_filename_length,
                stats.block_size,
            );
        });
    }

    #[instrument(name = "FuserAdapter::access", skip(self, _req, reply))]
    fn access(&mut self, _req: &fuser::Request<'_>, ino: u64, mask: i32, reply: fuser::ReplyEmpty) {
        let mask = AccessMask::from_bits_truncate(mask);
        self.path_of(ino)
            .and_then(|path| self.fs.access(&path, mask))
            .fuse_reply(reply, |(), reply| reply.ok());
    }

    #[instrument(name = "FuserAdapter::create", skip(self, _req, reply))]
    fn create(
        &mut self,
        _req: &fuser::Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: fuser::ReplyCreate,
    ) {
        let flags = OpenFlags::from_bits_truncate(flags);
        self.child_path(parent, name)
            .and_then(|path| {
                let open_file = if flags.contains(OpenFlags::EXCL) {
                    self.fs.create(&path, mode & !umask)?
                } else {
                    self.fs.open(&path, flags | OpenFlags::CREAT, mode & !umask)?
                };
                self.remember(path, &open_file.attr);
                Ok(open_file)
            })
            .fuse_reply(reply, |open_file, reply| {
                debug!(handle = open_file.fh, "replying...");
                reply.created(&TTL, &open_file.attr.into(), 0, open_file.fh, 0);
            });
    }
}
