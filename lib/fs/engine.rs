//! The operation layer.
//!
//! [`SlotFs`] is the explicit engine context: it is built by [`SlotFs::mount`], shared by every
//! worker thread, and torn down by [`FsOps::destroy`]. Every verb resolves its path first under a
//! shared snapshot of the index, then takes the write lock of each structure it mutates only for
//! that one access. Between those two steps another thread may change the same keys; the index
//! mutations re-check identity and report [`FsError::IdentityMismatch`] or
//! [`FsError::AlreadyExists`] instead of overwriting.
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use tracing::{debug, error, info, instrument, warn};

use crate::fs::arena::DentryTable;
use crate::fs::config::MountConfig;
use crate::fs::ids::IdGenerator;
use crate::fs::index::{InsertOutcome, NamespaceIndex, RekeyError, RemoveDirError};
use crate::fs::key::NamespaceKey;
use crate::fs::ops::FsOps;
use crate::fs::pool::SlotPool;
use crate::fs::resolve::{self, ResolveError, Resolved};
use crate::fs::seeder::{SeededSlot, Seeder};
use crate::fs::slots::{SlotTable, slot_id_of};
use crate::fs::{
    AccessMask, Attr, Dentry, DentryFlags, DentryHandle, DentryKind, DirEntry, FileHandle,
    FsError, FsStats, MODE_LNK, MODE_REG, MODE_TYPE_MASK, NamespaceId, OpenFile, OpenFlags,
    ROOT_NAMESPACE_ID, SlotId,
};

const BLOCK_SIZE: u32 = 4096;
const MAX_NAME_LEN: u32 = 255;

/// A mounted namespace over a pool of pre-opened backing slots.
pub struct SlotFs {
    config: MountConfig,
    index: NamespaceIndex,
    table: DentryTable,
    pool: SlotPool,
    slots: SlotTable,
    ids: IdGenerator,
    seeder: Seeder,
}

/// Where a new entry will go.
struct Placement {
    parent: DentryHandle,
    key: NamespaceKey,
}

impl SlotFs {
    /// Build the engine: create the root directory, wipe and re-seed the backing tree and fill
    /// the pool.
    #[instrument(name = "SlotFs::mount", skip(config), fields(backing_root = %config.backing_root.display()))]
    pub fn mount(config: MountConfig) -> Result<Self, FsError> {
        if let Err(errors) = config.validate() {
            error!(?errors, "invalid mount configuration");
            return Err(FsError::InvalidArgument);
        }
        let meta = std::fs::metadata(&config.backing_root)?;
        if !meta.is_dir() {
            return Err(FsError::NotADirectory);
        }

        let seeder = Seeder::new(&config.backing_root, config.layout());
        let fs = Self {
            index: NamespaceIndex::new(),
            table: DentryTable::new(),
            pool: SlotPool::new(),
            slots: SlotTable::new(),
            ids: IdGenerator::default(),
            seeder,
            config,
        };

        let root = fs
            .table
            .insert(Dentry::directory(
                ROOT_NAMESPACE_ID,
                0o755,
                fs.config.uid,
                fs.config.gid,
            ))
            .ok_or(FsError::NoFreeSlots)?;
        debug_assert_eq!(root, DentryHandle::ROOT);
        fs.pool.activate(&fs.table, root);
        fs.index.insert(NamespaceKey::root(), root);

        fs.seeder.prepare()?;
        let initial = fs.seeder.seed(fs.config.slot_ceiling)?;
        let adopted = fs.adopt(initial)?;
        info!(slots = adopted, "mounted");
        Ok(fs)
    }

    /// The configuration this engine was mounted with.
    #[must_use]
    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    /// Wrap freshly seeded files into dentries and hand them to the pool.
    fn adopt(&self, seeded: Vec<SeededSlot>) -> Result<usize, FsError> {
        let mut adopted = 0;
        for SeededSlot { file, path } in seeded {
            let namespace_id = self.ids.generate().ok_or(FsError::NoFreeSlots)?;
            let slot_id = slot_id_of(&file);
            let handle = self
                .table
                .insert(Dentry::file(
                    slot_id,
                    namespace_id,
                    self.config.uid,
                    self.config.gid,
                ))
                .ok_or(FsError::NoFreeSlots)?;
            self.slots.register(file, path, handle);
            self.pool.release(&self.table, handle);
            adopted += 1;
        }
        Ok(adopted)
    }

    /// Seed one more generation into the pool.
    fn grow(&self) -> Result<usize, FsError> {
        let seeded = self.seeder.seed(self.config.growth.batch).map_err(|e| {
            error!(error = %e, "failed to grow the slot pool");
            FsError::NoFreeSlots
        })?;
        self.adopt(seeded)
    }

    /// Take a slot from the pool, growing it while it is empty and growth is enabled.
    ///
    /// Another thread may take the slots a top-up produced before this one gets to them, so growth
    /// repeats until a slot comes back. Only a failed or empty top-up is exhaustion.
    fn acquire_slot(&self) -> Result<DentryHandle, FsError> {
        loop {
            if let Some(handle) = self.pool.acquire() {
                return Ok(handle);
            }
            if !self.config.growth.enabled {
                warn!("slot pool exhausted");
                return Err(FsError::NoFreeSlots);
            }
            let grown = self.grow()?;
            if grown == 0 {
                error!("slot pool top-up produced no slots");
                return Err(FsError::NoFreeSlots);
            }
            debug!(grown, "slot pool topped up");
        }
    }

    /// Zero a file dentry's slot and put it back in the pool.
    ///
    /// A slot whose content cannot be dropped is kept out of the pool for the rest of the mount.
    fn recycle_slot(&self, handle: DentryHandle, slot_id: SlotId) {
        if let Err(e) = self.slots.truncate(slot_id) {
            error!(slot_id, error = %e, "failed to truncate slot, quarantining it");
            return;
        }
        self.table.update(handle, Dentry::reset);
        self.pool.release(&self.table, handle);
    }

    fn resolve(&self, path: &Path) -> Result<Resolved, ResolveError> {
        resolve::resolve(&self.index, &self.table, path)
    }

    fn resolve_existing(&self, path: &Path) -> Result<Resolved, FsError> {
        self.resolve(path).map_err(FsError::from)
    }

    /// Resolve the parent of a path that must not exist yet.
    fn placement(&self, path: &Path) -> Result<Placement, FsError> {
        match self.resolve(path) {
            Ok(_) => Err(FsError::AlreadyExists),
            Err(ResolveError::MissFile {
                parent,
                parent_dentry,
            }) => {
                let name = leaf(path)?;
                Ok(Placement {
                    parent,
                    key: NamespaceKey::new(parent_dentry.namespace_id, name),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert an already-activated dentry, rolling back with `undo` if the name got taken.
    fn publish(
        &self,
        key: NamespaceKey,
        handle: DentryHandle,
        undo: impl FnOnce(&Self),
    ) -> Result<(), FsError> {
        match self.index.insert(key, handle) {
            InsertOutcome::Inserted => Ok(()),
            InsertOutcome::AlreadyPresent(_) => {
                self.pool.deactivate(handle);
                undo(self);
                Err(FsError::AlreadyExists)
            }
        }
    }

    fn create_file(&self, placement: Placement, mode: u32) -> Result<OpenFile, FsError> {
        let handle = self.acquire_slot()?;
        let now = SystemTime::now();
        let (uid, gid) = (self.config.uid, self.config.gid);
        let Some(dentry) = self.table.update(handle, |d| {
            d.reset();
            d.mode = MODE_REG | (mode & 0o7777);
            d.uid = uid;
            d.gid = gid;
            d.nlink = 1;
            d.ctime = now;
            d.mtime = now;
            d.atime = now;
            *d
        }) else {
            error!(?handle, "pooled dentry vanished from the table");
            return Err(FsError::IdentityMismatch);
        };
        self.pool.activate(&self.table, handle);
        self.publish(placement.key, handle, |fs| {
            fs.table.update(handle, Dentry::reset);
            fs.pool.release(&fs.table, handle);
        })?;
        self.touch(placement.parent, now);
        debug!(slot_id = dentry.slot_id, "file created");

        let attr = self.attr_of(handle)?;
        Ok(OpenFile {
            fh: FileHandle::from(dentry.slot_id),
            slot_id: dentry.slot_id,
            attr,
        })
    }

    /// Bump a directory's modification and change times.
    fn touch(&self, dir: DentryHandle, now: SystemTime) {
        self.table.update(dir, |d| {
            d.mtime = now;
            d.ctime = now;
        });
    }

    fn attr_of(&self, handle: DentryHandle) -> Result<Attr, FsError> {
        self.table
            .get(handle)
            .map(|d| Attr::new(handle, &d))
            .ok_or(FsError::NotFound)
    }

    /// The active file dentry owning an open slot.
    fn live_owner(&self, fh: FileHandle) -> Result<(SlotId, DentryHandle), FsError> {
        let slot_id = SlotId::try_from(fh).map_err(|_| FsError::BadHandle)?;
        let owner = self.slots.owner(slot_id).ok_or(FsError::BadHandle)?;
        if !self.pool.is_active(owner) {
            return Err(FsError::BadHandle);
        }
        Ok((slot_id, owner))
    }

    /// The file dentry a symlink aliases, if it is still named somewhere.
    fn link_target(&self, dentry: &Dentry) -> Result<DentryHandle, FsError> {
        self.slots
            .owner(dentry.slot_id)
            .filter(|owner| self.pool.is_active(*owner))
            .ok_or(FsError::BrokenLink)
    }

    fn key_of(resolved: &Resolved, path: &Path) -> Result<NamespaceKey, FsError> {
        Ok(NamespaceKey::new(resolved.parent_id, leaf(path)?))
    }

    /// Absolute path of the directory named by `key`, walking parent keys up to the root.
    fn absolute_path(
        dirs: &HashMap<NamespaceId, (NamespaceId, OsString)>,
        key: &NamespaceKey,
    ) -> Option<PathBuf> {
        let mut names = vec![key.name().to_owned()];
        let mut parent = key.parent();
        while parent != ROOT_NAMESPACE_ID {
            let (grandparent, name) = dirs.get(&parent)?;
            names.push(name.clone());
            parent = *grandparent;
        }
        let mut path = PathBuf::from("/");
        path.extend(names.iter().rev());
        Some(path)
    }
}

/// The final name of a path that must have one.
fn leaf(path: &Path) -> Result<&OsStr, FsError> {
    let name = resolve::leaf_name(path).ok_or(FsError::InvalidArgument)?;
    if name.len() > MAX_NAME_LEN as usize {
        return Err(FsError::InvalidArgument);
    }
    Ok(name)
}

/// Component-wise, with `.` dropped.
fn is_within(path: &Path, ancestor: &Path) -> bool {
    let mut path = resolve::components(path);
    resolve::components(ancestor).all(|name| path.next() == Some(name))
}

impl FsOps for SlotFs {
    #[instrument(name = "SlotFs::getattr", skip(self))]
    fn getattr(&self, path: &Path) -> Result<Attr, FsError> {
        let resolved = self.resolve_existing(path)?;
        let attr = Attr::new(resolved.handle, &resolved.dentry);
        self.table
            .update(resolved.handle, |d| d.atime = SystemTime::now());
        Ok(attr)
    }

    #[instrument(name = "SlotFs::open", skip(self))]
    fn open(&self, path: &Path, flags: OpenFlags, mode: u32) -> Result<OpenFile, FsError> {
        let resolved = match self.resolve(path) {
            Ok(resolved) => resolved,
            Err(ResolveError::MissFile { .. }) if flags.contains(OpenFlags::CREAT) => {
                return self.create_file(self.placement(path)?, mode);
            }
            Err(e) => return Err(e.into()),
        };
        if flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) {
            return Err(FsError::AlreadyExists);
        }

        let owner = match resolved.dentry.kind() {
            DentryKind::Directory => return Err(FsError::IsADirectory),
            DentryKind::File => resolved.handle,
            DentryKind::Symlink => self.link_target(&resolved.dentry)?,
        };
        let slot_id = resolved.dentry.slot_id;
        if flags.contains(OpenFlags::TRUNC) && flags.writable() {
            self.slots.truncate(slot_id)?;
            let now = SystemTime::now();
            self.table.update(owner, |d| {
                d.size = 0;
                d.mtime = now;
                d.ctime = now;
            });
        }
        debug!(slot_id, "opened");
        Ok(OpenFile {
            fh: FileHandle::from(slot_id),
            slot_id,
            attr: self.attr_of(resolved.handle)?,
        })
    }

    #[instrument(name = "SlotFs::create", skip(self))]
    fn create(&self, path: &Path, mode: u32) -> Result<OpenFile, FsError> {
        let placement = self.placement(path)?;
        self.create_file(placement, mode)
    }

    #[instrument(name = "SlotFs::mkdir", skip(self))]
    fn mkdir(&self, path: &Path, mode: u32) -> Result<Attr, FsError> {
        let placement = self.placement(path)?;
        let namespace_id = self.ids.generate().ok_or(FsError::NoFreeSlots)?;
        let handle = self
            .table
            .insert(Dentry::directory(
                namespace_id,
                mode,
                self.config.uid,
                self.config.gid,
            ))
            .ok_or(FsError::NoFreeSlots)?;
        self.pool.activate(&self.table, handle);
        self.publish(placement.key, handle, |fs| {
            fs.table.remove(handle);
        })?;
        self.touch(placement.parent, SystemTime::now());
        debug!(namespace_id, "directory created");
        self.attr_of(handle)
    }

    #[instrument(name = "SlotFs::opendir", skip(self))]
    fn opendir(&self, path: &Path) -> Result<FileHandle, FsError> {
        let resolved = self.resolve_existing(path)?;
        if !resolved.dentry.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(resolved.handle.ino())
    }

    #[instrument(name = "SlotFs::readdir", skip(self, filler))]
    fn readdir(
        &self,
        path: &Path,
        offset: u64,
        mut filler: impl FnMut(DirEntry<'_>, u64) -> bool,
    ) -> Result<(), FsError> {
        let resolved = self.resolve_existing(path)?;
        if !resolved.dentry.is_dir() {
            return Err(FsError::NotADirectory);
        }

        let mut children = Vec::new();
        self.index
            .scan_prefix(resolved.dentry.namespace_id, None, |name, handle| {
                children.push((name.to_owned(), handle));
                false
            });

        let dots = [
            (OsString::from("."), resolved.handle.ino(), DentryKind::Directory),
            (OsString::from(".."), resolved.parent.ino(), DentryKind::Directory),
        ];
        let entries = dots.into_iter().chain(children.into_iter().filter_map(
            |(name, handle)| {
                let kind = self.table.get(handle)?.kind();
                Some((name, handle.ino(), kind))
            },
        ));

        for (i, (name, ino, kind)) in (1..).zip(entries).skip_while(|(i, _)| *i <= offset) {
            let entry = DirEntry {
                name: &name,
                ino,
                kind,
            };
            if filler(entry, i) {
                break;
            }
        }
        Ok(())
    }

    #[instrument(name = "SlotFs::rmdir", skip(self))]
    fn rmdir(&self, path: &Path) -> Result<(), FsError> {
        let resolved = self.resolve_existing(path)?;
        if !resolved.dentry.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if resolved.handle == DentryHandle::ROOT {
            return Err(FsError::Busy);
        }
        let key = Self::key_of(&resolved, path)?;
        match self
            .index
            .remove_empty_dir(&key, resolved.handle, resolved.dentry.namespace_id)
        {
            Ok(()) => {}
            Err(RemoveDirError::NotEmpty) => return Err(FsError::NotEmpty),
            Err(RemoveDirError::Changed) => {
                warn!(%key, "directory changed before removal");
                return Err(FsError::IdentityMismatch);
            }
        }
        self.pool.deactivate(resolved.handle);
        self.table.remove(resolved.handle);
        self.touch(resolved.parent, SystemTime::now());
        debug!(%key, "directory removed");
        Ok(())
    }

    #[instrument(name = "SlotFs::rename", skip(self))]
    fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        let src = self.resolve_existing(from)?;
        if src.handle == DentryHandle::ROOT {
            return Err(FsError::Busy);
        }
        if resolve::components(from).eq(resolve::components(to)) {
            return Ok(());
        }
        let src_key = Self::key_of(&src, from)?;

        let (dest_key, dest_parent) = match self.resolve(to) {
            Ok(dest) if dest.dentry.is_dir() => {
                // Move into an existing directory, keeping the source name.
                if dest.handle == src.handle || (src.dentry.is_dir() && is_within(to, from)) {
                    return Err(FsError::InvalidArgument);
                }
                (
                    NamespaceKey::new(dest.dentry.namespace_id, src_key.name()),
                    dest.handle,
                )
            }
            Ok(_) => return Err(FsError::AlreadyExists),
            Err(ResolveError::MissFile {
                parent,
                parent_dentry,
            }) => {
                if src.dentry.is_dir() && is_within(to, from) {
                    return Err(FsError::InvalidArgument);
                }
                (
                    NamespaceKey::new(parent_dentry.namespace_id, leaf(to)?),
                    parent,
                )
            }
            Err(e) => return Err(e.into()),
        };
        if dest_key == src_key {
            // Moving an entry into the directory that already holds it.
            return Ok(());
        }

        match self.index.rekey(&src_key, dest_key.clone(), src.handle) {
            Ok(()) => {}
            Err(RekeyError::TargetExists(_)) => return Err(FsError::AlreadyExists),
            Err(RekeyError::SourceChanged) => {
                error!(%src_key, "source key changed between resolution and rename");
                return Err(FsError::IdentityMismatch);
            }
        }
        let now = SystemTime::now();
        self.table.update(src.handle, |d| d.ctime = now);
        self.touch(src.parent, now);
        self.touch(dest_parent, now);
        debug!(from = %src_key, to = %dest_key, "renamed");
        Ok(())
    }

    #[instrument(name = "SlotFs::unlink", skip(self))]
    fn unlink(&self, path: &Path) -> Result<(), FsError> {
        let resolved = self.resolve_existing(path)?;
        if resolved.dentry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        let key = Self::key_of(&resolved, path)?;
        if !self.index.remove_entry(&key, resolved.handle) {
            warn!(%key, "entry changed before unlink");
            return Err(FsError::IdentityMismatch);
        }
        self.pool.deactivate(resolved.handle);
        self.touch(resolved.parent, SystemTime::now());

        if resolved.dentry.is_symlink() {
            self.table.remove(resolved.handle);
        } else {
            self.recycle_slot(resolved.handle, resolved.dentry.slot_id);
        }
        debug!(%key, "unlinked");
        Ok(())
    }

    #[instrument(name = "SlotFs::symlink", skip(self))]
    fn symlink(&self, target: &Path, link: &Path) -> Result<Attr, FsError> {
        let placement = self.placement(link)?;
        let target = if target.has_root() {
            target.to_path_buf()
        } else {
            link.parent().unwrap_or(Path::new("/")).join(target)
        };
        let target_entry = self.resolve_existing(&target)?;
        if target_entry.dentry.is_dir() {
            return Err(FsError::IsADirectory);
        }

        let now = SystemTime::now();
        let handle = self.table.insert(Dentry {
            slot_id: target_entry.dentry.slot_id,
            namespace_id: target_entry.dentry.namespace_id,
            flags: DentryFlags::FILE | DentryFlags::SYMLINK,
            mode: MODE_LNK | 0o777,
            uid: self.config.uid,
            gid: self.config.gid,
            nlink: 1,
            size: target.as_os_str().len() as u64,
            ctime: now,
            mtime: now,
            atime: now,
        })
        .ok_or(FsError::NoFreeSlots)?;
        self.pool.activate(&self.table, handle);
        self.publish(placement.key, handle, |fs| {
            fs.table.remove(handle);
        })?;
        self.touch(placement.parent, now);
        debug!(slot_id = target_entry.dentry.slot_id, "symlink created");
        self.attr_of(handle)
    }

    #[instrument(name = "SlotFs::readlink", skip(self))]
    fn readlink(&self, path: &Path) -> Result<PathBuf, FsError> {
        let link = self.resolve_existing(path)?;
        if !link.dentry.is_symlink() {
            return Err(FsError::NotASymlink);
        }
        let slot_id = link.dentry.slot_id;

        let view = self.index.read();
        let mut dirs = HashMap::new();
        let mut target = None;
        for (key, handle) in view.iter() {
            let Some(dentry) = self.table.get(handle) else {
                continue;
            };
            match dentry.kind() {
                DentryKind::Directory => {
                    dirs.insert(
                        dentry.namespace_id,
                        (key.parent(), key.name().to_owned()),
                    );
                }
                DentryKind::File if dentry.slot_id == slot_id && target.is_none() => {
                    target = Some(key.clone());
                }
                DentryKind::File | DentryKind::Symlink => {}
            }
        }
        drop(view);

        let target = target.ok_or(FsError::BrokenLink)?;
        Self::absolute_path(&dirs, &target).ok_or_else(|| {
            warn!(%target, "symlink target has a dangling ancestor");
            FsError::BrokenLink
        })
    }

    #[instrument(name = "SlotFs::read", skip(self))]
    fn read(&self, fh: FileHandle, offset: u64, size: u32) -> Result<Bytes, FsError> {
        let (slot_id, _) = self.live_owner(fh)?;
        self.slots.read_at(slot_id, offset, size)
    }

    #[instrument(name = "SlotFs::write", skip(self, data), fields(len = data.len()))]
    fn write(&self, fh: FileHandle, offset: u64, data: &[u8]) -> Result<usize, FsError> {
        let (slot_id, owner) = self.live_owner(fh)?;
        let written = self.slots.write_at(slot_id, offset, data)?;
        let end = offset.saturating_add(written as u64);
        let now = SystemTime::now();
        self.table.update(owner, |d| {
            d.size = d.size.max(end);
            d.mtime = now;
            d.ctime = now;
        });
        Ok(written)
    }

    #[instrument(name = "SlotFs::release", skip(self))]
    fn release(&self, fh: FileHandle) -> Result<(), FsError> {
        let slot_id = SlotId::try_from(fh).map_err(|_| FsError::BadHandle)?;
        if !self.slots.contains(slot_id) {
            return Err(FsError::BadHandle);
        }
        Ok(())
    }

    #[instrument(name = "SlotFs::releasedir", skip(self))]
    fn releasedir(&self, fh: FileHandle) -> Result<(), FsError> {
        let handle = DentryHandle::from_ino(fh).ok_or(FsError::BadHandle)?;
        if !self.table.contains(handle) {
            return Err(FsError::BadHandle);
        }
        Ok(())
    }

    #[instrument(name = "SlotFs::utimens", skip(self))]
    fn utimens(
        &self,
        path: &Path,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> Result<Attr, FsError> {
        let resolved = self.resolve_existing(path)?;
        let now = SystemTime::now();
        self.table.update(resolved.handle, |d| {
            if let Some(atime) = atime {
                d.atime = atime;
            }
            if let Some(mtime) = mtime {
                d.mtime = mtime;
            }
            d.ctime = now;
        });
        self.attr_of(resolved.handle)
    }

    #[instrument(name = "SlotFs::truncate", skip(self))]
    fn truncate(&self, path: &Path, _size: u64) -> Result<Attr, FsError> {
        self.resolve_existing(path)?;
        Err(FsError::Unsupported)
    }

    #[instrument(name = "SlotFs::chmod", skip(self))]
    fn chmod(&self, path: &Path, mode: u32) -> Result<Attr, FsError> {
        let resolved = self.resolve_existing(path)?;
        let now = SystemTime::now();
        self.table.update(resolved.handle, |d| {
            d.mode = (d.mode & MODE_TYPE_MASK) | (mode & 0o7777);
            d.ctime = now;
        });
        self.attr_of(resolved.handle)
    }

    #[instrument(name = "SlotFs::chown", skip(self))]
    fn chown(&self, path: &Path, _uid: Option<u32>, _gid: Option<u32>) -> Result<Attr, FsError> {
        self.resolve_existing(path)?;
        Err(FsError::Unsupported)
    }

    #[instrument(name = "SlotFs::access", skip(self))]
    fn access(&self, path: &Path, mask: AccessMask) -> Result<(), FsError> {
        let resolved = self.resolve_existing(path)?;
        let owner_bits = (resolved.dentry.perm() >> 6) & 0o7;
        let wanted = mask.bits().cast_unsigned();
        if wanted & !owner_bits != 0 {
            return Err(FsError::PermissionDenied);
        }
        Ok(())
    }

    #[instrument(name = "SlotFs::statfs", skip(self))]
    fn statfs(&self) -> Result<FsStats, FsError> {
        Ok(FsStats {
            block_size: BLOCK_SIZE,
            total_slots: self.slots.len() as u64,
            free_slots: self.pool.free_slots() as u64,
            active_entries: self.pool.active_len() as u64,
            max_filename_length: MAX_NAME_LEN,
        })
    }

    #[instrument(name = "SlotFs::destroy", skip(self))]
    fn destroy(&self) {
        let (unused, active) = self.pool.drain();
        self.index.clear();
        let closed = self.slots.close_all();
        self.table.clear();
        info!(
            unused = unused.len(),
            active = active.len(),
            closed,
            "unmounted"
        );
    }
}
