use std::fs::File;
use std::os::fd::AsRawFd as _;
use std::os::unix::fs::FileExt as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use crate::fs::{DentryHandle, FsError, SlotId};

/// One pre-opened backing file.
#[derive(Debug)]
pub struct BackingSlot {
    file: File,
    path: PathBuf,
    owner: DentryHandle,
}

impl BackingSlot {
    /// Location of the file inside the backing root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file dentry this slot was seeded with.
    #[must_use]
    pub fn owner(&self) -> DentryHandle {
        self.owner
    }
}

/// The slot id of an open backing file: its raw descriptor.
#[must_use]
#[expect(
    clippy::cast_sign_loss,
    reason = "an open descriptor is never negative"
)]
pub fn slot_id_of(file: &File) -> SlotId {
    file.as_raw_fd() as SlotId
}

/// Every backing file the mount holds open, keyed by [`SlotId`].
#[derive(Default)]
pub struct SlotTable {
    slots: scc::HashMap<SlotId, Arc<BackingSlot>>,
}

impl SlotTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an opened backing file. Returns its slot id.
    pub fn register(&self, file: File, path: PathBuf, owner: DentryHandle) -> SlotId {
        let id = slot_id_of(&file);
        let slot = Arc::new(BackingSlot { file, path, owner });
        if let Err((id, _)) = self.slots.insert_sync(id, slot) {
            // Descriptors are unique while open, so this only fires if a slot was closed behind
            // our back and its number reused.
            warn!(slot_id = id, "slot id already registered");
        }
        id
    }

    /// Look up a slot.
    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<Arc<BackingSlot>> {
        self.slots.read_sync(&id, |_, slot| Arc::clone(slot))
    }

    /// The dentry a slot was seeded with.
    #[must_use]
    pub fn owner(&self, id: SlotId) -> Option<DentryHandle> {
        self.slots.read_sync(&id, |_, slot| slot.owner)
    }

    /// Whether `id` addresses an open slot.
    #[must_use]
    pub fn contains(&self, id: SlotId) -> bool {
        self.slots.contains_sync(&id)
    }

    fn slot(&self, id: SlotId) -> Result<Arc<BackingSlot>, FsError> {
        self.get(id).ok_or(FsError::BadHandle)
    }

    /// Read up to `size` bytes at `offset`. A short result means end of file.
    pub fn read_at(&self, id: SlotId, offset: u64, size: u32) -> Result<Bytes, FsError> {
        let slot = self.slot(id)?;
        let mut buf = vec![0u8; size as usize];
        let mut filled = 0;
        while filled < buf.len() {
            match slot.file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(filled);
        Ok(Bytes::from(buf))
    }

    /// Write all of `data` at `offset`. Returns the number of bytes written.
    pub fn write_at(&self, id: SlotId, offset: u64, data: &[u8]) -> Result<usize, FsError> {
        let slot = self.slot(id)?;
        slot.file.write_all_at(data, offset)?;
        Ok(data.len())
    }

    /// Drop every byte of a slot's content.
    pub fn truncate(&self, id: SlotId) -> Result<(), FsError> {
        let slot = self.slot(id)?;
        slot.file.set_len(0)?;
        Ok(())
    }

    /// Number of open slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Close every slot. Returns how many were open.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        self.slots.retain_sync(|_, _| {
            closed += 1;
            false
        });
        closed
    }
}
