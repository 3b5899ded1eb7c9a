#![allow(dead_code, missing_docs, clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use slotfs::fs::config::{GrowthConfig, MountConfig};
use slotfs::fs::{FsError, FsOps as _, OpenFile, SlotFs};
use tempfile::TempDir;

/// A mounted engine together with the temporary backing root it owns.
///
/// The backing root is removed when this is dropped, after the engine has closed its slots.
pub struct Mounted {
    pub fs: SlotFs,
    backing: TempDir,
}

impl Mounted {
    pub fn backing_root(&self) -> &Path {
        self.backing.path()
    }
}

impl Drop for Mounted {
    fn drop(&mut self) {
        self.fs.destroy();
    }
}

/// Small two-level slot tree: sixteen slots per generation.
pub fn small_config(backing: &Path, slot_ceiling: u32, growth: Option<u32>) -> MountConfig {
    MountConfig {
        fanout: 4,
        depth: 2,
        slot_ceiling,
        growth: GrowthConfig {
            enabled: growth.is_some(),
            batch: growth.unwrap_or(1),
        },
        ..MountConfig::with_backing_root(backing)
    }
}

/// Mount with `slot_ceiling` initial slots. `growth` is the top-up batch, `None` disables growth.
pub fn mount(slot_ceiling: u32, growth: Option<u32>) -> Mounted {
    let backing = tempfile::tempdir().expect("create backing root");
    let fs = SlotFs::mount(small_config(backing.path(), slot_ceiling, growth))
        .expect("mount slotfs");
    Mounted { fs, backing }
}

pub fn free_slots(fs: &SlotFs) -> u64 {
    fs.statfs().expect("statfs").free_slots
}

pub fn create(fs: &SlotFs, path: &str) -> OpenFile {
    fs.create(Path::new(path), 0o644)
        .unwrap_or_else(|e| panic!("create {path}: {e}"))
}

pub fn mkdir(fs: &SlotFs, path: &str) {
    fs.mkdir(Path::new(path), 0o755)
        .unwrap_or_else(|e| panic!("mkdir {path}: {e}"));
}

pub fn children(fs: &SlotFs, path: &str) -> Vec<String> {
    fs.list_children(Path::new(path))
        .unwrap_or_else(|e| panic!("list {path}: {e}"))
        .into_iter()
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

pub fn errno<T: std::fmt::Debug>(res: Result<T, FsError>) -> i32 {
    i32::from(res.expect_err("operation should fail"))
}
