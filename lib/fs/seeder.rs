//! Pre-creation of backing slots.
//!
//! Slots live under `<backing-root>/pre_alloc/<generation>/`, one fan-out tree per generation.
//! With fanout `f` and depth `d`, leaf `i` sits at the path spelled by the `d` base-`f` digits
//! of `i`: the first `d - 1` digits name directories and the last one names the file.
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::sync::{Mutex, unpoison};

/// Name of the directory under the backing root that holds every generation.
pub const ALLOCATED_DIR: &str = "pre_alloc";

const SLOT_MODE: u32 = 0o644;

/// Shape of one generation of the slot tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedLayout {
    /// Children per directory.
    pub fanout: u32,
    /// Levels, the leaf level included.
    pub depth: u32,
}

impl SeedLayout {
    /// Number of leaves in a full generation, or `None` if it does not fit in a `u64`.
    #[must_use]
    pub fn capacity(&self) -> Option<u64> {
        u64::from(self.fanout).checked_pow(self.depth)
    }

    /// Relative path of leaf `index` inside a generation directory.
    #[must_use]
    pub fn leaf_path(&self, index: u64) -> PathBuf {
        let fanout = u64::from(self.fanout.max(2));
        let mut digits = Vec::with_capacity(self.depth as usize);
        let mut rest = index;
        for _ in 0..self.depth {
            digits.push(rest % fanout);
            rest /= fanout;
        }
        digits.iter().rev().map(u64::to_string).collect()
    }
}

/// A freshly created and opened backing file.
#[derive(Debug)]
pub struct SeededSlot {
    /// The open file, read-write.
    pub file: File,
    /// Where it lives.
    pub path: PathBuf,
}

/// Builds generations of pre-opened backing files.
pub struct Seeder {
    root: PathBuf,
    layout: SeedLayout,
    generation: Mutex<u32>,
}

impl Seeder {
    /// A seeder writing under `<backing_root>/pre_alloc`.
    #[must_use]
    pub fn new(backing_root: &Path, layout: SeedLayout) -> Self {
        Self {
            root: backing_root.join(ALLOCATED_DIR),
            layout,
            generation: Mutex::new(0),
        }
    }

    /// Directory holding every generation.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Empty the allocation directory, creating it if needed. Previous generations are not a
    /// stable format and are discarded.
    #[instrument(name = "Seeder::prepare", skip(self), fields(root = %self.root.display()))]
    pub fn prepare(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        crate::io::remove_dir_contents(&self.root)?;
        *unpoison(self.generation.lock()) = 0;
        Ok(())
    }

    /// Seed up to `count` slots in a new generation.
    ///
    /// Requests beyond the capacity of one generation are capped. Concurrent calls are
    /// serialized and each produces its own generation.
    #[instrument(name = "Seeder::seed", skip(self))]
    pub fn seed(&self, count: u32) -> io::Result<Vec<SeededSlot>> {
        let mut generation = unpoison(self.generation.lock());
        let capacity = self.layout.capacity().unwrap_or(u64::MAX);
        let count = if u64::from(count) > capacity {
            warn!(count, capacity, "requested slots exceed one generation, capping");
            capacity
        } else {
            u64::from(count)
        };

        let gen_dir = self.root.join(generation.to_string());
        std::fs::create_dir_all(&gen_dir)?;

        let mut slots = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
        let mut last_parent: Option<PathBuf> = None;
        for index in 0..count {
            let path = gen_dir.join(self.layout.leaf_path(index));
            if let Some(parent) = path.parent()
                && last_parent.as_deref() != Some(parent)
            {
                std::fs::create_dir_all(parent)?;
                last_parent = Some(parent.to_path_buf());
            }
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .mode(SLOT_MODE)
                .open(&path)?;
            slots.push(SeededSlot { file, path });
        }

        info!(
            generation = *generation,
            seeded = slots.len(),
            "seeded backing slots"
        );
        *generation += 1;
        debug!(next_generation = *generation, "generation advanced");
        Ok(slots)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn leaf_paths_spell_base_fanout_digits() {
        let layout = SeedLayout {
            fanout: 4,
            depth: 3,
        };
        assert_eq!(layout.capacity(), Some(64));
        assert_eq!(layout.leaf_path(0), PathBuf::from("0/0/0"));
        assert_eq!(layout.leaf_path(6), PathBuf::from("0/1/2"));
        assert_eq!(layout.leaf_path(63), PathBuf::from("3/3/3"));
    }

    #[test]
    fn seeds_distinct_files_and_caps_to_capacity() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let seeder = Seeder::new(
            dir.path(),
            SeedLayout {
                fanout: 2,
                depth: 2,
            },
        );
        seeder.prepare().unwrap_or_else(|e| panic!("{e}"));

        let first = seeder.seed(10).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(|s| s.path.is_file()));
        assert!(dir.path().join("pre_alloc/0/1/1").is_file());

        let second = seeder.seed(1).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(second.len(), 1);
        assert!(dir.path().join("pre_alloc/1/0/0").is_file());

        seeder.prepare().unwrap_or_else(|e| panic!("{e}"));
        assert!(!dir.path().join("pre_alloc/0").exists());
    }
}
