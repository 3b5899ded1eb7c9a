use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fs::seeder::SeedLayout;

fn default_backing_root() -> PathBuf {
    dirs::data_local_dir().map_or_else(
        || PathBuf::from("/tmp/slotfs/backing"),
        |d| d.join("slotfs").join("backing"),
    )
}

const fn default_fanout() -> u32 {
    128
}

const fn default_depth() -> u32 {
    3
}

const fn default_slot_ceiling() -> u32 {
    1000
}

const fn default_growth_batch() -> u32 {
    256
}

const fn default_true() -> bool {
    true
}

fn current_uid() -> u32 {
    nix::unistd::Uid::current().as_raw()
}

fn current_gid() -> u32 {
    nix::unistd::Gid::current().as_raw()
}

/// On-demand pool growth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GrowthConfig {
    /// Seed a new generation of slots when the pool runs dry. When disabled, exhaustion is a hard
    /// error.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Slots seeded per top-up.
    #[serde(default = "default_growth_batch")]
    pub batch: u32,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch: default_growth_batch(),
        }
    }
}

/// Everything the engine needs to mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MountConfig {
    /// Directory holding the pre-allocated slot tree.
    #[serde(default = "default_backing_root")]
    pub backing_root: PathBuf,

    /// Branching factor of every level of the slot tree.
    #[serde(default = "default_fanout")]
    pub fanout: u32,

    /// Levels in the slot tree, leaf level included.
    #[serde(default = "default_depth")]
    pub depth: u32,

    /// Slots seeded at mount.
    #[serde(default = "default_slot_ceiling")]
    pub slot_ceiling: u32,

    /// Pool growth policy.
    #[serde(default)]
    pub growth: GrowthConfig,

    /// Owner of the root directory and of every new entry.
    #[serde(skip, default = "current_uid")]
    pub uid: u32,

    /// Group of the root directory and of every new entry.
    #[serde(skip, default = "current_gid")]
    pub gid: u32,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            backing_root: default_backing_root(),
            fanout: default_fanout(),
            depth: default_depth(),
            slot_ceiling: default_slot_ceiling(),
            growth: GrowthConfig::default(),
            uid: current_uid(),
            gid: current_gid(),
        }
    }
}

impl MountConfig {
    /// A configuration rooted at `backing_root`, every other knob at its default.
    #[must_use]
    pub fn with_backing_root(backing_root: impl Into<PathBuf>) -> Self {
        Self {
            backing_root: backing_root.into(),
            ..Self::default()
        }
    }

    /// Shape of one generation of the slot tree.
    #[must_use]
    pub fn layout(&self) -> SeedLayout {
        SeedLayout {
            fanout: self.fanout,
            depth: self.depth,
        }
    }

    /// Validate the correctness of the configuration.
    ///
    /// Returns every problem found rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.fanout < 2 {
            errors.push(format!("fanout must be at least 2, got {}.", self.fanout));
        }
        if self.depth == 0 {
            errors.push("depth must be at least 1.".to_owned());
        }
        if self.fanout >= 2 && self.depth > 0 && self.layout().capacity().is_none() {
            errors.push(format!(
                "a slot tree of fanout {} and depth {} is too large.",
                self.fanout, self.depth
            ));
        }
        if self.growth.enabled && self.growth.batch == 0 {
            errors.push("growth.batch must be positive when growth is enabled.".to_owned());
        }
        if self.backing_root.as_os_str().is_empty() {
            errors.push("backing-root must not be empty.".to_owned());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
