use std::sync::Arc;

use tokio::select;

use slotfs::fs::{FsOps as _, SlotFs};
use tracing::{debug, info, warn};

use crate::app_config;

mod managed_fuse {
    //! fuser only does a regular unmount when the `BackgroundSession` is dropped. `ManagedFuse`
    //! forces a lazy unmount on drop so a busy mount point never outlives the daemon.
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use nix::errno::Errno;

    use super::{SlotFs, debug};
    use fuser::BackgroundSession;
    use slotfs::fs::fuser::FuserAdapter;
    use tracing::error;

    pub struct FuseCoreScope {
        _session: BackgroundSession,
    }

    impl FuseCoreScope {
        fn spawn(fs: Arc<SlotFs>, mount_point: &Path) -> Result<Self, std::io::Error> {
            let adapter = FuserAdapter::new(fs);
            let mount_opts = [
                fuser::MountOption::FSName("slotfs".to_owned()),
                fuser::MountOption::RW,
                fuser::MountOption::NoDev,
                fuser::MountOption::NoSuid,
                fuser::MountOption::AutoUnmount,
                fuser::MountOption::DefaultPermissions,
                fuser::MountOption::AllowOther,
            ];

            Ok(Self {
                _session: fuser::spawn_mount2(adapter, mount_point, &mount_opts)?,
            })
        }
    }

    pub struct ManagedFuse {
        mount_point: PathBuf,
    }

    impl ManagedFuse {
        pub fn new(mount_point: PathBuf) -> Self {
            Self { mount_point }
        }

        pub fn spawn(&self, fs: Arc<SlotFs>) -> Result<FuseCoreScope, std::io::Error> {
            FuseCoreScope::spawn(fs, &self.mount_point)
        }
    }

    impl Drop for ManagedFuse {
        fn drop(&mut self) {
            const UMOUNT_ATTEMPT_COUNT: usize = 10;
            const UMOUNT_ATTEMPT_DELAY: Duration = Duration::from_millis(10);

            debug!(mount_point = ?self.mount_point, "Confirming unmount of FUSE filesystem...");

            for i in 0..UMOUNT_ATTEMPT_COUNT {
                let result = {
                    #[cfg(target_os = "macos")]
                    {
                        nix::mount::unmount(&self.mount_point, nix::mount::MntFlags::MNT_FORCE)
                    }

                    #[cfg(target_os = "linux")]
                    {
                        nix::mount::umount2(&self.mount_point, nix::mount::MntFlags::MNT_DETACH)
                    }
                };

                match result {
                    Ok(()) => {
                        debug!(attempt = i + 1, "Unmounted FUSE filesystem.");
                        break;
                    }
                    Err(Errno::EBUSY) => {
                        debug!(attempt = i + 1, "FUSE filesystem still busy, retrying...");
                        std::thread::sleep(UMOUNT_ATTEMPT_DELAY);
                    }
                    Err(Errno::EINVAL | Errno::ENOENT) => {
                        debug!(attempt = i + 1, "FUSE filesystem already unmounted.");
                        break;
                    }
                    Err(e) => {
                        error!(attempt = i + 1, error = %e, "Failed to unmount FUSE filesystem.");
                        break;
                    }
                }
            }
        }
    }
}

/// Prepares a directory the daemon needs.
///
/// - If the directory exists and is non-empty and `must_be_empty` is set, returns an error.
/// - If the directory does not exist, creates it (including parents) and logs an info message.
async fn prepare_dir(dir: &std::path::Path, must_be_empty: bool) -> Result<(), std::io::Error> {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => {
            if must_be_empty && entries.next_entry().await?.is_some() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("'{}' already exists and is not empty.", dir.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(dir).await?;
            info!(path = %dir.display(), "Created directory.");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Every seeded slot stays open for the life of the mount; make sure the descriptor limit can
/// hold them.
fn raise_fd_limit(wanted: u64) {
    use nix::sys::resource::{Resource, getrlimit, setrlimit};

    match getrlimit(Resource::RLIMIT_NOFILE) {
        Ok((soft, hard)) if soft < wanted => {
            let target = wanted.min(hard);
            if let Err(e) = setrlimit(Resource::RLIMIT_NOFILE, target, hard) {
                warn!(error = %e, soft, hard, "Failed to raise the open file limit.");
            } else {
                debug!(from = soft, to = target, "Raised the open file limit.");
            }
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to read the open file limit."),
    }
}

async fn wait_for_exit() -> Result<(), std::io::Error> {
    use tokio::signal;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut sighup = signal::unix::signal(signal::unix::SignalKind::hangup())?;
    select! {
        _ = signal::ctrl_c() => {
            debug!("Received Ctrl+C signal, shutting down...");
        },
        _ = sigterm.recv() => {
            debug!("Received termination signal, shutting down...");
        },
        _ = sighup.recv() => {
            debug!("Received hangup signal, shutting down...");
        },
    }
    Ok(())
}

/// Main entry point for the daemon.
pub async fn run(config: app_config::Config) -> Result<(), std::io::Error> {
    prepare_dir(&config.storage.backing_root, false).await?;
    prepare_dir(&config.mount_point, true).await?;

    let mount_config = config.mount_config();
    let headroom = u64::from(mount_config.slot_ceiling) + 256;
    raise_fd_limit(headroom);

    let fs = Arc::new(SlotFs::mount(mount_config).map_err(std::io::Error::other)?);

    info!("Mounting filesystem at {}.", config.mount_point.display());
    let fuse = managed_fuse::ManagedFuse::new(config.mount_point);
    {
        let _session = fuse.spawn(Arc::clone(&fs))?;
        info!("slotfs is running. Press Ctrl+C to stop.");

        wait_for_exit().await?;
    }
    drop(fuse);
    fs.destroy();
    Ok(())
}

pub fn spawn(config: app_config::Config) -> Result<(), std::io::Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}
