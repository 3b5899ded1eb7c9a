use thiserror::Error;

use crate::fs::resolve::ResolveError;

/// Every failure an operation can report to the dispatch layer.
#[derive(Debug, Error)]
pub enum FsError {
    /// No entry at the requested path, or an ancestor is missing.
    #[error("no such file or directory")]
    NotFound,

    /// A path component that must be a directory is a file or symlink.
    #[error("not a directory")]
    NotADirectory,

    /// A file operation was attempted on a directory.
    #[error("is a directory")]
    IsADirectory,

    /// The target path already exists.
    #[error("file exists")]
    AlreadyExists,

    /// The pool is empty and could not be topped up.
    #[error("no free slots")]
    NoFreeSlots,

    /// `rmdir` on a directory that still has children.
    #[error("directory not empty")]
    NotEmpty,

    /// The namespace changed between resolution and mutation.
    #[error("namespace changed underneath the operation")]
    IdentityMismatch,

    /// `readlink` on something that is not a symlink.
    #[error("not a symlink")]
    NotASymlink,

    /// A symlink whose target slot is no longer named anywhere.
    #[error("broken symlink")]
    BrokenLink,

    /// The handle does not address an open slot.
    #[error("bad file handle")]
    BadHandle,

    /// The operation is intentionally not implemented.
    #[error("operation not implemented")]
    Unsupported,

    /// The arguments make no sense for this operation.
    #[error("invalid argument")]
    InvalidArgument,

    /// The target is in use and cannot be removed.
    #[error("resource busy")]
    Busy,

    /// The requested access is not permitted by the entry's mode.
    #[error("permission denied")]
    PermissionDenied,

    /// A backing-store call failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<&FsError> for i32 {
    fn from(e: &FsError) -> Self {
        match e {
            FsError::NotFound | FsError::BrokenLink => libc::ENOENT,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NoFreeSlots => libc::ENFILE,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::IdentityMismatch => libc::ESTALE,
            FsError::NotASymlink | FsError::InvalidArgument => libc::EINVAL,
            FsError::BadHandle => libc::EBADF,
            FsError::Unsupported => libc::ENOSYS,
            FsError::Busy => libc::EBUSY,
            FsError::PermissionDenied => libc::EACCES,
            FsError::Io(io_err) => io_err.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

impl From<FsError> for i32 {
    fn from(e: FsError) -> Self {
        Self::from(&e)
    }
}

impl From<ResolveError> for FsError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotADirectory => Self::NotADirectory,
            ResolveError::MissDirectory | ResolveError::MissFile { .. } => Self::NotFound,
        }
    }
}

impl FsError {
    /// The negative status code handed back to the dispatch layer.
    #[must_use]
    pub fn status(&self) -> i32 {
        -i32::from(self)
    }
}

/// Collapse an operation result into a status code: `0` on success, a negative errno otherwise.
pub fn status_of<T>(res: &Result<T, FsError>) -> i32 {
    match res {
        Ok(_) => 0,
        Err(e) => e.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_are_negative_errnos() {
        assert_eq!(FsError::NotFound.status(), -libc::ENOENT);
        assert_eq!(FsError::NoFreeSlots.status(), -libc::ENFILE);
        assert_eq!(FsError::Unsupported.status(), -libc::ENOSYS);
        assert_eq!(status_of::<()>(&Ok(())), 0);
        assert_eq!(status_of::<()>(&Err(FsError::NotEmpty)), -libc::ENOTEMPTY);
    }

    #[test]
    fn io_errors_keep_their_errno() {
        let e = FsError::from(std::io::Error::from_raw_os_error(libc::ENOSPC));
        assert_eq!(i32::from(&e), libc::ENOSPC);
        let e = FsError::from(std::io::Error::other("opaque"));
        assert_eq!(i32::from(e), libc::EIO);
    }
}
