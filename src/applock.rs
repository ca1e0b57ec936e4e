//! Advisory-exclusive instance lock guaranteeing a single running daemon.

use crate::error::{AlreadyLockedSnafu, CreateLockDirSnafu, LockError, OpenLockSnafu};
use nix::fcntl::{flock, FlockArg};
use snafu::ResultExt;
use std::fs::{self, File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

/// Holds the lock file handle for the process lifetime. The advisory lock is
/// released automatically when the handle is closed (on `Drop`, or process
/// exit).
pub struct InstanceLock {
    _file: File,
}

impl InstanceLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(CreateLockDirSnafu {
                path: parent.to_path_buf(),
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .context(OpenLockSnafu { path: path.clone() })?;

        flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock)
            .map_err(|_| AlreadyLockedSnafu { path: path.clone() }.build())?;

        Ok(InstanceLock { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquires_lock_on_fresh_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run").join("daemon.lock");
        let lock = InstanceLock::acquire(&path);
        assert!(lock.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn second_acquire_in_same_process_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.lock");
        let _first = InstanceLock::acquire(&path).unwrap();
        let second = InstanceLock::acquire(&path);
        assert!(second.is_err());
    }
}
