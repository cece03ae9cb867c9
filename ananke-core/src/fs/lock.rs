use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

/// Lock file failures.
#[derive(Debug, Error)]
pub enum LockError {
    /// The sidecar could not be created or opened.
    #[error("failed to open lock file {path}: {source}")]
    Open {
        /// Sidecar lock file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// `flock` failed.
    #[error("failed to acquire lock {path}: {source}")]
    Acquire {
        /// Sidecar lock file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The blocking task acquiring the lock panicked or was cancelled.
    #[error("lock task for {0} did not complete")]
    Join(PathBuf),
}

/// Exclusive advisory lock on the sidecar `<file>.lock` of a shared file.
///
/// The data file itself is replaced by rename on every write, so locking it
/// directly would hand later lockers a different inode. The sidecar never
/// moves. The lock is released when the guard is dropped.
pub struct FileLock {
    _file: File,
    lock_path: PathBuf,
}

impl FileLock {
    /// Sidecar path for `target`: `<file>.lock` next to it.
    pub fn lock_path_for(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        target.with_file_name(name)
    }

    /// Blocks until the lock on `target` is held.
    pub fn acquire_blocking(target: &Path) -> Result<Self, LockError> {
        let lock_path = Self::lock_path_for(target);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LockError::Open {
                path: lock_path.clone(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| LockError::Open {
                path: lock_path.clone(),
                source,
            })?;

        FileExt::lock_exclusive(&file).map_err(|source| {
            LockError::Acquire {
                path: lock_path.clone(),
                source,
            }
        })?;
        debug!(lock = %lock_path.display(), "acquired file lock");

        Ok(Self {
            _file: file,
            lock_path,
        })
    }

    /// Acquires the lock on the blocking pool so the runtime keeps going
    /// while another process holds it.
    pub async fn acquire(target: &Path) -> Result<Self, LockError> {
        let target = target.to_path_buf();
        let lock_path = Self::lock_path_for(&target);
        tokio::task::spawn_blocking(move || Self::acquire_blocking(&target))
            .await
            .map_err(|_| LockError::Join(lock_path))?
    }

    /// Sidecar file this guard holds.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // closing the descriptor releases the flock
        debug!(lock = %self.lock_path.display(), "released file lock");
    }
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn sidecar_sits_next_to_target() {
        assert_eq!(
            FileLock::lock_path_for(Path::new("/etc/hub/40_courses.py")),
            PathBuf::from("/etc/hub/40_courses.py.lock")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_locker_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("registry.py");

        let first = FileLock::acquire(&target).await.unwrap();
        let released = Arc::new(AtomicBool::new(false));

        let waiter = {
            let target = target.clone();
            let released = Arc::clone(&released);
            tokio::spawn(async move {
                let _second = FileLock::acquire(&target).await.unwrap();
                released.load(Ordering::SeqCst)
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        released.store(true, Ordering::SeqCst);
        drop(first);

        assert!(waiter.await.unwrap(), "second lock granted before release");
    }
}
