//! Instructors whose per-user extensions were already activated.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::fs::{FileLock, OWNER_ONLY, write_atomic};

/// JSON array of account names, guarded by its sidecar lock.
#[derive(Debug, Clone)]
pub struct InstructorRegistry {
    path: PathBuf,
}

impl InstructorRegistry {
    /// Registry backed by the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded instructors; a missing or blank file is empty.
    pub fn members(&self) -> Result<Vec<String>> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(CoreError::Io(err)),
        }
    }

    /// True when `user` was already activated.
    pub fn contains(&self, user: &str) -> Result<bool> {
        Ok(self.members()?.iter().any(|m| m == user))
    }

    /// Runs `activate` for `user` unless they are already recorded.
    ///
    /// Check, activation and persist happen under one exclusive lock, so
    /// concurrent logins of the same instructor activate once. A failed
    /// activation is not recorded and runs again on the next login.
    /// Returns `true` when the activation ran and was recorded.
    pub async fn activate_once<F, Fut, E>(
        &self,
        user: &str,
        activate: F,
    ) -> Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        CoreError: From<E>,
    {
        let _lock = FileLock::acquire(&self.path).await?;
        let mut members = self.members()?;
        if members.iter().any(|m| m == user) {
            debug!(user, "instructor already activated");
            return Ok(false);
        }

        activate().await?;

        members.push(user.to_string());
        let body = serde_json::to_vec_pretty(&members)?;
        write_atomic(&self.path, &body, Some(OWNER_ONLY))?;
        info!(user, "instructor activation recorded");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn activation_runs_once_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let registry = InstructorRegistry::new(dir.path().join("instructors.json"));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let runs = Arc::clone(&runs);
            registry
                .activate_once("alice", || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), CoreError>(())
                })
                .await
                .unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(registry.members().unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn concurrent_logins_activate_once() {
        let dir = tempfile::tempdir().unwrap();
        let registry = InstructorRegistry::new(dir.path().join("instructors.json"));
        let runs = Arc::new(AtomicUsize::new(0));

        let attempts = (0..4).map(|_| {
            let registry = registry.clone();
            let runs = Arc::clone(&runs);
            tokio::spawn(async move {
                registry
                    .activate_once("bob", || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok::<(), CoreError>(())
                    })
                    .await
                    .unwrap()
            })
        });
        for attempt in attempts.collect::<Vec<_>>() {
            attempt.await.unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_activation_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let registry = InstructorRegistry::new(dir.path().join("instructors.json"));

        let result = registry
            .activate_once("carol", || async {
                Err::<(), CoreError>(CoreError::Internal("unit failed".into()))
            })
            .await;

        assert!(result.is_err());
        assert!(!registry.contains("carol").unwrap());
    }

    #[tokio::test]
    async fn registry_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let registry = InstructorRegistry::new(dir.path().join("instructors.json"));
        registry
            .activate_once("dave", || async { Ok::<(), CoreError>(()) })
            .await
            .unwrap();

        let mode = std::fs::metadata(registry.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
