use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::fs::{FileLock, write_atomic};
use crate::registry::{Registry, RegistryError, decode, encode};

/// File-backed registry.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

/// Result of a locked read-modify-write cycle.
#[derive(Debug)]
pub struct RegistryUpdate<T> {
    /// Whatever the mutation returned.
    pub value: T,
    /// The registry changed and the new content reached the disk.
    pub committed: bool,
}

impl RegistryStore {
    /// Store for the registry file at `path`; nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the registry; a missing file is an empty registry.
    pub fn read(&self) -> Result<Registry, RegistryError> {
        match std::fs::read_to_string(&self.path) {
            Ok(source) => decode(&source),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Ok(Registry::default())
            }
            Err(source) => Err(RegistryError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Validates and atomically replaces the registry file.
    pub fn write(&self, registry: &Registry) -> Result<(), RegistryError> {
        registry.validate()?;
        let text = encode(registry)?;
        write_atomic(&self.path, text.as_bytes(), None).map_err(|source| {
            RegistryError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        info!(
            path = %self.path.display(),
            services = registry.services.len(),
            roles = registry.roles.len(),
            groups = registry.groups.len(),
            "registry written"
        );
        Ok(())
    }

    /// Takes the registry lock until the guard drops.
    /// Callers that read and write separately hold it across both.
    pub async fn lock(&self) -> Result<FileLock, RegistryError> {
        Ok(FileLock::acquire(&self.path).await?)
    }

    /// Runs `mutate` on the current registry under the registry lock and
    /// writes the result back when it differs from what was read.
    pub async fn update<T, F>(
        &self,
        mutate: F,
    ) -> Result<RegistryUpdate<T>, RegistryError>
    where
        F: FnOnce(&mut Registry) -> Result<T, RegistryError>,
    {
        let _lock = self.lock().await?;
        let current = self.read()?;
        let mut next = current.clone();
        let value = mutate(&mut next)?;

        if next == current {
            debug!(path = %self.path.display(), "registry unchanged");
            return Ok(RegistryUpdate {
                value,
                committed: false,
            });
        }

        self.write(&next)?;
        Ok(RegistryUpdate {
            value,
            committed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> RegistryStore {
        RegistryStore::new(dir.join("40_courses.py"))
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(dir.path()).read().unwrap(), Registry::default());
    }

    #[tokio::test]
    async fn update_commits_only_real_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let first = store
            .update(|r| Ok(r.add_group_member("formgrade-c-1", "alice")))
            .await
            .unwrap();
        assert!(first.value);
        assert!(first.committed);

        let second = store
            .update(|r| Ok(r.add_group_member("formgrade-c-1", "alice")))
            .await
            .unwrap();
        assert!(!second.committed);

        assert!(store.read().unwrap().is_member("formgrade-c-1", "alice"));
    }

    #[test]
    fn leftover_temp_file_does_not_affect_reads() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let mut registry = Registry::default();
        registry.add_group_member("formgrade-c-1", "alice");
        store.write(&registry).unwrap();

        // a writer that died before renaming leaves only its temp file
        std::fs::write(dir.path().join(".tmpAbC123"), "services = json.lo")
            .unwrap();

        assert_eq!(store.read().unwrap(), registry);
    }

    #[test]
    fn unwritable_target_is_a_write_error_and_keeps_old_content() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let store = RegistryStore::new(blocker.join("40_courses.py"));

        let err = store.write(&Registry::default()).unwrap_err();
        assert!(err.is_write_failure());
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "x");
    }

    #[tokio::test]
    async fn failed_mutation_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let result = store
            .update(|r| -> Result<(), RegistryError> {
                r.add_group_member("g", "u");
                Err(RegistryError::Invariant("boom".into()))
            })
            .await;

        assert!(result.is_err());
        assert!(!store.path().exists());
    }
}
