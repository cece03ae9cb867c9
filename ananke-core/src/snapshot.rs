//! Latest instructor launch per user.
//!
//! Kore has no launch of its own; it resolves a user's current course from
//! the claims of their most recent instructor launch.

use std::io;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{CoreError, Result};
use crate::fs::{OWNER_ONLY, write_atomic};
use crate::layout::Layout;
use crate::lti::LaunchClaims;

/// Latest launch claims per user, one JSON file each.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    layout: Layout,
}

impl SnapshotStore {
    /// Store writing below `layout.runtime_dir`.
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    fn path(&self, user: &str) -> Result<PathBuf> {
        if user.is_empty()
            || user.contains(['/', '\\', '\0'])
            || user.starts_with('.')
        {
            return Err(CoreError::InvalidContent(format!(
                "`{user}` is not a usable user name"
            )));
        }
        Ok(self.layout.snapshot_path(user))
    }

    /// Replaces the snapshot of `user`, readable by the owner only.
    pub fn store(&self, user: &str, claims: &LaunchClaims) -> Result<()> {
        let path = self.path(user)?;
        let body = serde_json::to_vec_pretty(claims)?;
        write_atomic(&path, &body, Some(OWNER_ONLY))?;
        debug!(user, path = %path.display(), "launch snapshot written");
        Ok(())
    }

    /// Loads the snapshot; a missing one is [`CoreError::NotFound`].
    pub fn load(&self, user: &str) -> Result<LaunchClaims> {
        let path = self.path(user)?;
        let bytes = std::fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => CoreError::NotFound(format!(
                "no launch recorded for {user}"
            )),
            _ => CoreError::Io(err),
        })?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|err| CoreError::InvalidContent(err.to_string()))?;
        LaunchClaims::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_is_private_and_reloadable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::rooted_at(dir.path());
        let store = SnapshotStore::new(layout.clone());
        let claims = LaunchClaims::from_value(json!({ "sub": "42" })).unwrap();

        store.store("alice", &claims).unwrap();

        assert_eq!(store.load("alice").unwrap(), claims);
        let mode = std::fs::metadata(layout.snapshot_path("alice"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(Layout::rooted_at(dir.path()));
        assert!(matches!(store.load("bob"), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn path_like_user_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(Layout::rooted_at(dir.path()));
        assert!(matches!(
            store.load("../etc/passwd"),
            Err(CoreError::InvalidContent(_))
        ));
    }
}
