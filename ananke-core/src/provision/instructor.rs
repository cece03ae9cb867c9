use std::os::unix::fs::MetadataExt;
use std::path::Path;

use tracing::{debug, info};

use crate::os::ops;
use crate::provision::{ProvisionError, Provisioner};

const COURSE_LIST_SERVER_EXTENSION: &str =
    "nbgrader.server_extensions.course_list";

/// Lab extensions every instructor gets: nbgrader's course list and the
/// Kore front end.
const INSTRUCTOR_LAB_EXTENSIONS: [&str; 2] =
    ["@jupyter/nbgrader:course-list", "kore-extension"];

impl Provisioner {
    /// Enables the course list and Kore extensions for `user`.
    ///
    /// The commands run as the user's dynamic user, which can re-own the
    /// state directory; its owner is put back afterwards even when a
    /// command fails.
    pub async fn activate_instructor(
        &self,
        user: &str,
    ) -> Result<(), ProvisionError> {
        let state_dir = self.layout.private_home(user);
        let owner = dir_owner(&state_dir);
        info!(user, "activating instructor extensions");

        let result = self.enable_instructor_extensions(user).await;

        if let Some((uid, gid)) = owner {
            let chown = ops::chown_recursive(&state_dir, &format!("{uid}:{gid}"));
            self.runner.run(&chown).await?;
        } else {
            debug!(user, "no state directory yet, ownership left alone");
        }
        result
    }

    async fn enable_instructor_extensions(
        &self,
        user: &str,
    ) -> Result<(), ProvisionError> {
        let enable_server = ops::jupyter_in_dynamic_user(
            user,
            [
                "server",
                "extension",
                "enable",
                "--user",
                COURSE_LIST_SERVER_EXTENSION,
            ],
        );
        self.runner.run(&enable_server).await?;

        for extension in INSTRUCTOR_LAB_EXTENSIONS {
            self.best_effort(&ops::jupyter(["labextension", "unlock", extension]))
                .await;
            let toggled = self.toggle_for_user(user, extension).await;
            self.best_effort(&ops::jupyter(["labextension", "lock", extension]))
                .await;
            toggled?;
        }
        Ok(())
    }

    async fn toggle_for_user(
        &self,
        user: &str,
        extension: &str,
    ) -> Result<(), ProvisionError> {
        for action in ["disable", "enable"] {
            let spec = ops::jupyter_in_dynamic_user(
                user,
                ["labextension", action, "--level=user", extension],
            );
            self.runner.run(&spec).await?;
        }
        Ok(())
    }
}

fn dir_owner(path: &Path) -> Option<(u32, u32)> {
    std::fs::metadata(path)
        .ok()
        .map(|meta| (meta.uid(), meta.gid()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::layout::Layout;
    use crate::os::testing::RecordingRunner;

    #[tokio::test]
    async fn activation_restores_state_directory_owner() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::rooted_at(dir.path());
        let state_dir = layout.private_home("alice");
        std::fs::create_dir_all(&state_dir).unwrap();
        let meta = std::fs::metadata(&state_dir).unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let provisioner = Provisioner::new(runner.clone(), layout);

        provisioner.activate_instructor("alice").await.unwrap();

        let lines = runner.command_lines();
        assert!(lines[0].contains("--unit=post-auth-hook-alice"));
        assert!(lines[0].ends_with(COURSE_LIST_SERVER_EXTENSION));
        assert_eq!(runner.count("labextension unlock"), 2);
        assert_eq!(runner.count("labextension lock"), 2);
        let expected = format!(
            "chown -R {}:{} {}",
            meta.uid(),
            meta.gid(),
            state_dir.display()
        );
        assert_eq!(lines.last(), Some(&expected));
    }

    #[tokio::test]
    async fn failed_unit_is_reported_and_extensions_relocked() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::rooted_at(dir.path());
        let runner = Arc::new(
            RecordingRunner::new().failing_on("enable --level=user kore-extension"),
        );
        let provisioner = Provisioner::new(runner.clone(), layout);

        let result = provisioner.activate_instructor("bob").await;

        assert!(result.is_err());
        assert_eq!(runner.count("labextension lock kore-extension"), 1);
    }
}
