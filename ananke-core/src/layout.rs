//! Where Ananke keeps things on disk.

use std::path::{Path, PathBuf};

/// Filesystem locations shared by every component.
///
/// Nothing here touches the disk; the layout only knows how paths are built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Parent of the grader home directories (`/home`).
    pub home_root: PathBuf,
    /// Parent of the dynamic-user state directories (`/var/lib/private`).
    pub private_root: PathBuf,
    /// Directory holding per-user LTI snapshots.
    pub runtime_dir: PathBuf,
    /// JSON array of instructors whose extensions were already activated.
    pub instructors_file: PathBuf,
    /// Hub configuration fragment with the course services, roles and groups.
    pub registry_file: PathBuf,
    /// Global nbgrader configuration carrying the course title index.
    pub nbgrader_config_file: PathBuf,
    /// Root of the nbgrader exchange directory.
    pub exchange_root: PathBuf,
    /// Directory with the LTI tool key pair (`lti_key` and `lti_key.json`).
    pub keys_dir: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            home_root: PathBuf::from("/home"),
            private_root: PathBuf::from("/var/lib/private"),
            runtime_dir: PathBuf::from("/opt/kore/runtime"),
            instructors_file: PathBuf::from("/opt/kore/runtime/instructors.json"),
            registry_file: PathBuf::from(
                "/etc/jupyterhub/jupyterhub_config.d/40_courses.py",
            ),
            nbgrader_config_file: PathBuf::from(
                "/etc/jupyter/nbgrader_config.py",
            ),
            exchange_root: PathBuf::from("/opt/nbgrader_exchange"),
            keys_dir: PathBuf::from("/opt/kore/keys"),
        }
    }
}

impl Layout {
    /// Builds a layout with every location nested under `root`.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            home_root: root.join("home"),
            private_root: root.join("var/lib/private"),
            runtime_dir: root.join("opt/kore/runtime"),
            instructors_file: root.join("opt/kore/runtime/instructors.json"),
            registry_file: root.join("etc/jupyterhub/40_courses.py"),
            nbgrader_config_file: root.join("etc/jupyter/nbgrader_config.py"),
            exchange_root: root.join("opt/nbgrader_exchange"),
            keys_dir: root.join("opt/kore/keys"),
        }
    }

    /// Home directory of a grader account.
    pub fn grader_home(&self, grader: &str) -> PathBuf {
        self.home_root.join(grader)
    }

    /// nbgrader course root of a grader account.
    pub fn course_data_dir(&self, grader: &str) -> PathBuf {
        self.grader_home(grader).join("course_data")
    }

    /// The course gradebook (`gradebook.db`).
    pub fn gradebook_path(&self, grader: &str) -> PathBuf {
        self.course_data_dir(grader).join("gradebook.db")
    }

    /// The course `info.json` read by Kore.
    pub fn course_info_path(&self, grader: &str) -> PathBuf {
        self.course_data_dir(grader).join("info.json")
    }

    /// Per-grader nbgrader configuration.
    pub fn grader_nbgrader_config(&self, grader: &str) -> PathBuf {
        self.grader_home(grader)
            .join(".jupyter")
            .join("nbgrader_config.py")
    }

    /// State directory of a dynamic hub user; backups land here.
    pub fn private_home(&self, user: &str) -> PathBuf {
        self.private_root.join(user)
    }

    /// Latest LTI launch snapshot of `user`.
    pub fn snapshot_path(&self, user: &str) -> PathBuf {
        self.runtime_dir.join(format!("lti_{user}.json"))
    }

    /// nbgrader exchange directory of one course.
    pub fn exchange_dir(&self, course_id: &str) -> PathBuf {
        self.exchange_root.join(course_id)
    }

    /// PEM private key used to sign LMS client assertions.
    pub fn private_key_path(&self) -> PathBuf {
        self.keys_dir.join("lti_key")
    }

    /// Public key in JWK form, served as the tool JWKS.
    pub fn public_jwk_path(&self) -> PathBuf {
        self.keys_dir.join("lti_key.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_layout_keeps_paths_under_root() {
        let layout = Layout::rooted_at("/tmp/x");
        assert_eq!(
            layout.gradebook_path("c-1"),
            PathBuf::from("/tmp/x/home/c-1/course_data/gradebook.db")
        );
        assert_eq!(
            layout.snapshot_path("alice"),
            PathBuf::from("/tmp/x/opt/kore/runtime/lti_alice.json")
        );
    }
}
