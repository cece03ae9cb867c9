use tracing::info;

use crate::course::CourseIdentity;
use crate::gradebook::Gradebook;
use crate::os::ops;
use crate::provision::{
    ProvisionReport, ProvisionStep, Provisioner, nbgrader_config,
};

const SERVER_EXTENSIONS: [(&str, &str); 3] = [
    ("enable", "nbgrader.server_extensions.formgrader"),
    ("disable", "nbgrader.server_extensions.assignment_list"),
    ("disable", "nbgrader.server_extensions.validate_assignment"),
];

/// Lab extension toggles for a grader. Enabled ones are disabled first so a
/// stale user-level state is reset.
const LAB_EXTENSIONS: [(&str, bool); 4] = [
    ("@jupyter/nbgrader:formgrader", true),
    ("@jupyter/nbgrader:assignment-list", false),
    ("@jupyter/nbgrader:create-assignment", true),
    ("@jupyter/nbgrader:validate-assignment", false),
];

impl Provisioner {
    /// Ensures the grader account, its extensions, configuration, course
    /// directory and gradebook exist. Safe to run repeatedly.
    pub async fn provision_grader(
        &self,
        identity: &CourseIdentity,
    ) -> ProvisionReport {
        let grader = identity.grader_account_id.as_str();
        let home = self.layout.grader_home(grader);
        let mut report = ProvisionReport::default();

        if self.account_exists(grader).await {
            info!(grader, "grader account exists, resuming provisioning");
        } else {
            info!(
                grader,
                course_id = %identity.course_id,
                "creating grader account"
            );
            let create = ops::create_account(grader, true);
            if self
                .step(&mut report, ProvisionStep::CreateAccount, &create)
                .await
            {
                report.account_created = true;
                let lock = ops::lock_password(grader);
                self.step(&mut report, ProvisionStep::LockPassword, &lock)
                    .await;
            }
        }

        if !home.is_dir() {
            report.fail(
                ProvisionStep::CreateAccount,
                format!("home directory {} is missing", home.display()),
            );
            return report;
        }

        for (action, extension) in SERVER_EXTENSIONS {
            let spec = ops::jupyter_as(
                grader,
                ["server", "extension", action, "--user", extension],
            );
            if !self
                .step(&mut report, ProvisionStep::ServerExtensions, &spec)
                .await
            {
                break;
            }
        }

        self.toggle_lab_extensions(grader, &mut report).await;

        let config_path = self.layout.grader_nbgrader_config(grader);
        let config =
            nbgrader_config::render(&self.layout, identity, self.feedback);
        let written = match config_path.parent() {
            Some(dir) => std::fs::create_dir_all(dir)
                .and_then(|_| std::fs::write(&config_path, config)),
            None => Ok(()),
        };
        if let Err(err) = written {
            report.fail(ProvisionStep::NbgraderConfig, err);
        }

        let course_dir = self.layout.course_data_dir(grader);
        if let Err(err) = std::fs::create_dir_all(&course_dir) {
            report.fail(ProvisionStep::CourseDirectory, err);
        } else {
            let gradebook = self.layout.gradebook_path(grader);
            match Gradebook::open_or_create(&gradebook).await {
                Ok(book) => book.close().await,
                Err(err) => report.fail(ProvisionStep::Gradebook, err),
            }
        }

        let owner = format!("{grader}:{grader}");
        let chown = ops::chown_recursive(&home, &owner);
        self.step(&mut report, ProvisionStep::Ownership, &chown).await;
        let chmod = ops::chmod_recursive(&home, "go-rwx");
        self.step(&mut report, ProvisionStep::Permissions, &chmod).await;

        if report.is_ready() {
            info!(grader, "grader account ready");
        }
        report
    }

    async fn toggle_lab_extensions(
        &self,
        grader: &str,
        report: &mut ProvisionReport,
    ) {
        for (extension, _) in LAB_EXTENSIONS {
            self.best_effort(&ops::jupyter(["labextension", "unlock", extension]))
                .await;
        }
        for (extension, enabled) in LAB_EXTENSIONS {
            let mut actions = vec!["disable"];
            if enabled {
                actions.push("enable");
            }
            for action in actions {
                let spec = ops::jupyter_as(
                    grader,
                    ["labextension", action, "--level=user", extension],
                );
                self.step(report, ProvisionStep::LabExtensions, &spec).await;
            }
        }
        for (extension, _) in LAB_EXTENSIONS {
            self.best_effort(&ops::jupyter(["labextension", "lock", extension]))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::layout::Layout;
    use crate::os::testing::RecordingRunner;

    fn identity() -> CourseIdentity {
        CourseIdentity {
            course_id: "c-00aa".into(),
            course_title: "T (c-00aa)".into(),
            course_title_short: "T".into(),
            grader_account_id: "c-00aa".into(),
        }
    }

    fn setup(
        runner: RecordingRunner,
    ) -> (tempfile::TempDir, Arc<RecordingRunner>, Provisioner) {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::rooted_at(dir.path());
        let runner = Arc::new(runner.with_home_root(&layout.home_root));
        let provisioner = Provisioner::new(runner.clone(), layout);
        (dir, runner, provisioner)
    }

    #[tokio::test]
    async fn fresh_grader_is_fully_provisioned() {
        let (_dir, runner, provisioner) = setup(RecordingRunner::new());

        let report = provisioner.provision_grader(&identity()).await;

        assert!(report.is_ready(), "{report:?}");
        assert!(report.account_created);
        assert!(runner.has_account("c-00aa"));
        let layout = provisioner.layout();
        assert!(layout.gradebook_path("c-00aa").is_file());
        let config =
            std::fs::read_to_string(layout.grader_nbgrader_config("c-00aa"))
                .unwrap();
        assert!(config.contains("c.CourseDirectory.course_id = 'c-00aa'"));

        let lines = runner.command_lines();
        assert!(lines.contains(
            &"useradd --create-home --shell=/bin/bash c-00aa".to_string()
        ));
        assert!(lines.contains(&"usermod -L c-00aa".to_string()));
        assert_eq!(runner.count("labextension unlock"), 4);
        assert_eq!(runner.count("labextension lock"), 4);
        assert_eq!(runner.count("chmod -R go-rwx"), 1);
    }

    #[tokio::test]
    async fn existing_account_is_not_recreated() {
        let (dir, runner, provisioner) =
            setup(RecordingRunner::new().with_account("c-00aa"));
        let home = Layout::rooted_at(dir.path()).grader_home("c-00aa");
        std::fs::create_dir_all(home).unwrap();

        let report = provisioner.provision_grader(&identity()).await;

        assert!(report.is_ready());
        assert!(!report.account_created);
        assert_eq!(runner.count("useradd"), 0);
    }

    #[tokio::test]
    async fn failed_useradd_leaves_course_unprovisioned() {
        let (_dir, runner, provisioner) =
            setup(RecordingRunner::new().failing_on("useradd"));

        let report = provisioner.provision_grader(&identity()).await;

        assert!(!report.is_ready());
        assert!(report.failed(ProvisionStep::CreateAccount));
        assert!(!provisioner.layout().course_data_dir("c-00aa").exists());
        assert_eq!(runner.count("jupyter"), 0);
    }

    #[tokio::test]
    async fn extension_failures_do_not_block_course_data() {
        let (_dir, _runner, provisioner) =
            setup(RecordingRunner::new().failing_on("labextension enable"));

        let report = provisioner.provision_grader(&identity()).await;

        assert!(report.failed(ProvisionStep::LabExtensions));
        assert!(report.is_ready());
        assert!(provisioner.layout().gradebook_path("c-00aa").is_file());
    }
}
