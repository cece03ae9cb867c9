use serde::Serialize;
use tracing::{info, warn};

use crate::course::is_valid_account_name;
use crate::os::ops;
use crate::provision::{ProvisionError, Provisioner};

/// Outcome of [`Provisioner::restore_grader_accounts`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    /// Accounts recreated.
    pub restored: Vec<String>,
    /// Homes whose account could not be recreated.
    pub failed: Vec<String>,
}

impl Provisioner {
    /// Recreates OS accounts for grader homes that outlived them.
    ///
    /// Home directories persist across container replacement while
    /// `/etc/passwd` does not; every `c-*` home without an account gets a
    /// locked account again and its files are re-owned.
    pub async fn restore_grader_accounts(
        &self,
    ) -> Result<RestoreReport, ProvisionError> {
        let mut report = RestoreReport::default();
        let mut homes = Vec::new();
        for entry in std::fs::read_dir(&self.layout.home_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && name.starts_with("c-")
                && is_valid_account_name(name)
            {
                homes.push(name.to_string());
            }
        }
        homes.sort();

        for grader in homes {
            if self.account_exists(&grader).await {
                continue;
            }
            match self.restore_account(&grader).await {
                Ok(()) => {
                    info!(grader, "grader account restored");
                    report.restored.push(grader);
                }
                Err(err) => {
                    warn!(grader, %err, "failed to restore grader account");
                    report.failed.push(grader);
                }
            }
        }
        Ok(report)
    }

    async fn restore_account(&self, grader: &str) -> Result<(), ProvisionError> {
        self.runner.run(&ops::create_account(grader, false)).await?;
        self.runner.run(&ops::lock_password(grader)).await?;
        let home = self.layout.grader_home(grader);
        let owner = format!("{grader}:{grader}");
        self.runner.run(&ops::chown_recursive(&home, &owner)).await?;
        Ok(())
    }
}
