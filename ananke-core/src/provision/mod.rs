//! Grader account provisioning and per-instructor extension activation.
//!
//! Every step is an OS command or a filesystem write. Failures are logged
//! and recorded in a [`ProvisionReport`]; they never abort a login. A
//! grader whose course data could not be created is simply provisioned
//! again on the next instructor launch.

mod grader;
mod instructor;
pub mod nbgrader_config;
mod restore;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::gradebook::GradebookError;
use crate::layout::Layout;
use crate::os::{CommandRunner, CommandSpec, OsError};

pub use nbgrader_config::FeedbackSettings;
pub use restore::RestoreReport;

/// Provisioning failures that abort a run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A required command failed.
    #[error(transparent)]
    Os(#[from] OsError),

    /// A file or directory could not be written.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// The gradebook could not be created.
    #[error(transparent)]
    Gradebook(#[from] GradebookError),
}

/// Steps of grader provisioning, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    /// `useradd` for the grader.
    CreateAccount,
    /// `usermod -L` for the grader.
    LockPassword,
    /// Jupyter server extensions for the grader.
    ServerExtensions,
    /// JupyterLab extensions for the grader.
    LabExtensions,
    /// The grader `nbgrader_config.py`.
    NbgraderConfig,
    /// The `course_data` directory.
    CourseDirectory,
    /// `gradebook.db`.
    Gradebook,
    /// `chown -R` of the grader home.
    Ownership,
    /// `chmod -R` of the grader home.
    Permissions,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionStep::CreateAccount => "create account",
            ProvisionStep::LockPassword => "lock password",
            ProvisionStep::ServerExtensions => "server extensions",
            ProvisionStep::LabExtensions => "lab extensions",
            ProvisionStep::NbgraderConfig => "nbgrader config",
            ProvisionStep::CourseDirectory => "course directory",
            ProvisionStep::Gradebook => "gradebook",
            ProvisionStep::Ownership => "ownership",
            ProvisionStep::Permissions => "permissions",
        };
        f.write_str(name)
    }
}

/// A step that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    /// Which step.
    pub step: ProvisionStep,
    /// What went wrong.
    pub error: String,
}

/// What a provisioning run managed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    /// The grader account did not exist before this run.
    pub account_created: bool,
    /// Failed steps; later steps still ran.
    pub failures: Vec<StepFailure>,
}

impl ProvisionReport {
    pub(crate) fn fail(&mut self, step: ProvisionStep, error: impl fmt::Display) {
        warn!(%step, %error, "provisioning step failed");
        self.failures.push(StepFailure {
            step,
            error: error.to_string(),
        });
    }

    /// True when `step` is among the failures.
    pub fn failed(&self, step: ProvisionStep) -> bool {
        self.failures.iter().any(|f| f.step == step)
    }

    /// Course data and gradebook both exist.
    pub fn is_ready(&self) -> bool {
        !self.failed(ProvisionStep::CreateAccount)
            && !self.failed(ProvisionStep::CourseDirectory)
            && !self.failed(ProvisionStep::Gradebook)
    }
}

/// Creates grader accounts and activates instructors.
#[derive(Clone)]
pub struct Provisioner {
    runner: Arc<dyn CommandRunner>,
    layout: Layout,
    feedback: FeedbackSettings,
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("runner", &self.runner)
            .field("home_root", &self.layout.home_root)
            .field("feedback", &self.feedback)
            .finish()
    }
}

impl Provisioner {
    /// Provisioner issuing commands through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>, layout: Layout) -> Self {
        Self {
            runner,
            layout,
            feedback: FeedbackSettings::default(),
        }
    }

    /// Feedback settings written to new grader configs.
    pub fn with_feedback(mut self, feedback: FeedbackSettings) -> Self {
        self.feedback = feedback;
        self
    }

    /// Paths the provisioner works in.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Runner for OS commands.
    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// Runs `spec`, recording a failure under `step`. Returns success.
    async fn step(
        &self,
        report: &mut ProvisionReport,
        step: ProvisionStep,
        spec: &CommandSpec,
    ) -> bool {
        match self.runner.run(spec).await {
            Ok(_) => true,
            Err(err) => {
                report.fail(step, err);
                false
            }
        }
    }

    /// Runs `spec`, logging a failure without recording it.
    async fn best_effort(&self, spec: &CommandSpec) {
        if let Err(err) = self.runner.run(spec).await {
            warn!(command = %spec.command_line(), %err, "command failed");
        }
    }

    /// True when `id -u user` succeeds.
    pub async fn account_exists(&self, user: &str) -> bool {
        self.runner
            .output(&crate::os::ops::account_exists(user))
            .await
            .map(|out| out.success())
            .unwrap_or(false)
    }
}
