//! Instructor-facing course management.
//!
//! Kore has no session of its own: the course a request acts on is the
//! one from the user's latest instructor launch snapshot.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use ananke_core::{
    CoreError,
    course::{CourseIdentity, CourseInfo, hub_base_path},
    gradebook::{Gradebook, GradebookError},
    hub::HubError,
    lms::{LmsError, PushReport, ToolKeys},
    os::{OsError, ops},
    registry::{RegistryError, RegistryStore},
};

use crate::application::catalog::{self, CourseList};
use crate::infra::app_state::AppState;

const CLEARED_DIRS: [&str; 4] = ["autograded", "feedback", "release", "submitted"];

#[derive(Debug, Error)]
pub enum CourseError {
    #[error("no instructor launch recorded for {0}")]
    NoLaunch(String),

    #[error("{user} is not an instructor of {course_id}")]
    Forbidden { user: String, course_id: String },

    #[error("nothing found that can be copied")]
    NoContent,

    #[error("{0} is not a usable course path")]
    InvalidPath(String),

    #[error("{0} already exists")]
    Exists(String),

    #[error("grade push is not configured")]
    GradePushDisabled,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Gradebook(#[from] GradebookError),

    #[error(transparent)]
    Os(#[from] OsError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Lms(#[from] LmsError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResetReport {
    /// Students removed from the gradebook.
    pub students: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteReport {
    pub restart_required: bool,
    /// Cleanup steps that failed after the registry entry was dropped.
    pub failed_steps: Vec<String>,
}

#[derive(Debug)]
struct CurrentCourse {
    identity: CourseIdentity,
    base_path: String,
}

#[derive(Debug, Clone)]
pub struct CourseManager {
    state: AppState,
}

impl CourseManager {
    pub fn new(state: &AppState) -> Self {
        Self {
            state: state.clone(),
        }
    }

    fn registry(&self) -> RegistryStore {
        RegistryStore::new(&self.state.layout.registry_file)
    }

    fn current_course(&self, user: &str) -> Result<CurrentCourse, CourseError> {
        let claims =
            self.state.snapshots.load(user).map_err(|err| match err {
                CoreError::NotFound(_) => CourseError::NoLaunch(user.into()),
                other => other.into(),
            })?;
        let identity =
            CourseIdentity::resolve(&claims).map_err(CoreError::from)?;
        let base_path = claims
            .target_link_uri()
            .map(hub_base_path)
            .unwrap_or_default();
        Ok(CurrentCourse {
            identity,
            base_path,
        })
    }

    /// Members of the course's formgrade group and hub admins pass.
    async fn authorize(
        &self,
        user: &str,
        course_id: &str,
        base_path: &str,
    ) -> Result<(), CourseError> {
        let registry = self.registry().read()?;
        if registry.is_member(&format!("formgrade-{course_id}"), user) {
            return Ok(());
        }
        match self.state.hub.is_admin(base_path, user).await {
            Ok(true) => {
                debug!(user, course_id, "admin access to course");
                Ok(())
            }
            Ok(false) => Err(CourseError::Forbidden {
                user: user.into(),
                course_id: course_id.into(),
            }),
            Err(err) => {
                warn!(user, course_id, %err, "admin lookup failed");
                Err(CourseError::Forbidden {
                    user: user.into(),
                    course_id: course_id.into(),
                })
            }
        }
    }

    async fn managed_course(
        &self,
        user: &str,
    ) -> Result<CurrentCourse, CourseError> {
        let course = self.current_course(user)?;
        self.authorize(user, &course.identity.course_id, &course.base_path)
            .await?;
        Ok(course)
    }

    fn timestamp(&self) -> Result<String, CourseError> {
        let format = &self.state.config.backup.timestamp_format;
        let mut stamp = String::new();
        write!(stamp, "{}", Local::now().format(format)).map_err(|_| {
            CoreError::Internal(format!("invalid timestamp format `{format}`"))
        })?;
        Ok(stamp.replace('/', "-"))
    }

    pub fn title(&self, user: &str) -> Result<String, CourseError> {
        Ok(self.current_course(user)?.identity.course_title_short)
    }

    /// The current course and the sources `user` may copy from.
    async fn copy_sources(
        &self,
        user: &str,
    ) -> Result<(CurrentCourse, CourseList), CourseError> {
        let course = self.managed_course(user).await?;
        let registry = self.registry().read()?;
        let sources = catalog::list_sources(
            &self.state.layout,
            &registry,
            user,
            &course.identity.course_id,
        );
        Ok((course, sources))
    }

    pub async fn list(&self, user: &str) -> Result<CourseList, CourseError> {
        let (_, list) = self.copy_sources(user).await?;
        if list.is_empty() {
            return Err(CourseError::NoContent);
        }
        info!(user, courses = list.paths.len(), "copy sources listed");
        Ok(list)
    }

    pub async fn list_assignments(
        &self,
        user: &str,
    ) -> Result<CourseList, CourseError> {
        let (_, sources) = self.copy_sources(user).await?;
        let list = catalog::list_assignments(&sources);
        if list.is_empty() {
            return Err(CourseError::NoContent);
        }
        info!(user, assignments = list.paths.len(), "assignments listed");
        Ok(list)
    }

    pub async fn list_problems(
        &self,
        user: &str,
    ) -> Result<CourseList, CourseError> {
        let (_, sources) = self.copy_sources(user).await?;
        let list = catalog::list_problems(&catalog::list_assignments(&sources));
        if list.is_empty() {
            return Err(CourseError::NoContent);
        }
        info!(user, problems = list.paths.len(), "problems listed");
        Ok(list)
    }

    /// Copies every assignment under a listed source into the current
    /// course as `"{name} ({timestamp})"`.
    pub async fn import(
        &self,
        user: &str,
        source: &Path,
    ) -> Result<Vec<PathBuf>, CourseError> {
        let (course, sources) = self.copy_sources(user).await?;
        let course_id = &course.identity.course_id;
        let grader = &course.identity.grader_account_id;
        if !sources.contains(source) {
            return Err(CourseError::InvalidPath(source.display().to_string()));
        }

        let target = self.state.layout.course_data_dir(grader).join("source");
        let stamp = self.timestamp()?;
        let mut copies = Vec::new();
        for assignment in catalog::assignment_dirs(source)? {
            let Some(name) = assignment.file_name() else {
                continue;
            };
            let destination = target
                .join(format!("{} ({stamp})", name.to_string_lossy()));
            if destination.exists() {
                return Err(CourseError::Exists(
                    destination.display().to_string(),
                ));
            }
            copies.push((assignment, destination));
        }

        tokio::fs::create_dir_all(&target).await?;
        let owner = format!("{grader}:{grader}");
        for (assignment, destination) in &copies {
            self.state
                .runner
                .run(&ops::copy_tree(assignment, destination))
                .await?;
            self.state
                .runner
                .run(&ops::chown_recursive(destination, &owner))
                .await?;
        }
        info!(
            user,
            course_id = %course_id,
            source = %source.display(),
            assignments = copies.len(),
            "assignments imported"
        );
        Ok(copies.into_iter().map(|(_, destination)| destination).collect())
    }

    /// Copies one listed assignment into the current course's `source`
    /// folder as `"{name} ({timestamp})"`.
    pub async fn import_assignment(
        &self,
        user: &str,
        assignment: &Path,
    ) -> Result<PathBuf, CourseError> {
        let (course, sources) = self.copy_sources(user).await?;
        if !catalog::list_assignments(&sources).contains(assignment) {
            return Err(CourseError::InvalidPath(
                assignment.display().to_string(),
            ));
        }
        let grader = &course.identity.grader_account_id;
        let Some(name) = assignment.file_name() else {
            return Err(CourseError::InvalidPath(
                assignment.display().to_string(),
            ));
        };

        let target = self.state.layout.course_data_dir(grader).join("source");
        let destination = target.join(format!(
            "{} ({})",
            name.to_string_lossy(),
            self.timestamp()?
        ));
        if destination.exists() {
            return Err(CourseError::Exists(destination.display().to_string()));
        }

        tokio::fs::create_dir_all(&target).await?;
        self.state
            .runner
            .run(&ops::copy_tree(assignment, &destination))
            .await?;
        self.state
            .runner
            .run(&ops::chown_recursive(
                &destination,
                &format!("{grader}:{grader}"),
            ))
            .await?;
        info!(
            user,
            course_id = %course.identity.course_id,
            assignment = %assignment.display(),
            "assignment imported"
        );
        Ok(destination)
    }

    /// Copies one listed notebook to `source/imported/` of the current
    /// course as `"{stem} ({timestamp}).ipynb"`.
    pub async fn import_problem(
        &self,
        user: &str,
        notebook: &Path,
    ) -> Result<PathBuf, CourseError> {
        let (course, sources) = self.copy_sources(user).await?;
        let problems =
            catalog::list_problems(&catalog::list_assignments(&sources));
        if !problems.contains(notebook) {
            return Err(CourseError::InvalidPath(
                notebook.display().to_string(),
            ));
        }
        let grader = &course.identity.grader_account_id;
        let Some(stem) = notebook.file_stem() else {
            return Err(CourseError::InvalidPath(
                notebook.display().to_string(),
            ));
        };

        let target = self
            .state
            .layout
            .course_data_dir(grader)
            .join("source")
            .join("imported");
        let destination = target.join(format!(
            "{} ({}).ipynb",
            stem.to_string_lossy(),
            self.timestamp()?
        ));
        if destination.exists() {
            return Err(CourseError::Exists(destination.display().to_string()));
        }

        tokio::fs::create_dir_all(&target).await?;
        self.state
            .runner
            .run(&ops::copy_tree(notebook, &destination))
            .await?;
        self.state
            .runner
            .run(&ops::chown_recursive(&target, &format!("{grader}:{grader}")))
            .await?;
        info!(
            user,
            course_id = %course.identity.course_id,
            notebook = %notebook.display(),
            "problem imported"
        );
        Ok(destination)
    }

    /// Copies the course data to `{private_root}/{user}/{title} ({time})`.
    pub async fn backup(&self, user: &str) -> Result<PathBuf, CourseError> {
        let course = self.managed_course(user).await?;
        let grader = &course.identity.grader_account_id;

        let home = self.state.layout.private_home(user);
        let name = format!(
            "{} ({})",
            course.identity.course_title_short.replace('/', "-"),
            self.timestamp()?
        );
        let destination = home.join(name);
        if destination.exists() {
            return Err(CourseError::Exists(destination.display().to_string()));
        }

        tokio::fs::create_dir_all(&home).await?;
        let source = self.state.layout.course_data_dir(grader);
        self.state
            .runner
            .run(&ops::copy_tree(&source, &destination))
            .await?;
        self.state
            .runner
            .run(&ops::chown_recursive(&destination, &format!("{user}:{user}")))
            .await?;
        info!(
            user,
            course_id = %course.identity.course_id,
            destination = %destination.display(),
            "course backed up"
        );
        Ok(destination)
    }

    /// Drops every student and their submissions; assignments stay.
    pub async fn reset(&self, user: &str) -> Result<ResetReport, CourseError> {
        let course = self.managed_course(user).await?;
        let identity = &course.identity;
        let layout = &self.state.layout;
        let _engine = self.state.engine.lock().await;

        let gradebook_path = layout.gradebook_path(&identity.grader_account_id);
        let mut students = Vec::new();
        if gradebook_path.is_file() {
            let gradebook = Gradebook::open_existing(&gradebook_path).await?;
            students = gradebook.student_ids().await?;
            for student in &students {
                gradebook.remove_student(student).await?;
            }
            gradebook.close().await;
        }

        if !students.is_empty()
            && let Err(err) = self
                .state
                .hub
                .remove_group_members(
                    &course.base_path,
                    &identity.nbgrader_group(),
                    &students,
                )
                .await
        {
            warn!(
                course_id = %identity.course_id,
                %err,
                "failed to remove students from the nbgrader group"
            );
        }

        let course_data = layout.course_data_dir(&identity.grader_account_id);
        let mut doomed = vec![
            layout.exchange_dir(&identity.course_id),
            gradebook_path.clone(),
        ];
        doomed.extend(CLEARED_DIRS.iter().map(|dir| course_data.join(dir)));
        for path in &doomed {
            self.state.runner.run(&ops::remove_tree(path)).await?;
        }

        // Student launches need a gradebook to record the new roster in.
        let gradebook = Gradebook::open_or_create(&gradebook_path).await?;
        gradebook.close().await;
        let grader = &identity.grader_account_id;
        self.state
            .runner
            .run(&ops::chown_recursive(
                &gradebook_path,
                &format!("{grader}:{grader}"),
            ))
            .await?;

        info!(
            user,
            course_id = %identity.course_id,
            students = students.len(),
            "course reset"
        );
        Ok(ResetReport { students })
    }

    /// Removes the course from the hub and the machine.
    ///
    /// The registry entry goes first; later cleanup failures are reported
    /// but do not undo it.
    pub async fn delete(&self, user: &str) -> Result<DeleteReport, CourseError> {
        let course = self.managed_course(user).await?;
        let identity = &course.identity;
        let layout = &self.state.layout;
        let _engine = self.state.engine.lock().await;

        let update = self
            .registry()
            .update(|registry| Ok(registry.remove_course(identity)))
            .await?;
        let mut report = DeleteReport {
            restart_required: update.committed,
            failed_steps: Vec::new(),
        };
        if update.committed {
            self.state.restarts.request();
        }

        let steps = [
            ops::remove_tree(&layout.exchange_dir(&identity.course_id)),
            ops::delete_account(&identity.grader_account_id),
            ops::remove_tree(&layout.grader_home(&identity.grader_account_id)),
        ];
        for step in &steps {
            if let Err(err) = self.state.runner.run(step).await {
                warn!(course_id = %identity.course_id, %err, "cleanup step failed");
                report.failed_steps.push(step.command_line());
            }
        }
        if let Err(err) = self.state.titles.remove(&identity.course_id).await {
            warn!(course_id = %identity.course_id, %err, "failed to drop course title");
            report.failed_steps.push("title index".to_string());
        }

        info!(
            user,
            course_id = %identity.course_id,
            restart_required = report.restart_required,
            "course deleted"
        );
        Ok(report)
    }

    /// Pushes every gradebook score of the course at `course_data` to the
    /// LMS line item recorded in its `info.json`.
    pub async fn push_grades(
        &self,
        user: &str,
        course_data: &Path,
    ) -> Result<PushReport, CourseError> {
        let publisher = self
            .state
            .publisher
            .clone()
            .ok_or(CourseError::GradePushDisabled)?;

        let info = CourseInfo::load(&course_data.join("info.json"))?
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "no course info in {}",
                    course_data.display()
                ))
            })?;
        let layout = &self.state.layout;
        if course_data != layout.course_data_dir(&info.grader_user) {
            return Err(CourseError::InvalidPath(
                course_data.display().to_string(),
            ));
        }
        self.authorize(user, &info.id, &info.target_link_uri).await?;

        let keys = ToolKeys::load(layout)?;
        let gradebook =
            Gradebook::open_existing(&layout.gradebook_path(&info.grader_user))
                .await?;
        let students = gradebook.students().await?;
        gradebook.close().await;

        let report = publisher.push_scores(&keys, &info, &students).await?;
        info!(
            user,
            course_id = %info.id,
            sent = report.sent.len(),
            failed = report.failed.len(),
            "grades pushed"
        );
        Ok(report)
    }
}
