use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::course::{CourseIdentity, CourseInfo, CourseState, hub_base_path};
use crate::gradebook::{Gradebook, GradebookError, StudentProfile};
use crate::hub::HubApi;
use crate::instructors::InstructorRegistry;
use crate::lti::LaunchRole;
use crate::provision::Provisioner;
use crate::reconcile::{Launch, LaunchOutcome, ReconcileError};
use crate::registry::{RegistryStore, ServiceSettings, generate_api_token};
use crate::snapshot::SnapshotStore;
use crate::title_index::TitleIndex;

const DEFAULT_ENROLLMENT_DELAY: Duration = Duration::from_secs(5);

/// Ties identity, provisioning, registry and roster together for a launch.
///
/// Callers serialize invocations; the shared files are additionally
/// guarded by their advisory locks against other processes.
#[derive(Clone)]
pub struct ReconcileEngine {
    provisioner: Provisioner,
    registry: RegistryStore,
    instructors: InstructorRegistry,
    titles: TitleIndex,
    snapshots: SnapshotStore,
    hub: Arc<dyn HubApi>,
    services: ServiceSettings,
    enrollment_delay: Duration,
}

impl fmt::Debug for ReconcileEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcileEngine")
            .field("provisioner", &self.provisioner)
            .field("registry", &self.registry)
            .field("services", &self.services)
            .field("enrollment_delay", &self.enrollment_delay)
            .finish()
    }
}

impl ReconcileEngine {
    /// Builds the engine over the files named by the provisioner's layout.
    pub fn new(provisioner: Provisioner, hub: Arc<dyn HubApi>) -> Self {
        let layout = provisioner.layout().clone();
        Self {
            registry: RegistryStore::new(&layout.registry_file),
            instructors: InstructorRegistry::new(&layout.instructors_file),
            titles: TitleIndex::new(&layout.nbgrader_config_file),
            snapshots: SnapshotStore::new(layout),
            provisioner,
            hub,
            services: ServiceSettings::default(),
            enrollment_delay: DEFAULT_ENROLLMENT_DELAY,
        }
    }

    /// Host and base port for new course services.
    pub fn with_service_settings(mut self, services: ServiceSettings) -> Self {
        self.services = services;
        self
    }

    /// Wait before adding a student to the hub group, letting the hub
    /// finish the login first.
    pub fn with_enrollment_delay(mut self, delay: Duration) -> Self {
        self.enrollment_delay = delay;
        self
    }

    /// Store of the hub registry file.
    pub fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    /// Provisioner used for grader accounts and instructors.
    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    /// Reconciles course state with one launch.
    ///
    /// Fails only when the launch cannot be mapped onto a course; every
    /// later step logs its failure and leaves a state the next launch
    /// retries from.
    pub async fn reconcile(
        &self,
        launch: &Launch,
    ) -> Result<LaunchOutcome, ReconcileError> {
        let identity = CourseIdentity::resolve(&launch.claims)?;
        self.check_placement(&identity, launch)?;

        let state = CourseState::detect(self.provisioner.layout(), &identity);
        let role = launch.claims.role();
        info!(
            user = %launch.username,
            course_id = %identity.course_id,
            ?role,
            ?state,
            "reconciling launch"
        );

        let outcome = match role {
            LaunchRole::Instructor => {
                self.instructor_launch(launch, identity, state).await
            }
            LaunchRole::Student => {
                self.student_launch(launch, identity, state).await
            }
        };
        info!(
            course_id = %outcome.identity.course_id,
            state = ?outcome.state,
            restart_required = outcome.restart_required,
            "launch reconciled"
        );
        Ok(outcome)
    }

    /// Rejects a launch whose course id is already bound to a different
    /// deployment and resource link.
    fn check_placement(
        &self,
        identity: &CourseIdentity,
        launch: &Launch,
    ) -> Result<(), ReconcileError> {
        let path = self
            .provisioner
            .layout()
            .course_info_path(&identity.grader_account_id);
        let existing = match CourseInfo::load(&path) {
            Ok(Some(existing)) => existing,
            Ok(None) => return Ok(()),
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable course info");
                return Ok(());
            }
        };
        let incoming = CourseInfo::from_launch(identity, &launch.claims);
        if existing.same_placement(&incoming) {
            return Ok(());
        }
        error!(
            course_id = %identity.course_id,
            "course id collision between LMS placements"
        );
        Err(ReconcileError::IdentityCollision {
            course_id: identity.course_id.clone(),
            deployment_id: existing.deployment_id.unwrap_or_default(),
            resource_link_id: existing.resource_link_id.unwrap_or_default(),
        })
    }

    async fn instructor_launch(
        &self,
        launch: &Launch,
        identity: CourseIdentity,
        state: CourseState,
    ) -> LaunchOutcome {
        let user = launch.username.as_str();
        let layout = self.provisioner.layout();
        let mut outcome = LaunchOutcome::new(identity, state);

        let activation = self
            .instructors
            .activate_once(user, || self.provisioner.activate_instructor(user))
            .await;
        if let Err(err) = activation {
            warn!(user, %err, "instructor activation failed");
        }

        if let Err(err) = self.snapshots.store(user, &launch.claims) {
            warn!(user, %err, "failed to store launch snapshot");
        }

        if !outcome.state.is_provisioned() {
            let report =
                self.provisioner.provision_grader(&outcome.identity).await;
            outcome.state = CourseState::detect(layout, &outcome.identity);
            outcome.provision = Some(report);
        }
        if !outcome.state.is_provisioned() {
            warn!(
                course_id = %outcome.identity.course_id,
                "course data missing, registration deferred to next launch"
            );
            return outcome;
        }

        self.store_course_info(&outcome.identity, launch);
        self.register(&mut outcome, user).await;

        let identity = &outcome.identity;
        if let Err(err) = self
            .titles
            .upsert(&identity.course_id, &identity.course_title)
            .await
        {
            warn!(
                course_id = %identity.course_id,
                %err,
                "title index not updated"
            );
        }
        outcome
    }

    fn store_course_info(&self, identity: &CourseIdentity, launch: &Launch) {
        let path = self
            .provisioner
            .layout()
            .course_info_path(&identity.grader_account_id);
        if matches!(CourseInfo::load(&path), Ok(Some(_))) {
            return;
        }
        let info = CourseInfo::from_launch(identity, &launch.claims);
        match info.store(&path) {
            Ok(()) => debug!(path = %path.display(), "course info written"),
            Err(err) => {
                warn!(path = %path.display(), %err, "course info not written")
            }
        }
    }

    /// Adds the course and the instructor's formgrade membership.
    async fn register(&self, outcome: &mut LaunchOutcome, user: &str) {
        let identity = &outcome.identity;
        let home = self
            .provisioner
            .layout()
            .grader_home(&identity.grader_account_id);
        let formgrade = identity.formgrade_group();

        let update = self
            .registry
            .update(|registry| {
                let registered = registry.register_course(
                    identity,
                    &home,
                    &self.services,
                    generate_api_token(),
                )?;
                let joined = registry.add_group_member(&formgrade, user);
                Ok((registered, joined))
            })
            .await;

        match update {
            Ok(update) => {
                let (registered, joined) = update.value;
                if registered {
                    info!(course_id = %identity.course_id, "course registered");
                }
                if joined {
                    info!(user, group = %formgrade, "instructor added to group");
                }
                outcome.state = CourseState::Registered;
                outcome.restart_required = update.committed;
            }
            Err(err) => {
                error!(
                    course_id = %identity.course_id,
                    path = %self.registry.path().display(),
                    %err,
                    "registry update failed"
                );
                outcome.registry_error = Some(err.to_string());
            }
        }
    }

    async fn student_launch(
        &self,
        launch: &Launch,
        identity: CourseIdentity,
        state: CourseState,
    ) -> LaunchOutcome {
        let mut outcome = LaunchOutcome::new(identity, state);
        if !state.is_provisioned() {
            debug!(
                user = %launch.username,
                course_id = %outcome.identity.course_id,
                "student launch for unprovisioned course ignored"
            );
            return outcome;
        }
        if let Ok(registry) = self.registry.read() {
            outcome.state =
                state.with_registry(&registry, &outcome.identity.course_id);
        }

        let profile = StudentProfile {
            id: launch.username.clone(),
            first_name: launch.claims.given_name().map(str::to_string),
            last_name: launch.claims.family_name().map(str::to_string),
            email: launch.claims.email().map(str::to_string),
            lms_user_id: launch.claims.subject().map(str::to_string),
        };
        if let Err(err) = self.upsert_roster(&outcome.identity, &profile).await {
            warn!(user = %profile.id, %err, "roster not updated");
        }

        let base_path = launch
            .claims
            .target_link_uri()
            .map(hub_base_path)
            .unwrap_or_default();
        outcome.enrollment = Some(self.schedule_enrollment(
            base_path,
            outcome.identity.nbgrader_group(),
            launch.username.clone(),
        ));
        outcome
    }

    async fn upsert_roster(
        &self,
        identity: &CourseIdentity,
        profile: &StudentProfile,
    ) -> Result<(), GradebookError> {
        let path = self
            .provisioner
            .layout()
            .gradebook_path(&identity.grader_account_id);
        let gradebook = Gradebook::open_existing(&path).await?;
        let result = gradebook.upsert_student(profile).await;
        gradebook.close().await;
        result
    }

    /// Adds the student to the course's nbgrader group after a delay,
    /// once the hub has finished creating the user.
    fn schedule_enrollment(
        &self,
        base_path: String,
        group: String,
        user: String,
    ) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(&self.hub);
        let delay = self.enrollment_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let users = [user];
            match hub.add_group_members(&base_path, &group, &users).await {
                Ok(()) => info!(user = %users[0], %group, "student enrolled"),
                Err(err) => {
                    warn!(user = %users[0], %group, %err, "student enrollment failed")
                }
            }
        })
    }
}
