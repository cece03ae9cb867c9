use std::{fmt, sync::Arc};

use anyhow::Context;
use tokio::sync::Mutex;

use ananke_config::Config;
use ananke_core::{
    Layout,
    hub::HubApi,
    lms::GradePublisher,
    os::CommandRunner,
    provision::Provisioner,
    reconcile::ReconcileEngine,
    restart::RestartCoordinator,
    snapshot::SnapshotStore,
    title_index::TitleIndex,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub layout: Layout,
    /// One reconciliation or course mutation at a time.
    pub engine: Arc<Mutex<ReconcileEngine>>,
    pub restarts: RestartCoordinator,
    pub hub: Arc<dyn HubApi>,
    pub runner: Arc<dyn CommandRunner>,
    pub snapshots: SnapshotStore,
    pub titles: TitleIndex,
    /// `None` when no LTI platform is configured.
    pub publisher: Option<Arc<GradePublisher>>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Wires every component from the loaded configuration.
    pub fn build(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        hub: Arc<dyn HubApi>,
    ) -> anyhow::Result<Self> {
        let layout = config.layout();

        let provisioner = Provisioner::new(Arc::clone(&runner), layout.clone())
            .with_feedback(config.feedback_settings());
        let engine = ReconcileEngine::new(provisioner, Arc::clone(&hub))
            .with_service_settings(config.service_settings())
            .with_enrollment_delay(config.enrollment_delay());

        let restart_command = config
            .restart_command()
            .unwrap_or_else(RestartCoordinator::default_command);
        let restarts =
            RestartCoordinator::new(Arc::clone(&runner), restart_command)
                .with_delay(config.restart_delay());

        let publisher = config
            .lti_platform()
            .map(GradePublisher::new)
            .transpose()
            .context("failed to build the LMS client")?
            .map(Arc::new);

        Ok(Self {
            snapshots: SnapshotStore::new(layout.clone()),
            titles: TitleIndex::new(&layout.nbgrader_config_file),
            config: Arc::new(config),
            layout,
            engine: Arc::new(Mutex::new(engine)),
            restarts,
            hub,
            runner,
            publisher,
        })
    }

    /// Hook token expected from the hub; `None` rejects every hook call.
    pub fn hook_token(&self) -> Option<&str> {
        self.config.hub.api_token.as_deref()
    }
}
