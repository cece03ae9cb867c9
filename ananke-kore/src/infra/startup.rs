use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use ananke_config::Config;
use ananke_core::{hub::HubClient, os::SystemRunner, provision::RestoreReport};

use crate::infra::app_state::AppState;

/// Work run once after the state is built and before the listener opens.
#[async_trait]
pub trait StartupHooks: Send + Sync {
    async fn run(&self, state: &AppState) -> Result<()>;
}

/// Recreates grader accounts lost with the container's `/etc/passwd`.
#[derive(Debug, Default)]
pub struct ProdStartupHooks;

#[async_trait]
impl StartupHooks for ProdStartupHooks {
    async fn run(&self, state: &AppState) -> Result<()> {
        if let Err(err) = restore_accounts(state).await {
            warn!(error = %err, "Failed to restore grader accounts");
        }
        Ok(())
    }
}

/// State backed by real processes and the configured hub.
pub fn production_state(config: Config) -> Result<AppState> {
    let hub = HubClient::new(&config.hub.api_url, config.hub.api_token.clone())
        .context("failed to build the hub API client")?;
    AppState::build(config, Arc::new(SystemRunner), Arc::new(hub))
}

pub async fn restore_accounts(state: &AppState) -> Result<RestoreReport> {
    let engine = state.engine.lock().await;
    let report = engine
        .provisioner()
        .restore_grader_accounts()
        .await
        .with_context(|| {
            format!(
                "failed to scan grader homes under {}",
                state.layout.home_root.display()
            )
        })?;
    info!(
        restored = report.restored.len(),
        failed = report.failed.len(),
        "grader account restore finished"
    );
    Ok(report)
}
