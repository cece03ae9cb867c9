//! # Ananke Kore
//!
//! Management service of an Ananke hub.
//!
//! - `ananke-kore` / `ananke-kore serve`: restores grader accounts, then
//!   serves the hook and management API
//! - `ananke-kore restore-accounts`: only restores grader accounts

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ananke_config::{ConfigLoad, ConfigLoader};
use ananke_kore::{
    AppState,
    infra::startup::{
        ProdStartupHooks, StartupHooks, production_state, restore_accounts,
    },
    routes,
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "ananke-kore")]
#[command(about = "Course reconciliation and management service for the Ananke hub")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Path to ananke.toml (overrides the default search locations)
    #[arg(long, env = "ANANKE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the hook and management API (default)
    Serve,
    /// Recreate OS accounts for orphaned grader homes and exit
    RestoreAccounts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Command::RestoreAccounts) => {
            let state = build_state(&cli.serve)?;
            let report = restore_accounts(&state).await?;
            info!(
                restored = ?report.restored,
                failed = ?report.failed,
                "restore finished"
            );
            Ok(())
        }
        Some(Command::Serve) | None => run_server(cli.serve).await,
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_state(args: &ServeArgs) -> anyhow::Result<AppState> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => warn!(hint = %hint, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    info!(
        config_path = ?config.metadata.config_path,
        env_file_loaded = config.metadata.env_file_loaded,
        "configuration loaded"
    );

    production_state(config)
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let state = build_state(&args)?;
    ProdStartupHooks.run(&state).await?;

    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    )
    .parse()
    .context("invalid server address")?;

    let app = routes::create_api_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Kore listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}
