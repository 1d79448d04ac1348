//! StemDesk separation service (stemdesk-sp) - Main entry point
//!
//! Loads configuration, wires the external model collaborators, sweeps stale workspace
//! files and serves the HTTP API until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stemdesk_common::config::{load_toml_config, RootFolderInitializer, RootFolderResolver};
use stemdesk_sp::collaborators::Collaborators;
use stemdesk_sp::config::ServiceConfig;
use stemdesk_sp::workflow::retention::{run_sweep, spawn_periodic_sweep};
use stemdesk_sp::{build_router, AppState};

/// Command-line arguments for stemdesk-sp
#[derive(Parser, Debug)]
#[command(name = "stemdesk-sp")]
#[command(about = "Audio source separation service for StemDesk")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides `[server] port`)
    #[arg(short, long, env = "STEMDESK_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides `[server] host`)
    #[arg(long, env = "STEMDESK_HOST")]
    host: Option<String>,

    /// Root folder holding the `uploads` workspace
    #[arg(short, long, env = "STEMDESK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML config file (defaults to the per-user stemdesk-sp.toml)
    #[arg(short, long, env = "STEMDESK_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = RootFolderResolver::new("stemdesk-sp")
        .with_cli_arg(args.root_folder.clone())
        .with_config_path(args.config.clone());
    let config_path = resolver.config_file_path();
    let toml_config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    // Initialize tracing (RUST_LOG wins over the configured level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting StemDesk separation service");
    if config_path.exists() {
        info!("Config file: {}", config_path.display());
    } else {
        warn!("Config file {} not found, using compiled defaults", config_path.display());
    }

    let root_folder = resolver.resolve();
    let initializer = RootFolderInitializer::new(root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", root_folder.display());

    let config = ServiceConfig::from_toml(&toml_config, initializer.workspace_path());
    info!(
        sample_rate = config.sample_rate,
        segment_seconds = config.segment_seconds,
        concurrency = config.separation_concurrency,
        session_isolation = config.session_isolation,
        "Workspace: {}",
        config.workspace.display()
    );

    let collaborators =
        Collaborators::from_config(&toml_config.models).context("Failed to initialize model collaborators")?;

    let state = AppState::new(config, collaborators).context("Invalid pipeline configuration")?;

    // Reclaim files orphaned by a crash or forced kill
    let swept = run_sweep(state.store.clone(), state.locks.clone(), state.config.max_file_age).await;
    info!(files = swept.files, sessions = swept.sessions, "Startup sweep complete");

    let sweeper = spawn_periodic_sweep(
        state.store.clone(),
        state.locks.clone(),
        state.config.max_file_age,
        state.config.sweep_interval,
    );

    let store = state.store.clone();
    let purge_on_shutdown = state.config.purge_on_shutdown;
    let app = build_router(state);

    let host = args.host.unwrap_or(toml_config.server.host);
    let port = args.port.unwrap_or(toml_config.server.port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind to {}:{}", host, port))?;
    let addr: SocketAddr = listener.local_addr().context("Failed to read bound address")?;

    info!("Starting HTTP server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();

    if purge_on_shutdown {
        match store.purge_all() {
            Ok(removed) => info!(removed, "Purged workspace"),
            Err(e) => warn!("Workspace purge failed: {}", e),
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
