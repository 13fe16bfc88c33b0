//! mvs-ui - MV Studio UI service
//!
//! Local HTTP/SSE service the browser talks to. Owns lyrics sectioning,
//! image job polling, toast notifications, queue progress and settings;
//! songs, images and rendering live in the orchestrator.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mvs_common::config::{load_toml_config, resolve_config_path, SettingsOverrides};
use mvs_common::events::EventBus;
use mvs_common::jobs::JobTracker;
use mvs_ui::services::{run_progress_stream, OrchestratorClient, SettingsStore};
use mvs_ui::AppState;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mvs-ui
#[derive(Parser, Debug)]
#[command(name = "mvs-ui")]
#[command(about = "MV Studio UI service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MVS_UI_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: std::net::IpAddr,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Orchestrator base URL for this run (not persisted)
    #[arg(long)]
    orchestrator_url: Option<String>,

    /// Do not subscribe to the orchestrator progress stream
    #[arg(long)]
    no_progress_stream: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    // Initialize tracing
    let default_filter = format!(
        "mvs_ui={level},mvs_common={level},tower_http=info",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting mvs-ui v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Config: {}", config_path.display());

    let mut overrides = SettingsOverrides::from_env();
    if let Some(url) = args.orchestrator_url {
        overrides.orchestrator_host = Some(url.trim().to_string());
    }
    if !overrides.is_empty() {
        info!("Host overrides apply to this run only and are not saved");
    }

    let port = args.port.unwrap_or(config.port);
    let settings = SettingsStore::new(config, Some(config_path)).with_overrides(overrides);
    let effective = settings.settings().await;
    effective.validate().context("Invalid settings")?;

    let client = OrchestratorClient::new(&effective.orchestrator_host)
        .context("Failed to create orchestrator client")?;
    info!("Orchestrator: {}", client.base_url());

    let event_bus = EventBus::new(256);
    let state = AppState::new(settings, client, event_bus);

    if !args.no_progress_stream {
        tokio::spawn(run_progress_stream(
            state.clients.clone(),
            state.progress.clone(),
            state.event_bus.clone(),
            state.jobs.shutdown_token(),
        ));
    }

    let jobs = state.jobs.clone();
    let app = mvs_ui::build_router(state);

    let addr = SocketAddr::new(args.bind, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(jobs))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
///
/// Cancels every background job, the progress stream and open SSE clients
/// so the server can drain.
async fn shutdown_signal(jobs: JobTracker) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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

    jobs.cancel_all();
}
