//! Breathe service - main entry point
//!
//! Loads configuration, builds the engine on the headless media backend and
//! serves the HTTP/SSE control surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use breathe_common::config::load_config;
use breathe_core::audio::HttpMediaBackend;
use breathe_core::narration::HttpProbe;
use breathe_core::{api, SharedState};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for breathe-core
#[derive(Parser, Debug)]
#[command(name = "breathe-core")]
#[command(about = "Breathing phase timer and audio playback engine")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "BREATHE_PORT")]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration errors refuse to start before anything else happens
    let (config, config_path) =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting breathe-core v{} ({} built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let port = args.port.unwrap_or(config.port);
    let probe_timeout = Duration::from_millis(config.narration.probe_timeout_ms);
    let backend = HttpMediaBackend::new(probe_timeout).context("Failed to build media backend")?;
    let probe = Arc::new(HttpProbe::new(probe_timeout).context("Failed to build clip probe")?);

    let state = Arc::new(SharedState::new(config, &backend, probe));
    info!(
        "Engine initialized with {} patterns",
        state.list_patterns().await.len()
    );
    state.activate_initial_persona().await;

    api::run(port, Arc::clone(&state), shutdown_signal())
        .await
        .context("Server error")?;

    state.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
}
