//! acm-measure: acoustic measurement task service
//!
//! Runs batch Praat measurements over uploaded CSV target lists as named,
//! cancellable background tasks, monitored over HTTP and SSE.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use acm_common::config;
use acm_common::events::EventBus;
use acm_measure::db::{self, SqliteAttributeStore, SqliteMediaLocator};
use acm_measure::measure::PraatRunner;
use acm_measure::tasks::{spawn_reaper, TaskRegistry};
use acm_measure::AppState;

/// Command-line arguments for acm-measure
#[derive(Parser, Debug)]
#[command(name = "acm-measure")]
#[command(about = "Acoustic measurement task service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder holding the database, uploads, media and results
    #[arg(short, long, env = "ACM_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to listen on (overrides [server] bind)
    #[arg(short, long, env = "ACM_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::resolve_config_path(args.config.as_deref());
    let toml_config = config::load_toml_config(config_path.as_deref())?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting acm-measure v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config: {}", path.display());
    }

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    for dir in ["uploads", "results", "media"] {
        std::fs::create_dir_all(root_folder.join(dir))
            .with_context(|| format!("Failed to create {}", root_folder.join(dir).display()))?;
    }
    info!("Root folder: {}", root_folder.display());

    let db_path = root_folder.join("acm.db");
    let pool = db::init_database_pool(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    let runner = PraatRunner::locate(&config::resolve_praat_path(&toml_config));
    if runner.is_available() {
        info!("Praat: {}", runner.executable().display());
    } else {
        warn!(
            "Praat not found at {}; measurements needing audio analysis will fail",
            runner.executable().display()
        );
    }

    let event_bus = EventBus::new(256);
    let registry = TaskRegistry::new(event_bus, toml_config.tasks.idle_timeout());
    let shutdown = CancellationToken::new();
    let reaper = spawn_reaper(
        registry.clone(),
        toml_config.tasks.reaper_interval(),
        shutdown.clone(),
    );

    let state = AppState::new(
        registry,
        Arc::new(SqliteAttributeStore::new(pool.clone())),
        Arc::new(SqliteMediaLocator::new(pool.clone(), root_folder.join("media"))),
        Arc::new(runner),
        toml_config.measurement.clone(),
        root_folder,
    );
    let app = acm_measure::build_router(state);

    let bind = args.bind.unwrap_or_else(|| toml_config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = reaper.await {
        warn!("Reaper task ended abnormally: {}", e);
    }
    pool.close().await;

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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
