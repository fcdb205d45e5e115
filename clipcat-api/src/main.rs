//! clipcat-api - HTTP read service for the clip catalog
//!
//! Serves the clip list to bots and dashboards. Authentication uses bearer
//! tokens checked against a JSON Web Key Set; with no JWKS URL configured the
//! service runs open and says so in the log.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clipcat_api::cli::{bootstrap, ConfigArgs};
use clipcat_api::{build_router, AppState, JwksVerifier};
use clipcat_common::db::{DocumentStore, SqliteDocumentStore};
use clipcat_common::{ClipCatalog, PlaybackVolume};
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "clipcat-api")]
#[command(about = "HTTP read service for the clip catalog")]
#[command(version)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<String>,

    /// JSON Web Key Set URL for bearer token validation
    #[arg(long)]
    jwks_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut overrides = args.config.overrides();
    overrides.bind_address = args.bind.clone();
    overrides.jwks_url = args.jwks_url.clone();
    let settings = bootstrap(&args.config, overrides)?;

    info!(
        "Starting clipcat-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Database path: {}", settings.database_path.display());

    let store = match SqliteDocumentStore::connect(&settings.database_path).await {
        Ok(store) => {
            info!("✓ Connected to database");
            store
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    let volume = PlaybackVolume::new(Arc::clone(&store))
        .ensure()
        .await
        .context("Failed to initialize playback volume")?;
    info!("Playback volume: {}", volume);

    let verifier = JwksVerifier::from_settings(&settings.auth)
        .await
        .context("Failed to load JSON Web Key Set")?
        .map(Arc::new);
    if verifier.is_none() {
        warn!("No JWKS URL configured: API authentication disabled");
    }

    let state = AppState::new(ClipCatalog::new(Arc::clone(&store)), verifier);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_address))?;
    info!("clipcat-api listening on http://{}", settings.bind_address);
    info!("Health check: http://{}/health", settings.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
