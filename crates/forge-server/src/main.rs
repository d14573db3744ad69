//! Forge Connector server entry point.
//!
//! Opens the storage backend, builds the shared state, then starts the Axum
//! HTTP server with graceful shutdown. A background sweeper purges expired
//! CTA cache entries and is cancelled on shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use forge_server::build_router;
use forge_server::config::{ServerConfig, StorageBackendType};
use forge_core::error::ConnectError;
use forge_server::state::{AppState, CtaCache};
use forge_storage::{MemoryBackend, StorageBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(storage = ?config.storage_backend, api_url = %config.api_url, "Forge Connector starting");

    let storage = open_storage(&config)?;
    let state = Arc::new(
        AppState::new(&config, storage).context("failed to build the download client")?,
    );

    match state.connection.test_connection().await {
        Ok(status) => {
            info!(site_id = ?status.forge_site_id, connected_at = ?status.connected_at, "connected to Forge");
        }
        Err(ConnectError::NotConnected) => info!("no Forge connection yet; waiting for handshake"),
        Err(e) => warn!(error = %e, "stored Forge connection is unusable"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper_handle = {
        let cache = Arc::clone(&state.ctas);
        let mut rx = shutdown_rx.clone();
        let interval = config.cache_sweep_interval;
        tokio::spawn(async move {
            cache_sweeper(cache, &mut rx, interval).await;
        })
    };

    let app = build_router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Forge Connector listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    info!("waiting for background workers to stop");
    let _ = tokio::time::timeout(Duration::from_secs(10), sweeper_handle).await;

    info!("Forge Connector stopped");
    Ok(())
}

fn open_storage(config: &ServerConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match &config.storage_backend {
        StorageBackendType::Memory => {
            info!("using in-memory storage (data will not persist)");
            Ok(Arc::new(MemoryBackend::new()))
        }
        #[cfg(feature = "redb-backend")]
        StorageBackendType::Redb { path } => {
            info!(path = %path, "using redb storage");
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create storage directory {}", parent.display())
                    })?;
                }
            }
            Ok(Arc::new(
                forge_storage::RedbBackend::open(path).context("failed to open redb storage")?,
            ))
        }
        #[cfg(not(feature = "redb-backend"))]
        StorageBackendType::Redb { .. } => {
            anyhow::bail!("redb backend requested but feature 'redb-backend' is not enabled");
        }
    }
}

/// Periodically drop expired CTA cache entries until shutdown.
async fn cache_sweeper(cache: Arc<CtaCache>, shutdown: &mut watch::Receiver<bool>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    info!(interval_secs = every.as_secs(), "CTA cache sweeper started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = cache.purge_expired().await;
                if removed > 0 {
                    debug!(removed, "purged expired CTA cache entries");
                }
            }
            _ = shutdown.changed() => {
                info!("CTA cache sweeper shutting down");
                return;
            }
        }
    }
}

/// Wait for SIGINT or SIGTERM, then broadcast shutdown.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
    let _ = shutdown_tx.send(true);
}
