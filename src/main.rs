//! taskcache server
//!
//! Serves the cache and the indexed document store over HTTP, with
//! background expiry sweeps and optional snapshot persistence.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskcache::api::{create_router, AppState};
use taskcache::{spawn_cleanup_task, spawn_snapshot_task, Config, IntelligentCache};

/// Main entry point for the taskcache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache (warmed from a snapshot if configured) and the store
/// 4. Start the expiry sweep and snapshot tasks
/// 5. Serve HTTP until SIGINT/SIGTERM
/// 6. Stop the tasks and write a final snapshot
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting taskcache server");

    let config = Config::from_env();
    info!(
        memory_limit_bytes = config.cache.memory_limit_bytes,
        default_ttl = config.cache.default_ttl,
        data_dir = %config.store.data_dir.display(),
        port = config.server_port,
        cleanup_interval = config.cleanup_interval,
        snapshot = ?config.snapshot_path,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config);
    info!(entries = state.cache.len(), "Cache initialized");

    let mut background = vec![spawn_cleanup_task(
        state.cache.clone(),
        Duration::from_secs(config.cleanup_interval.max(1)),
    )];
    if let Some(path) = &config.snapshot_path {
        background.push(spawn_snapshot_task(
            state.cache.clone(),
            path.clone(),
            Duration::from_secs(config.snapshot_interval.max(1)),
        ));
    }
    info!(tasks = background.len(), "Background tasks started");

    let cache = state.cache.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    for task in background {
        task.stop().await;
    }
    warn!("Background tasks stopped");

    if let Some(path) = config.snapshot_path {
        write_final_snapshot(cache, path).await;
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn write_final_snapshot(cache: Arc<IntelligentCache>, path: std::path::PathBuf) {
    let target = path.clone();
    match tokio::task::spawn_blocking(move || cache.save_snapshot(&target)).await {
        Ok(Ok(saved)) => info!(saved, path = %path.display(), "Final cache snapshot written"),
        Ok(Err(e)) => error!(error = %e, path = %path.display(), "Final cache snapshot failed"),
        Err(e) => error!(error = %e, "Final cache snapshot worker panicked"),
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
