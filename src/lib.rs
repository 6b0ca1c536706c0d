pub mod types;
pub mod config;
pub mod error;
pub mod stations;
pub mod roster;
pub mod teams;
pub mod waves;
pub mod leaderboard;
pub mod store;
pub mod event;
pub mod auth;
pub mod server;

use config::*;
use server::{router, shutdown_signal, AppState};
use store::{DocumentStore, EventStore};

use std::{fs, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn serve(state: AppState, addr: &str) -> Result<(), String> {
    let app = router(state);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind {addr}: {e}"))?;
    info!("Trio Tag API listening at http://{addr}/api");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("server error: {e}"))?;
    info!("Server shut down");
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() -> Result<(), String> {
    // Initialize tracing with file + stderr output
    let logs_dir = repo_root().join("logs");
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "trio-tag.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Trio Tag starting");
    let applied = load_env_file();
    if applied > 0 {
        info!("Applied {applied} variables from .env");
    }

    let config = load_config_inner()?;
    log_env_warnings(&config);

    let store: Arc<dyn EventStore> = match config.data_path() {
        Some(path) => Arc::new(DocumentStore::open(path).map_err(|e| e.to_string())?),
        None => Arc::new(DocumentStore::in_memory()),
    };
    let addr = config.bind_addr.clone();
    info!(
        "Route has {} stations: {}",
        config.station_catalog().len(),
        config.station_catalog().names().join(", ")
    );
    let state = AppState::new(config, store);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("tokio runtime: {e}"))?;
    let result = runtime.block_on(serve(state, &addr));
    if let Err(e) = &result {
        error!("{e}");
    }
    result
}
