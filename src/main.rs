use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slotswap::api::{self, AppState};
use slotswap::config::Config;
use slotswap::field::InMemoryFieldDirectory;
use slotswap::league::LeagueManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    slotswap::observability::init(config.metrics_port)?;

    let fields = match &config.fields_file {
        Some(path) => InMemoryFieldDirectory::from_json_file(path)
            .map_err(|e| format!("loading field directory {}: {e}", path.display()))?,
        None => {
            tracing::warn!("SLOTSWAP_FIELDS_FILE not set, field directory is empty");
            InMemoryFieldDirectory::new()
        }
    };
    let field_count = fields.len();

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let leagues = LeagueManager::new(
        config.data_dir.clone(),
        config.compact_threshold,
        Arc::new(fields),
        config.engine,
    )
    .with_reconcile(config.reconcile_interval, config.reconcile_grace);
    let app = api::router(AppState {
        leagues: Arc::new(leagues),
    });

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("slotswap listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  fields: {field_count}");
    info!(
        "  approval: {:?}, conflict check {}",
        config.engine.approval_policy,
        if config.engine.approval_conflict_check { "on" } else { "off" }
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("slotswap stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM. In-flight requests are drained by axum.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining requests");
}
