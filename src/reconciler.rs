use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

/// Background task that finishes or rolls back half-applied confirmations.
pub async fn run_reconciler(engine: Arc<Engine>, every: Duration, grace: Duration) {
    let grace = match chrono::Duration::from_std(grace) {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(league = %engine.league_id(), "reconciler disabled, bad grace period: {e}");
            return;
        }
    };
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match engine.reconcile(grace).await {
            Ok(report) if report.examined > 0 => info!(
                league = %engine.league_id(),
                examined = report.examined,
                confirmed = report.confirmed,
                denied = report.denied,
                "reconciled approved claims"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!(league = %engine.league_id(), "reconcile failed: {e}"),
        }
    }
}

/// Background task that rewrites the WAL once enough appends have piled up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!(league = %engine.league_id(), appends, "compacted WAL"),
            Err(e) => tracing::error!(league = %engine.league_id(), "WAL compaction failed: {e}"),
        }
    }
}
