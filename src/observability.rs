use std::net::SocketAddr;

// ── Booking outcomes ────────────────────────────────────────────

/// Counter: direct-confirm claims. Labels: outcome.
pub const CLAIMS_TOTAL: &str = "slotswap_claims_total";

/// Counter: legacy approvals. Labels: outcome.
pub const APPROVALS_TOTAL: &str = "slotswap_approvals_total";

/// Counter: compare-and-swap writes rejected because the row moved. Labels: table.
pub const PRECONDITION_FAILURES_TOTAL: &str = "slotswap_precondition_failures_total";

/// Counter: pending claims denied by a post-confirm sweep.
pub const SWEEP_DENIALS_TOTAL: &str = "slotswap_sweep_denials_total";

/// Counter: reconciler actions. Labels: action.
pub const RECONCILE_TOTAL: &str = "slotswap_reconcile_total";

/// Histogram: claim latency in seconds.
pub const CLAIM_DURATION_SECONDS: &str = "slotswap_claim_duration_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Gauge: leagues with a loaded engine.
pub const LEAGUES_ACTIVE: &str = "slotswap_leagues_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotswap_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (records per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotswap_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), String> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus exporter: {e}"))?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
