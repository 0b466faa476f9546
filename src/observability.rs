use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: availability checks served (fast path).
pub const AVAILABILITY_CHECKS_TOTAL: &str = "stayd_availability_checks_total";

/// Counter: conflicts reported, fast check and authoritative re-check alike.
pub const CONFLICTS_TOTAL: &str = "stayd_conflicts_total";

/// Counter: bookings committed.
pub const BOOKINGS_CREATED_TOTAL: &str = "stayd_bookings_created_total";

/// Counter: bookings cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "stayd_bookings_cancelled_total";

// ── USE metrics (cache / tree) ──────────────────────────────────

/// Counter: tree served from a live cache entry.
pub const CACHE_HITS_TOTAL: &str = "stayd_cache_hits_total";

/// Counter: tree rebuilt from persisted bookings.
pub const CACHE_MISSES_TOTAL: &str = "stayd_cache_misses_total";

/// Counter: entries dropped by explicit invalidation.
pub const CACHE_INVALIDATIONS_TOTAL: &str = "stayd_cache_invalidations_total";

/// Histogram: tree rebuild duration in seconds.
pub const TREE_BUILD_DURATION_SECONDS: &str = "stayd_tree_build_duration_seconds";

/// Histogram: intervals per rebuilt tree.
pub const TREE_SIZE: &str = "stayd_tree_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
