use std::net::SocketAddr;

use crate::model::FailedRule;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: capacity evaluations run. Labels: outcome (clear | work | forklifts | docks).
pub const EVALUATIONS_TOTAL: &str = "muelle_evaluations_total";

/// Histogram: evaluation latency in seconds.
pub const EVALUATION_DURATION_SECONDS: &str = "muelle_evaluation_duration_seconds";

/// Counter: booking attempts. Labels: status (booked | capacity_conflict | concurrency_conflict).
pub const BOOKINGS_TOTAL: &str = "muelle_bookings_total";

/// Counter: commit-time re-checks retried after a lost race.
pub const BOOKING_RETRIES_TOTAL: &str = "muelle_booking_retries_total";

// ── Data quality ────────────────────────────────────────────────

/// Counter: stored records skipped for violating their own invariants.
/// Labels: entity (shift | appointment).
pub const INTEGRITY_SKIPS_TOTAL: &str = "muelle_integrity_skips_total";

/// Counter: overlapping capacity-shift pairs seen while resolving; the
/// contributions are summed but flagged for planner review.
pub const OVERLAPPING_SHIFTS_TOTAL: &str = "muelle_overlapping_shifts_total";

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

/// Map a failed rule to a short label for metrics.
pub fn rule_label(rule: FailedRule) -> &'static str {
    match rule {
        FailedRule::Work => "work",
        FailedRule::Forklifts => "forklifts",
        FailedRule::Docks => "docks",
    }
}
