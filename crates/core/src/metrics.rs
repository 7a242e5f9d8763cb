//! Prometheus metrics for the matchmaker.
//!
//! Covers the ticket lifecycle, the per-round matcher work and dispatch
//! outcomes. The host registers everything through [`all_metrics`].

use once_cell::sync::Lazy;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
};

// =============================================================================
// Ticket lifecycle
// =============================================================================

/// Tickets accepted by add.
pub static TICKETS_ADDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("rallypoint_tickets_added_total", "Total tickets added").unwrap()
});

/// Tickets removed, by reason.
pub static TICKETS_REMOVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("rallypoint_tickets_removed_total", "Total tickets removed"),
        &["reason"], // "matched", "expired", "session", "party"
    )
    .unwrap()
});

/// Tickets currently held in the store.
pub static TICKETS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "rallypoint_tickets_active",
        "Number of tickets currently in the store",
    )
    .unwrap()
});

// =============================================================================
// Matcher rounds
// =============================================================================

/// Process rounds completed.
pub static PROCESS_ROUNDS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "rallypoint_process_rounds_total",
        "Total matcher rounds completed",
    )
    .unwrap()
});

/// Process round duration in seconds.
pub static PROCESS_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "rallypoint_process_duration_seconds",
            "Duration of matcher rounds",
        )
        .buckets(vec![
            0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0,
        ]),
    )
    .unwrap()
});

/// Candidates retrieved per outer-loop ticket.
pub static CANDIDATES_RETRIEVED: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "rallypoint_candidates_retrieved",
            "Candidates retrieved per outer-loop ticket",
        )
        .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
    )
    .unwrap()
});

/// Proposed groups rejected, by reason.
pub static GROUPS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "rallypoint_groups_rejected_total",
            "Proposed match groups rejected",
        ),
        &["reason"], // "mutual", "decider", "vanished"
    )
    .unwrap()
});

// =============================================================================
// Matches and dispatch
// =============================================================================

/// Matches formed, by kind.
pub static MATCHES_FORMED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("rallypoint_matches_formed_total", "Total matches formed"),
        &["kind"], // "relayed", "authoritative"
    )
    .unwrap()
});

/// Matched group sizes in presences.
pub static MATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("rallypoint_match_size", "Presences per formed match")
            .buckets(vec![2.0, 3.0, 4.0, 6.0, 8.0, 10.0, 16.0]),
    )
    .unwrap()
});

/// Dispatch failures, by collaborator.
pub static DISPATCH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "rallypoint_dispatch_failures_total",
            "Failures while notifying collaborators",
        ),
        &["target"], // "router", "registry"
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

/// Get all matchmaker metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TICKETS_ADDED.clone()),
        Box::new(TICKETS_REMOVED.clone()),
        Box::new(TICKETS_ACTIVE.clone()),
        Box::new(PROCESS_ROUNDS.clone()),
        Box::new(PROCESS_DURATION.clone()),
        Box::new(CANDIDATES_RETRIEVED.clone()),
        Box::new(GROUPS_REJECTED.clone()),
        Box::new(MATCHES_FORMED.clone()),
        Box::new(MATCH_SIZE.clone()),
        Box::new(DISPATCH_FAILURES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_cleanly() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        TICKETS_ADDED.inc();
        MATCHES_FORMED.with_label_values(&["relayed"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "rallypoint_tickets_added_total"));
    }
}
