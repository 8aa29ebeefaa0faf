// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the app-routing operator.
//!
//! All metrics carry the namespace prefix `app_routing_operator_`.
//!
//! # Metrics Categories
//!
//! - **Cleaner Metrics** - Clean passes and the deletion strategy used per resource
//! - **Resource Reconciler Metrics** - Tick outcomes and durations
//! - **Leader Election Metrics** - Track leadership state changes
//!
//! # Example
//!
//! ```rust,no_run
//! use app_routing_operator::metrics::record_cleaner_run;
//!
//! record_cleaner_run("stale-components", true);
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all operator metrics
const METRICS_NAMESPACE: &str = "app_routing_operator";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Cleaner Metrics
// ============================================================================

/// Total number of cleaner runs by cleaner name and result
///
/// Labels:
/// - `cleaner`: Name the cleaner was registered with
/// - `result`: Outcome (`success`, `error`)
pub static CLEANER_RUNS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cleaner_runs_total"),
        "Total number of cleaner passes by cleaner and result",
    );
    let counter = CounterVec::new(opts, &["cleaner", "result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of resource collections cleaned by strategy
///
/// Labels:
/// - `cleaner`: Name the cleaner was registered with
/// - `strategy`: `collection` for DeleteCollection, `individual` for the list fallback
pub static CLEANER_DELETIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cleaner_deletions_total"),
        "Total number of cleaned resources by cleaner and deletion strategy",
    );
    let counter = CounterVec::new(opts, &["cleaner", "strategy"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Resource Reconciler Metrics
// ============================================================================

/// Total number of reconciler ticks by reconciler name and result
///
/// Labels:
/// - `reconciler`: Name the reconciler was registered with
/// - `result`: Outcome (`success`, `error`)
pub static RESOURCE_RECONCILER_TICKS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resource_reconciler_ticks_total"),
        "Total number of resource reconciler ticks by reconciler and result",
    );
    let counter = CounterVec::new(opts, &["reconciler", "result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciler ticks in seconds
///
/// Labels:
/// - `reconciler`: Name the reconciler was registered with
pub static RESOURCE_RECONCILER_TICK_DURATION_SECONDS: LazyLock<HistogramVec> =
    LazyLock::new(|| {
        let opts = HistogramOpts::new(
            format!("{METRICS_NAMESPACE}_resource_reconciler_tick_duration_seconds"),
            "Duration of resource reconciler ticks in seconds",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
        let histogram = HistogramVec::new(opts, &["reconciler"]).unwrap();
        METRICS_REGISTRY
            .register(Box::new(histogram.clone()))
            .unwrap();
        histogram
    });

// ============================================================================
// Leader Election Metrics
// ============================================================================

/// Total number of leader election events
///
/// Labels:
/// - `status`: Event type (`acquired`, `lost`)
pub static LEADER_ELECTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_elections_total"),
        "Total number of leader election events by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Current leader election status
///
/// Labels:
/// - `identity`: Lease identity of this replica
///
/// Value: 1 if leader, 0 if follower
pub static LEADER_STATUS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_status"),
        "Current leader election status (1 = leader, 0 = follower)",
    );
    let gauge = GaugeVec::new(opts, &["identity"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

fn result_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Record the outcome of one clean pass
///
/// # Arguments
/// * `cleaner` - Cleaner name
/// * `success` - Whether the pass removed everything it was asked to
pub fn record_cleaner_run(cleaner: &str, success: bool) {
    CLEANER_RUNS_TOTAL
        .with_label_values(&[cleaner, result_label(success)])
        .inc();
}

/// Record one resource cleaned
///
/// # Arguments
/// * `cleaner` - Cleaner name
/// * `strategy` - `collection` or `individual`
pub fn record_cleaner_deletion(cleaner: &str, strategy: &str) {
    CLEANER_DELETIONS_TOTAL
        .with_label_values(&[cleaner, strategy])
        .inc();
}

/// Record one reconciler tick
///
/// # Arguments
/// * `reconciler` - Reconciler name
/// * `success` - Whether every upsert succeeded
/// * `duration` - Duration of the tick
pub fn record_reconciler_tick(reconciler: &str, success: bool, duration: Duration) {
    RESOURCE_RECONCILER_TICKS_TOTAL
        .with_label_values(&[reconciler, result_label(success)])
        .inc();
    RESOURCE_RECONCILER_TICK_DURATION_SECONDS
        .with_label_values(&[reconciler])
        .observe(duration.as_secs_f64());
}

/// Record leader election acquired
///
/// # Arguments
/// * `identity` - Identity of the replica that acquired leadership
pub fn record_leader_elected(identity: &str) {
    LEADER_ELECTIONS_TOTAL
        .with_label_values(&["acquired"])
        .inc();
    LEADER_STATUS.with_label_values(&[identity]).set(1.0);
}

/// Record leader election lost
///
/// # Arguments
/// * `identity` - Identity of the replica that lost leadership
pub fn record_leader_lost(identity: &str) {
    LEADER_ELECTIONS_TOTAL.with_label_values(&["lost"]).inc();
    LEADER_STATUS.with_label_values(&[identity]).set(0.0);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
