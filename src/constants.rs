// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the app-routing operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Operator Identity Constants
// ============================================================================

/// Name of the operator, used as the `app.kubernetes.io/managed-by` value
pub const OPERATOR_NAME: &str = "app-routing-operator";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "app-routing-operator";

/// Default namespace the operator runs in and manages workloads in
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "app-routing-system";

/// Default `IngressClass` name owned by the operator
pub const DEFAULT_INGRESS_CLASS_NAME: &str = "webapprouting.kubernetes.azure.com";

/// Earlier operator releases whose versioned static objects are cleaned up
pub const RETIRED_OPERATOR_VERSIONS: &[&str] = &["0.1.0", "0.2.0"];

/// Name shared by every object of the retired in-operator external-dns deployment
pub const LEGACY_EXTERNAL_DNS_NAME: &str = "external-dns";

/// Controller value written into the default `IngressClass`
pub const INGRESS_CLASS_CONTROLLER: &str = "k8s.io/ingress-nginx";

// ============================================================================
// Cleaner Constants
// ============================================================================

/// Default number of retries after the first failed clean pass
pub const DEFAULT_CLEANER_MAX_RETRIES: u32 = 3;

/// Base of the cleaner's exponential backoff (`base^attempt` seconds)
pub const CLEANER_BACKOFF_BASE: u64 = 2;

/// Page size used when listing objects in the list-then-delete fallback
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;

// ============================================================================
// Resource Reconciler Constants
// ============================================================================

/// Default steady-state interval between static resource reconciliations (5 minutes)
pub const DEFAULT_STATIC_RECONCILE_INTERVAL_SECS: u64 = 300;

/// Interval used after a failed tick (1 second)
pub const RESOURCE_RECONCILER_RETRY_INTERVAL_SECS: u64 = 1;

/// Delay before the first tick, so a newly elected leader converges immediately
pub const RESOURCE_RECONCILER_INITIAL_DELAY_NANOS: u64 = 1;

/// Jitter ratio applied to every reconciler wait (±15% around the interval)
pub const RESOURCE_RECONCILER_JITTER_RATIO: f64 = 0.3;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default lease name used for leader election
pub const DEFAULT_LEASE_NAME: &str = "app-routing-operator-leader";

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default grace period before lease expiry at which renewal starts (5 seconds)
pub const DEFAULT_LEASE_GRACE_SECS: u64 = 5;

/// Maximum time to wait for runnables to stop after cancellation (30 seconds)
pub const GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default bind address for the metrics and health endpoint
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";
