// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Continuous convergence of a fixed list of desired objects.
//!
//! Every tick walks the list in order. Objects marked for deletion are deleted, with
//! failures logged and skipped; every other object is upserted, and the first upsert
//! failure aborts the tick. After a failed tick the next wait uses the short retry
//! interval instead of the steady-state one. Every wait is jittered by ±15%.

use crate::constants::{
    RESOURCE_RECONCILER_INITIAL_DELAY_NANOS, RESOURCE_RECONCILER_JITTER_RATIO,
    RESOURCE_RECONCILER_RETRY_INTERVAL_SECS,
};
use crate::errors::{ClientError, RunError};
use crate::metrics;
use crate::reconcilers::resources::{KubeObjectClient, ManagedObject, ObjectClient};
use crate::reconcilers::retry::jitter;
use crate::runtime::{Manager, Runnable};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Keeps a static set of objects applied (or deleted) in the cluster.
pub struct ResourceReconciler {
    name: String,
    client: Arc<dyn ObjectClient>,
    resources: Vec<ManagedObject>,
    interval: Duration,
    retry_interval: Duration,
}

impl ResourceReconciler {
    /// Create a reconciler with the fixed 1s retry interval.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn ObjectClient>,
        resources: Vec<ManagedObject>,
        interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            resources,
            interval,
            retry_interval: Duration::from_secs(RESOURCE_RECONCILER_RETRY_INTERVAL_SECS),
        }
    }

    /// Build a reconciler on the manager's client and register it as a leader-elected
    /// runnable.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] if `name` is empty.
    pub fn register(
        manager: &mut Manager,
        name: &str,
        resources: Vec<ManagedObject>,
        interval: Duration,
    ) -> Result<(), RunError> {
        if name.is_empty() {
            return Err(RunError::Config(
                "resource reconciler name is empty".to_string(),
            ));
        }

        let client = Arc::new(KubeObjectClient::new(manager.client()));
        info!(
            reconciler = %name,
            resources = resources.len(),
            interval = ?interval,
            "Registering resource reconciler"
        );
        manager.add(Arc::new(Self::new(name, client, resources, interval)));
        Ok(())
    }

    /// The steady-state interval between ticks.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The interval used after a failed tick.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Converge every object once.
    ///
    /// # Errors
    ///
    /// Returns the first upsert failure. Delete failures are logged only.
    pub async fn tick(&self) -> Result<(), ClientError> {
        for desired in &self.resources {
            // Each tick starts from the pristine desired object.
            let object = desired.clone();

            if object.is_marked_for_deletion() {
                match self.client.delete(&object).await {
                    Ok(()) => debug!(reconciler = %self.name, object = %object.describe(), "Deleted object"),
                    Err(e) if e.is_not_found() => {
                        debug!(reconciler = %self.name, object = %object.describe(), "Object already deleted");
                    }
                    Err(e) => {
                        warn!(
                            reconciler = %self.name,
                            object = %object.describe(),
                            error = %e,
                            "Failed to delete object, continuing"
                        );
                    }
                }
                continue;
            }

            self.client.upsert(&object).await.map_err(|e| {
                error!(
                    reconciler = %self.name,
                    object = %object.describe(),
                    error = %e,
                    "Failed to upsert object"
                );
                e
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl Runnable for ResourceReconciler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, shutdown: CancellationToken) -> Result<(), RunError> {
        info!(reconciler = %self.name, "Starting resource reconciler");
        let mut wait = Duration::from_nanos(RESOURCE_RECONCILER_INITIAL_DELAY_NANOS);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!(reconciler = %self.name, "Resource reconciler stopped");
                    return Err(RunError::Cancelled);
                }
                () = tokio::time::sleep(wait) => {}
            }

            let started = Instant::now();
            let result = self.tick().await;
            metrics::record_reconciler_tick(&self.name, result.is_ok(), started.elapsed());

            let base = match result {
                Ok(()) => {
                    debug!(reconciler = %self.name, "Reconciled resources");
                    self.interval
                }
                Err(e) => {
                    error!(
                        reconciler = %self.name,
                        error = %e,
                        retry_in = ?self.retry_interval,
                        "Resource reconciliation failed"
                    );
                    self.retry_interval
                }
            };
            wait = jitter(base, RESOURCE_RECONCILER_JITTER_RATIO);
        }
    }
}

#[cfg(test)]
#[path = "resource_reconciler_tests.rs"]
mod resource_reconciler_tests;
