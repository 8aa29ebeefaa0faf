// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lease-based leader election.
//!
//! Produces the `watch::Receiver<bool>` consumed by [`Manager::run`](super::Manager::run).
//! When election is disabled the channel is permanently `true`.

use crate::constants::GRACEFUL_SHUTDOWN_TIMEOUT_SECS;
use kube::Client;
use kube_lease_manager::{LeaseManager, LeaseManagerBuilder};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Settings for leader election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderElectionConfig {
    /// Whether to elect a leader at all
    pub enabled: bool,
    /// Namespace holding the `Lease`
    pub namespace: String,
    /// `Lease` name
    pub lease_name: String,
    /// Identity written into the lease, normally the pod name
    pub identity: String,
    /// Lease duration in seconds
    pub lease_duration_secs: u64,
    /// Seconds before expiry at which the holder renews
    pub grace_secs: u64,
}

/// A running leader election.
pub struct LeaderElection {
    receiver: watch::Receiver<bool>,
    task: Option<JoinHandle<kube_lease_manager::Result<LeaseManager>>>,
    // Keeps the always-leader channel open when election is disabled.
    _sender: Option<watch::Sender<bool>>,
}

impl LeaderElection {
    /// Start leader election according to `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lease manager cannot be created.
    pub async fn start(
        client: Client,
        config: &LeaderElectionConfig,
    ) -> kube_lease_manager::Result<Self> {
        if !config.enabled {
            warn!("Leader election DISABLED - running without high availability");
            let (sender, receiver) = watch::channel(true);
            return Ok(Self {
                receiver,
                task: None,
                _sender: Some(sender),
            });
        }

        info!(
            lease_name = %config.lease_name,
            namespace = %config.namespace,
            identity = %config.identity,
            lease_duration_secs = config.lease_duration_secs,
            grace_secs = config.grace_secs,
            "Leader election enabled"
        );

        let manager = LeaseManagerBuilder::new(client, &config.lease_name)
            .with_namespace(&config.namespace)
            .with_identity(&config.identity)
            .with_duration(config.lease_duration_secs)
            .with_grace(config.grace_secs)
            .build()
            .await?;

        let (receiver, task) = manager.watch().await;
        Ok(Self {
            receiver,
            task: Some(task),
            _sender: None,
        })
    }

    /// A receiver that is `true` while this replica is the leader.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.receiver.clone()
    }

    /// Stop participating in the election.
    ///
    /// The lease task ends once every receiver is dropped, so callers should drop the
    /// receivers handed out by [`subscribe`](Self::subscribe) first.
    pub async fn stop(self) {
        drop(self.receiver);
        let Some(task) = self.task else {
            return;
        };
        match tokio::time::timeout(Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS), task).await
        {
            Ok(Ok(Ok(_))) => info!("Leader election stopped"),
            Ok(Ok(Err(e))) => warn!(error = %e, "Leader election ended with an error"),
            Ok(Err(e)) => warn!(error = %e, "Leader election task panicked"),
            Err(_) => warn!("Timed out waiting for leader election to stop"),
        }
    }
}
