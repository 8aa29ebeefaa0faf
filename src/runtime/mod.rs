// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle hosting for long-running operator tasks.
//!
//! A [`Runnable`] is a task the process starts once and that runs until it finishes or
//! is cancelled. Runnables that declare [`Runnable::need_leader_election`] are only
//! started on the replica holding the leader lease, and only after it acquires the
//! lease; standby replicas never start them.
//!
//! # Leadership state machine
//!
//! ```text
//!            Elected                 Deposed / Shutdown
//! Standby ───────────────▶ Leading ─────────────────────▶ ShuttingDown
//!    │                                                         ▲
//!    └──────────────────────── Shutdown ───────────────────────┘
//! ```
//!
//! Only the `Standby → Leading` transition starts leader-gated runnables. Losing the
//! lease ends the process' tenure: every runnable is cancelled and
//! [`RunError::LeadershipLost`] is returned so the process restarts as a standby.

pub mod leader;

use crate::errors::RunError;
use crate::mapper::RestMapper;
use crate::metrics;
use async_trait::async_trait;
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A task hosted by the [`Manager`].
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether the task may only run on the elected leader.
    fn need_leader_election(&self) -> bool {
        true
    }

    /// Run the task until it completes or `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Cancelled`] when stopped by cancellation, or another
    /// [`RunError`] for unexpected failures.
    async fn start(&self, shutdown: CancellationToken) -> Result<(), RunError>;
}

/// Leadership state of this replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderState {
    /// Not (yet) the leader; leader-gated runnables are not running
    Standby,
    /// Holding the lease; leader-gated runnables are running
    Leading,
    /// Terminal: runnables are being cancelled
    ShuttingDown,
}

/// Input to the leadership state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderEvent {
    /// The lease was acquired (or is still held)
    Elected,
    /// The lease is not held
    Deposed,
    /// The process is stopping
    Shutdown,
}

impl LeaderState {
    /// Apply `event`.
    #[must_use]
    pub fn transition(self, event: LeaderEvent) -> Self {
        match (self, event) {
            (Self::ShuttingDown, _) | (_, LeaderEvent::Shutdown) | (Self::Leading, LeaderEvent::Deposed) => {
                Self::ShuttingDown
            }
            (Self::Standby, LeaderEvent::Elected) | (Self::Leading, LeaderEvent::Elected) => {
                Self::Leading
            }
            (Self::Standby, LeaderEvent::Deposed) => Self::Standby,
        }
    }
}

/// Starts runnables and gates the leader-only ones on leadership.
pub struct RunnableGroup {
    identity: String,
    runnables: Vec<Arc<dyn Runnable>>,
    shutdown_timeout: Duration,
}

impl RunnableGroup {
    /// Create an empty group for the replica named `identity` that waits up to
    /// `shutdown_timeout` for runnables to stop.
    #[must_use]
    pub fn new(identity: impl Into<String>, shutdown_timeout: Duration) -> Self {
        Self {
            identity: identity.into(),
            runnables: Vec::new(),
            shutdown_timeout,
        }
    }

    /// Register a runnable. Nothing starts until [`run`](Self::run).
    pub fn add(&mut self, runnable: Arc<dyn Runnable>) {
        debug!(
            runnable = runnable.name(),
            leader_election = runnable.need_leader_election(),
            "Registered runnable"
        );
        self.runnables.push(runnable);
    }

    /// Number of registered runnables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runnables.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runnables.is_empty()
    }

    /// Run every registered runnable until shutdown.
    ///
    /// `leadership` carries `true` while this replica holds the leader lease.
    ///
    /// # Errors
    ///
    /// - [`RunError::LeadershipLost`] if the lease is lost after being acquired
    /// - [`RunError::ElectionEnded`] if the leadership channel closes, in any state
    /// - [`RunError::RunnableFailed`] if a runnable fails with anything but cancellation
    ///
    /// Returns `Ok(())` when `shutdown` is cancelled.
    #[allow(clippy::too_many_lines)]
    pub async fn run(
        self,
        shutdown: CancellationToken,
        mut leadership: watch::Receiver<bool>,
    ) -> Result<(), RunError> {
        let runnables_token = CancellationToken::new();
        let identity = self.identity;
        let mut tasks: JoinSet<(String, Result<(), RunError>)> = JoinSet::new();
        let (mut leader_gated, always): (Vec<_>, Vec<_>) = self
            .runnables
            .into_iter()
            .partition(|r| r.need_leader_election());

        for runnable in always {
            spawn_runnable(&mut tasks, runnable, runnables_token.clone());
        }

        let mut state = LeaderState::Standby;

        if *leadership.borrow_and_update() {
            state = state.transition(LeaderEvent::Elected);
            info!("Acquired leadership, starting leader-elected runnables");
            metrics::record_leader_elected(&identity);
            for runnable in leader_gated.drain(..) {
                spawn_runnable(&mut tasks, runnable, runnables_token.clone());
            }
        }

        let outcome = loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    state = state.transition(LeaderEvent::Shutdown);
                    info!("Shutdown requested, stopping runnables");
                    break Ok(());
                }
                changed = leadership.changed() => {
                    if changed.is_err() {
                        error!(state = ?state, "Leader election ended, stopping runnables");
                        if state == LeaderState::Leading {
                            metrics::record_leader_lost(&identity);
                        }
                        state = state.transition(LeaderEvent::Shutdown);
                        break Err(RunError::ElectionEnded);
                    }
                    let event = if *leadership.borrow_and_update() {
                        LeaderEvent::Elected
                    } else {
                        LeaderEvent::Deposed
                    };
                    let next = state.transition(event);
                    match (state, next) {
                        (LeaderState::Standby, LeaderState::Leading) => {
                            info!("Acquired leadership, starting leader-elected runnables");
                            metrics::record_leader_elected(&identity);
                            for runnable in leader_gated.drain(..) {
                                spawn_runnable(&mut tasks, runnable, runnables_token.clone());
                            }
                        }
                        (LeaderState::Leading, LeaderState::ShuttingDown) => {
                            error!("Leadership lost, stopping runnables");
                            metrics::record_leader_lost(&identity);
                            state = next;
                            break Err(RunError::LeadershipLost);
                        }
                        _ => {}
                    }
                    state = next;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    match joined {
                        Ok((name, Ok(()))) => info!(runnable = %name, "Runnable finished"),
                        Ok((name, Err(e))) if e.is_cancelled() => {
                            debug!(runnable = %name, "Runnable cancelled");
                        }
                        Ok((name, Err(e))) => {
                            error!(runnable = %name, error = %e, "Runnable failed");
                            break Err(RunError::RunnableFailed {
                                name,
                                reason: e.to_string(),
                            });
                        }
                        Err(join_error) => {
                            error!(error = %join_error, "Runnable task panicked");
                            break Err(RunError::RunnableFailed {
                                name: "unknown".to_string(),
                                reason: join_error.to_string(),
                            });
                        }
                    }
                }
            }
        };

        debug!(state = ?state, remaining = tasks.len(), "Cancelling runnables");
        runnables_token.cancel();

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                if let Ok((name, Err(e))) = joined {
                    if !e.is_cancelled() {
                        warn!(runnable = %name, error = %e, "Runnable failed during shutdown");
                    }
                }
            }
        };
        if tokio::time::timeout(self.shutdown_timeout, drain).await.is_err() {
            warn!(
                timeout = ?self.shutdown_timeout,
                "Runnables did not stop in time, aborting"
            );
            tasks.abort_all();
        }

        outcome
    }
}

fn spawn_runnable(
    tasks: &mut JoinSet<(String, Result<(), RunError>)>,
    runnable: Arc<dyn Runnable>,
    token: CancellationToken,
) {
    info!(runnable = runnable.name(), "Starting runnable");
    tasks.spawn(async move {
        let result = runnable.start(token).await;
        (runnable.name().to_string(), result)
    });
}

/// Process-wide host for runnables plus the cluster handles they are built from.
pub struct Manager {
    client: Client,
    mapper: Arc<dyn RestMapper>,
    group: RunnableGroup,
}

impl Manager {
    /// Create a manager around a kube client and REST mapper.
    #[must_use]
    pub fn new(
        client: Client,
        mapper: Arc<dyn RestMapper>,
        identity: impl Into<String>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            client,
            mapper,
            group: RunnableGroup::new(identity, shutdown_timeout),
        }
    }

    /// The kube client runnables should use.
    #[must_use]
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// The shared REST mapper.
    #[must_use]
    pub fn rest_mapper(&self) -> Arc<dyn RestMapper> {
        self.mapper.clone()
    }

    /// Register a runnable.
    pub fn add(&mut self, runnable: Arc<dyn Runnable>) {
        self.group.add(runnable);
    }

    /// Run every registered runnable; see [`RunnableGroup::run`].
    ///
    /// # Errors
    ///
    /// Propagates [`RunnableGroup::run`] errors.
    pub async fn run(
        self,
        shutdown: CancellationToken,
        leadership: watch::Receiver<bool>,
    ) -> Result<(), RunError> {
        info!(runnables = self.group.len(), "Starting manager");
        self.group.run(shutdown, leadership).await
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
