// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster-wide removal of resources the operator no longer claims.
//!
//! A [`Cleaner`] evaluates its [`CleanTypeRetriever`] and deletes, across every
//! namespace, each object of every resolved resource type that carries the required
//! labels. It runs once per leadership tenure.
//!
//! # Deletion Strategy
//!
//! 1. `DeleteCollection` with the label selector, cluster-wide
//! 2. If the server answers "method not supported" (e.g. Services), list with the same
//!    selector and delete each object in its own namespace
//!
//! A failure on any resource type aborts the pass. [`Runnable::start`] retries the
//! whole pass with `2^attempt` second backoff and never reports a cleanup failure to
//! the manager.

pub mod client;
pub mod retriever;

use crate::constants::DEFAULT_CLEANER_MAX_RETRIES;
use crate::errors::{CleanerError, ClientError, RunError};
use crate::mapper::RestMapper;
use crate::metrics;
use crate::reconcilers::retry::cleaner_backoff;
use crate::runtime::{Manager, Runnable};
use crate::selector::{matches_labels, to_label_selector};
use async_trait::async_trait;
use client::{CleanupClient, KubeCleanupClient};
use retriever::{CleanType, CleanTypeRetriever};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Deletes every labeled object of the retriever's resource types.
pub struct Cleaner {
    name: String,
    client: Arc<dyn CleanupClient>,
    mapper: Arc<dyn RestMapper>,
    retriever: CleanTypeRetriever,
    max_retries: u32,
}

impl Cleaner {
    /// Create a cleaner.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Config`] if `name` is empty.
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn CleanupClient>,
        mapper: Arc<dyn RestMapper>,
        retriever: CleanTypeRetriever,
    ) -> Result<Self, CleanerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CleanerError::Config("cleaner name is empty".to_string()));
        }

        Ok(Self {
            name,
            client,
            mapper,
            retriever,
            max_retries: DEFAULT_CLEANER_MAX_RETRIES,
        })
    }

    /// Override the number of retries after the first failed pass.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Build a cleaner on the manager's client and mapper and register it as a
    /// leader-elected runnable.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Config`] if `name` is empty.
    pub fn register(
        manager: &mut Manager,
        name: &str,
        retriever: CleanTypeRetriever,
        max_retries: u32,
    ) -> Result<(), CleanerError> {
        let client = Arc::new(KubeCleanupClient::new(manager.client()));
        let cleaner =
            Self::new(name, client, manager.rest_mapper(), retriever)?.with_max_retries(max_retries);
        info!(cleaner = %name, scope = %cleaner.retriever, "Registering cleaner");
        manager.add(Arc::new(cleaner));
        Ok(())
    }

    /// Retries allowed after the first failed pass.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Clean passes attempted per leadership tenure before giving up.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Run one clean pass.
    ///
    /// Every selector is built before the first API call, so an invalid label fails
    /// the pass without touching the cluster.
    ///
    /// # Errors
    ///
    /// - [`CleanerError::Retrieve`] if a kind cannot be resolved
    /// - [`CleanerError::Selector`] if a label set is not a valid selector
    /// - [`CleanerError::Clean`] for the first resource type whose deletion fails
    pub async fn clean(&self) -> Result<(), CleanerError> {
        let clean_types = self.retriever.retrieve(self.mapper.as_ref()).await?;
        let selectors = clean_types
            .iter()
            .map(|clean_type| to_label_selector(&clean_type.labels))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            cleaner = %self.name,
            clean_types = clean_types.len(),
            "Resolved clean types"
        );

        for (clean_type, selector) in clean_types.iter().zip(&selectors) {
            self.clean_type(clean_type, selector)
                .await
                .map_err(|source| CleanerError::Clean {
                    gvr: clean_type.gvr.to_string(),
                    source,
                })?;
        }

        Ok(())
    }

    async fn clean_type(&self, clean_type: &CleanType, selector: &str) -> Result<(), ClientError> {
        let gvr = &clean_type.gvr;

        match self.client.delete_collection(gvr, selector).await {
            Ok(()) => {
                debug!(cleaner = %self.name, gvr = %gvr, selector = %selector, "Deleted collection");
                metrics::record_cleaner_deletion(&self.name, "collection");
                return Ok(());
            }
            Err(e) if e.is_method_not_supported() => {
                debug!(
                    cleaner = %self.name,
                    gvr = %gvr,
                    "DeleteCollection not supported, deleting objects individually"
                );
            }
            Err(e) => return Err(e),
        }

        let objects = self.client.list(gvr, selector).await?;
        for object in objects {
            if !matches_labels(&clean_type.labels, &object.labels) {
                warn!(
                    cleaner = %self.name,
                    gvr = %gvr,
                    namespace = %object.namespace,
                    name = %object.name,
                    "Listed object lacks required labels, skipping"
                );
                continue;
            }

            match self.client.delete(gvr, &object.namespace, &object.name).await {
                Ok(()) => {
                    debug!(
                        cleaner = %self.name,
                        gvr = %gvr,
                        namespace = %object.namespace,
                        name = %object.name,
                        "Deleted object"
                    );
                    metrics::record_cleaner_deletion(&self.name, "individual");
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Runnable for Cleaner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, shutdown: CancellationToken) -> Result<(), RunError> {
        info!(cleaner = %self.name, max_attempts = self.max_attempts(), "Starting cleaner");
        let mut backoff = cleaner_backoff();

        for attempt in 0..=self.max_retries {
            let result = tokio::select! {
                biased;
                () = shutdown.cancelled() => return Err(RunError::Cancelled),
                result = self.clean() => result,
            };

            match result {
                Ok(()) => {
                    info!(cleaner = %self.name, attempt, "Cleaning complete");
                    metrics::record_cleaner_run(&self.name, true);
                    return Ok(());
                }
                Err(e) => {
                    metrics::record_cleaner_run(&self.name, false);
                    if attempt == self.max_retries {
                        error!(
                            cleaner = %self.name,
                            attempts = self.max_attempts(),
                            error = %e,
                            "Cleaning failed, giving up until next leadership"
                        );
                        break;
                    }

                    let delay = backoff.next_backoff();
                    warn!(
                        cleaner = %self.name,
                        attempt,
                        error = %e,
                        retry_in = ?delay,
                        "Cleaning failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = shutdown.cancelled() => return Err(RunError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
