// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! REST mapping: resolving abstract kinds to concrete API collections.
//!
//! A kind can be served at several API versions at once (for example while a CRD is
//! migrating between versions), each under its own plural resource. The cleaner has to
//! address every one of them, so [`RestMapper::rest_mappings`] returns all of them.
//!
//! # Implementations
//!
//! - [`DiscoveryRestMapper`] - backed by kube API discovery, cached and refreshed on a miss
//! - [`StaticRestMapper`] - a fixed table, for tests and discovery-less environments

use crate::errors::MappingError;
use crate::gvk::{GroupKind, GroupVersionKind, GroupVersionResource};
use async_trait::async_trait;
use kube::discovery::Discovery;
use kube::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One concrete resource serving a kind at one API version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestMapping {
    /// The collection coordinate
    pub resource: GroupVersionResource,
    /// The kind at this version
    pub kind: GroupVersionKind,
}

/// Resolves a [`GroupKind`] to every resource that serves it.
#[async_trait]
pub trait RestMapper: Send + Sync {
    /// Return one mapping per served API version of `gk`.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::NoMatch`] if the kind is unknown, or
    /// [`MappingError::Discovery`] if the mapping source could not be consulted.
    async fn rest_mappings(&self, gk: &GroupKind) -> Result<Vec<RestMapping>, MappingError>;
}

/// REST mapper backed by kube API discovery.
///
/// The discovery snapshot is taken lazily on first use and re-taken once whenever a
/// kind is missing from it, so CRDs installed after startup resolve without a restart.
pub struct DiscoveryRestMapper {
    client: Client,
    cache: RwLock<Option<Arc<Discovery>>>,
}

impl DiscoveryRestMapper {
    /// Create a mapper; no API calls are made until the first lookup.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: RwLock::new(None),
        }
    }

    async fn snapshot(&self, refresh: bool) -> Result<Arc<Discovery>, MappingError> {
        if !refresh {
            if let Some(discovery) = self.cache.read().await.as_ref() {
                return Ok(discovery.clone());
            }
        }

        let mut cache = self.cache.write().await;
        debug!(refresh, "Running API discovery");
        let discovery = Arc::new(
            Discovery::new(self.client.clone())
                .run()
                .await
                .map_err(MappingError::Discovery)?,
        );
        *cache = Some(discovery.clone());
        Ok(discovery)
    }
}

/// Collect every served version of `gk` from a discovery snapshot.
fn mappings_from_discovery(discovery: &Discovery, gk: &GroupKind) -> Vec<RestMapping> {
    let mut mappings = Vec::new();
    for group in discovery.groups().filter(|g| g.name() == gk.group) {
        for version in group.versions() {
            for (ar, _caps) in group.versioned_resources(version) {
                if ar.kind != gk.kind {
                    continue;
                }
                mappings.push(RestMapping {
                    resource: GroupVersionResource::new(&ar.group, &ar.version, &ar.plural),
                    kind: GroupVersionKind::from(&ar),
                });
            }
        }
    }
    mappings
}

#[async_trait]
impl RestMapper for DiscoveryRestMapper {
    async fn rest_mappings(&self, gk: &GroupKind) -> Result<Vec<RestMapping>, MappingError> {
        let mappings = mappings_from_discovery(&*self.snapshot(false).await?, gk);
        if !mappings.is_empty() {
            return Ok(mappings);
        }

        info!(kind = %gk, "Kind missing from discovery cache, refreshing");
        let mappings = mappings_from_discovery(&*self.snapshot(true).await?, gk);
        if mappings.is_empty() {
            return Err(MappingError::NoMatch(gk.clone()));
        }
        Ok(mappings)
    }
}

/// REST mapper resolving from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticRestMapper {
    mappings: HashMap<GroupKind, Vec<RestMapping>>,
}

impl StaticRestMapper {
    /// Create an empty mapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `kind` served at `group/version` under `plural`.
    #[must_use]
    pub fn with(
        mut self,
        group: &str,
        version: &str,
        kind: &str,
        plural: &str,
    ) -> Self {
        self.mappings
            .entry(GroupKind::new(group, kind))
            .or_default()
            .push(RestMapping {
                resource: GroupVersionResource::new(group, version, plural),
                kind: GroupVersionKind::new(group, version, kind),
            });
        self
    }
}

#[async_trait]
impl RestMapper for StaticRestMapper {
    async fn rest_mappings(&self, gk: &GroupKind) -> Result<Vec<RestMapping>, MappingError> {
        self.mappings
            .get(gk)
            .filter(|mappings| !mappings.is_empty())
            .cloned()
            .ok_or_else(|| MappingError::NoMatch(gk.clone()))
    }
}

#[cfg(test)]
#[path = "mapper_tests.rs"]
mod mapper_tests;
