// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label constants and the ownership label set.
//!
//! Every object the operator writes is tagged with an [`OwnershipLabels`] set. The
//! same set is what the cleaner selects on when it garbage-collects objects that the
//! operator no longer claims, so the label set is passed explicitly to each component
//! instead of being read from a shared global.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture (e.g., "nginx", "external-dns")
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the current version of the application
pub const K8S_VERSION: &str = "app.kubernetes.io/version";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of` indicating this resource is part of app routing
pub const PART_OF_APP_ROUTING: &str = "app-routing";

/// Component value for operator-global objects (namespace, ingress class)
pub const COMPONENT_STATIC: &str = "operator-static";

/// Component value for the single ExternalDNS deployment shipped by earlier releases
pub const COMPONENT_LEGACY_EXTERNAL_DNS: &str = "legacy-external-dns";

/// The set of labels that marks an object as owned by one operator component.
///
/// `version` is optional: objects written without it are matched by any cleanup
/// scope that does not ask for a version, while a versioned scope only matches
/// objects written by that exact release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipLabels {
    /// Value of `app.kubernetes.io/managed-by`
    pub managed_by: String,
    /// Value of `app.kubernetes.io/component`
    pub component: String,
    /// Value of `app.kubernetes.io/version`, when versioned
    pub version: Option<String>,
}

impl OwnershipLabels {
    /// Create an unversioned label set.
    #[must_use]
    pub fn new(managed_by: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            managed_by: managed_by.into(),
            component: component.into(),
            version: None,
        }
    }

    /// Return the same label set pinned to a release version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Render the label set as a Kubernetes label map.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(K8S_MANAGED_BY.to_string(), self.managed_by.clone());
        labels.insert(K8S_COMPONENT.to_string(), self.component.clone());
        if let Some(version) = &self.version {
            labels.insert(K8S_VERSION.to_string(), version.clone());
        }
        labels
    }

    /// Merge the label set into an object's metadata, overwriting conflicting keys.
    pub fn apply_to(&self, meta: &mut ObjectMeta) {
        let labels = meta.labels.get_or_insert_with(BTreeMap::new);
        labels.extend(self.to_map());
        labels.insert(K8S_PART_OF.to_string(), PART_OF_APP_ROUTING.to_string());
    }
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
