// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Group/Kind and Group/Version/Resource coordinates.
//!
//! A [`GroupKind`] names a kind independently of the API version it is served at. A
//! [`GroupVersionResource`] is the concrete, pluralized coordinate used to address a
//! collection on the API server. Resolving one to the other requires discovery; see
//! [`crate::mapper`].

use kube::api::ApiResource;
use std::fmt;

/// A version-agnostic kind, e.g. `Deployment.apps`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKind {
    /// API group (empty for the core group)
    pub group: String,
    /// Kind name
    pub kind: String,
}

impl GroupKind {
    /// Create a `GroupKind`.
    #[must_use]
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// A kind at a specific API version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionKind {
    /// API group (empty for the core group)
    pub group: String,
    /// API version
    pub version: String,
    /// Kind name
    pub kind: String,
}

impl GroupVersionKind {
    /// Create a `GroupVersionKind`.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Drop the version.
    #[must_use]
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.group.clone(), self.kind.clone())
    }
}

impl From<&ApiResource> for GroupVersionKind {
    fn from(ar: &ApiResource) -> Self {
        Self::new(ar.group.clone(), ar.version.clone(), ar.kind.clone())
    }
}

/// A concrete, listable and deletable API collection, e.g. `apps/v1/deployments`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersionResource {
    /// API group (empty for the core group)
    pub group: String,
    /// API version
    pub version: String,
    /// Plural resource name
    pub resource: String,
}

impl GroupVersionResource {
    /// Create a `GroupVersionResource`.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// The `apiVersion` string for this resource.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Build the kube `ApiResource` needed to address this collection dynamically.
    ///
    /// Only the group, version and plural are used to build request paths; `kind` is
    /// carried for logging.
    #[must_use]
    pub fn api_resource(&self, kind: &str) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: kind.to_string(),
            plural: self.resource.clone(),
        }
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.resource)
    }
}

#[cfg(test)]
#[path = "gvk_tests.rs"]
mod gvk_tests;
