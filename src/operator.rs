// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process-level wiring: what the operator keeps applied and what it cleans up.
//!
//! # Static resources
//!
//! Objects every installation needs regardless of user input: the managed namespace
//! and the default `IngressClass`. Objects of retired components are listed too,
//! marked for deletion, so upgraded clusters converge to the current layout.
//!
//! # Cleanup scope
//!
//! ```text
//!   gk[retired kinds]{legacy component labels}
//! + objs[static kinds]{labels of each retired release}
//! - objs[static kinds]{current labels}
//! -kinds gk[Namespace, IngressClass]
//! ```
//!
//! The namespace and the `IngressClass` keep a stable name across releases and are
//! relabeled in place by the resource reconciler, so they are never cleaned.

use crate::cleaner::retriever::{CleanTypeRetriever, CompareStrategy, RemoveOpts};
use crate::config::OperatorConfig;
use crate::constants::{
    INGRESS_CLASS_CONTROLLER, LEGACY_EXTERNAL_DNS_NAME, OPERATOR_NAME, RETIRED_OPERATOR_VERSIONS,
};
use crate::errors::ClientError;
use crate::gvk::GroupKind;
use crate::labels::{OwnershipLabels, COMPONENT_LEGACY_EXTERNAL_DNS, COMPONENT_STATIC};
use crate::reconcilers::resources::ManagedObject;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use k8s_openapi::api::networking::v1::{IngressClass, IngressClassSpec};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Labels carried by the current release's static objects.
#[must_use]
pub fn static_labels(config: &OperatorConfig) -> OwnershipLabels {
    OwnershipLabels::new(OPERATOR_NAME, COMPONENT_STATIC).with_version(&config.operator_version)
}

/// Labels of the external-dns deployment earlier releases ran themselves.
#[must_use]
pub fn legacy_external_dns_labels() -> OwnershipLabels {
    OwnershipLabels::new(OPERATOR_NAME, COMPONENT_LEGACY_EXTERNAL_DNS)
}

/// Kinds used by retired components.
#[must_use]
pub fn retired_group_kinds() -> Vec<GroupKind> {
    vec![
        GroupKind::new("apps", "Deployment"),
        GroupKind::new("", "ServiceAccount"),
        GroupKind::new("", "ConfigMap"),
        GroupKind::new("rbac.authorization.k8s.io", "ClusterRole"),
        GroupKind::new("rbac.authorization.k8s.io", "ClusterRoleBinding"),
    ]
}

fn meta(name: &str, namespace: Option<&str>, labels: &OwnershipLabels) -> ObjectMeta {
    let mut meta = ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..Default::default()
    };
    labels.apply_to(&mut meta);
    meta
}

/// The objects the static resource reconciler keeps converged.
///
/// # Errors
///
/// Returns [`ClientError::InvalidObject`] if an object cannot be erased.
pub fn static_resources(config: &OperatorConfig) -> Result<Vec<ManagedObject>, ClientError> {
    let current = static_labels(config);
    let legacy = legacy_external_dns_labels();
    let ns = Some(config.namespace.as_str());

    let namespace = Namespace {
        metadata: meta(&config.namespace, None, &current),
        ..Default::default()
    };

    let ingress_class = IngressClass {
        metadata: meta(&config.ingress_class_name, None, &current),
        spec: Some(IngressClassSpec {
            controller: Some(INGRESS_CLASS_CONTROLLER.to_string()),
            ..Default::default()
        }),
    };

    let retired_deployment = Deployment {
        metadata: meta(LEGACY_EXTERNAL_DNS_NAME, ns, &legacy),
        ..Default::default()
    };
    let retired_service_account = ServiceAccount {
        metadata: meta(LEGACY_EXTERNAL_DNS_NAME, ns, &legacy),
        ..Default::default()
    };
    let retired_cluster_role = ClusterRole {
        metadata: meta(LEGACY_EXTERNAL_DNS_NAME, None, &legacy),
        ..Default::default()
    };
    let retired_binding = ClusterRoleBinding {
        metadata: meta(LEGACY_EXTERNAL_DNS_NAME, None, &legacy),
        ..Default::default()
    };

    Ok(vec![
        ManagedObject::from_resource(&namespace)?,
        ManagedObject::from_resource(&ingress_class)?,
        ManagedObject::from_resource(&retired_deployment)?.marked_for_deletion(),
        ManagedObject::from_resource(&retired_service_account)?.marked_for_deletion(),
        ManagedObject::from_resource(&retired_cluster_role)?.marked_for_deletion(),
        ManagedObject::from_resource(&retired_binding)?.marked_for_deletion(),
    ])
}

/// Compose the cleanup scope for `static_resources`.
#[must_use]
pub fn cleanup_retriever(
    config: &OperatorConfig,
    static_resources: &[ManagedObject],
) -> CleanTypeRetriever {
    let retired = CleanTypeRetriever::from_group_kinds(
        legacy_external_dns_labels().to_map(),
        retired_group_kinds(),
    );

    let previous_releases = RETIRED_OPERATOR_VERSIONS
        .iter()
        .map(|version| {
            let labels = OwnershipLabels::new(OPERATOR_NAME, COMPONENT_STATIC).with_version(*version);
            CleanTypeRetriever::from_objects(static_resources, labels.to_map())
        })
        .fold(CleanTypeRetriever::empty(), CleanTypeRetriever::add);

    let current = CleanTypeRetriever::from_objects(static_resources, static_labels(config).to_map());

    let stable_identity = CleanTypeRetriever::from_group_kinds(
        Default::default(),
        [
            GroupKind::new("", "Namespace"),
            GroupKind::new("networking.k8s.io", "IngressClass"),
        ],
    );

    retired
        .add(previous_releases)
        .remove(current, RemoveOpts::default())
        .remove(
            stable_identity,
            RemoveOpts::with_strategy(CompareStrategy::IgnoreLabels),
        )
}

#[cfg(test)]
#[path = "operator_tests.rs"]
mod operator_tests;
