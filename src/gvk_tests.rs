// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `gvk.rs`

#[cfg(test)]
mod tests {
    use super::super::{GroupKind, GroupVersionKind, GroupVersionResource};

    #[test]
    fn test_group_kind_display() {
        assert_eq!(GroupKind::new("apps", "Deployment").to_string(), "Deployment.apps");
        assert_eq!(GroupKind::new("", "Service").to_string(), "Service");
    }

    #[test]
    fn test_gvk_group_kind_drops_version() {
        let gvk = GroupVersionKind::new("networking.k8s.io", "v1", "IngressClass");
        assert_eq!(gvk.group_kind(), GroupKind::new("networking.k8s.io", "IngressClass"));

        let core = GroupVersionKind::new("", "v1", "ConfigMap");
        assert_eq!(core.group_kind(), GroupKind::new("", "ConfigMap"));
    }

    #[test]
    fn test_gvr_api_version_and_display() {
        let deployments = GroupVersionResource::new("apps", "v1", "deployments");
        assert_eq!(deployments.api_version(), "apps/v1");
        assert_eq!(deployments.to_string(), "apps/v1/deployments");

        let services = GroupVersionResource::new("", "v1", "services");
        assert_eq!(services.api_version(), "v1");
        assert_eq!(services.to_string(), "v1/services");
    }

    #[test]
    fn test_gvr_api_resource() {
        let ar = GroupVersionResource::new("apps", "v1", "deployments").api_resource("Deployment");
        assert_eq!(ar.api_version, "apps/v1");
        assert_eq!(ar.plural, "deployments");
        assert_eq!(ar.kind, "Deployment");
    }
}
