// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the cleaner and the resource reconciler
//!
//! These tests run against a real cluster and create objects in throwaway namespaces.
//!
//! Run with: cargo test --test cleaner_integration -- --ignored

mod common;

use app_routing_operator::cleaner::client::KubeCleanupClient;
use app_routing_operator::cleaner::retriever::CleanTypeRetriever;
use app_routing_operator::cleaner::Cleaner;
use app_routing_operator::gvk::GroupKind;
use app_routing_operator::mapper::DiscoveryRestMapper;
use app_routing_operator::reconcilers::{KubeObjectClient, ManagedObject, ResourceReconciler};
use common::{cleanup_test_namespace, create_test_namespace, get_kube_client_or_skip, labeled_configmap};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, PostParams};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Labeled ConfigMaps are removed, foreign ones survive
#[tokio::test]
#[ignore] // Requires Kubernetes cluster
async fn test_cleaner_removes_only_labeled_objects() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    let namespace = "app-routing-cleaner-it";
    create_test_namespace(&client, namespace).await.unwrap();

    let owned = labels(&[
        ("app.kubernetes.io/managed-by", "app-routing-operator"),
        ("app.kubernetes.io/component", "cleaner-it"),
    ]);
    let foreign = labels(&[("app.kubernetes.io/component", "cleaner-it")]);

    let configmaps: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    for (name, l) in [("owned-a", &owned), ("owned-b", &owned), ("foreign", &foreign)] {
        configmaps
            .create(&PostParams::default(), &labeled_configmap(namespace, name, l))
            .await
            .unwrap();
    }

    let cleaner = Cleaner::new(
        "cleaner-it",
        Arc::new(KubeCleanupClient::new(client.clone())),
        Arc::new(DiscoveryRestMapper::new(client.clone())),
        CleanTypeRetriever::from_group_kinds(owned, [GroupKind::new("", "ConfigMap")]),
    )
    .unwrap();

    cleaner.clean().await.unwrap();
    // Second pass finds nothing left to delete
    cleaner.clean().await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(configmaps.get_opt("owned-a").await.unwrap().is_none());
    assert!(configmaps.get_opt("owned-b").await.unwrap().is_none());
    assert!(configmaps.get_opt("foreign").await.unwrap().is_some());

    cleanup_test_namespace(&client, namespace).await.unwrap();
}

/// One tick creates wanted objects and removes marked ones
#[tokio::test]
#[ignore] // Requires Kubernetes cluster
async fn test_resource_reconciler_tick_converges() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    let namespace = "app-routing-reconciler-it";
    create_test_namespace(&client, namespace).await.unwrap();

    let l = labels(&[("app.kubernetes.io/managed-by", "app-routing-operator")]);
    let configmaps: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    configmaps
        .create(
            &PostParams::default(),
            &labeled_configmap(namespace, "retired", &l),
        )
        .await
        .unwrap();

    let wanted = ManagedObject::from_resource(&labeled_configmap(namespace, "wanted", &l)).unwrap();
    let retired = ManagedObject::from_resource(&labeled_configmap(namespace, "retired", &l))
        .unwrap()
        .marked_for_deletion();
    let reconciler = ResourceReconciler::new(
        "reconciler-it",
        Arc::new(KubeObjectClient::new(client.clone())),
        vec![wanted, retired],
        Duration::from_secs(60),
    );

    reconciler.tick().await.unwrap();
    // Applying an existing object and deleting a missing one both succeed
    reconciler.tick().await.unwrap();

    assert!(configmaps.get_opt("wanted").await.unwrap().is_some());
    assert!(configmaps.get_opt("retired").await.unwrap().is_none());

    cleanup_test_namespace(&client, namespace).await.unwrap();
}
