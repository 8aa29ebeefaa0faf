// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Schema-less list/delete access for the cleaner.
//!
//! The cleaner must handle arbitrary kinds uniformly, so it talks to the cluster
//! through the narrow [`CleanupClient`] capability instead of typed APIs.
//! [`KubeCleanupClient`] implements it over `Api<DynamicObject>`.

use crate::constants::KUBE_LIST_PAGE_SIZE;
use crate::errors::ClientError;
use crate::gvk::GroupVersionResource;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::debug;

/// A listed object, reduced to what deletion needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Namespace; empty for cluster-scoped objects
    pub namespace: String,
    /// Object name
    pub name: String,
    /// Labels as observed when listed
    pub labels: BTreeMap<String, String>,
}

/// List and delete any resource collection by coordinate.
#[async_trait]
pub trait CleanupClient: Send + Sync {
    /// Delete every object of `gvr`, in all namespaces, that matches `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MethodNotSupported`] if the server does not implement
    /// collection deletion for this resource.
    async fn delete_collection(
        &self,
        gvr: &GroupVersionResource,
        selector: &str,
    ) -> Result<(), ClientError>;

    /// List every object of `gvr`, in all namespaces, that matches `selector`.
    ///
    /// # Errors
    ///
    /// Returns the classified API error.
    async fn list(
        &self,
        gvr: &GroupVersionResource,
        selector: &str,
    ) -> Result<Vec<ObjectRef>, ClientError>;

    /// Delete one object. `namespace` is empty for cluster-scoped objects.
    ///
    /// # Errors
    ///
    /// Returns the classified API error.
    async fn delete(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClientError>;
}

/// [`CleanupClient`] backed by a kube [`Client`].
#[derive(Clone)]
pub struct KubeCleanupClient {
    client: Client,
}

impl KubeCleanupClient {
    /// Wrap a kube client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, gvr: &GroupVersionResource, namespace: &str) -> Api<DynamicObject> {
        let ar = gvr.api_resource(&gvr.resource);
        if namespace.is_empty() {
            Api::all_with(self.client.clone(), &ar)
        } else {
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        }
    }
}

#[async_trait]
impl CleanupClient for KubeCleanupClient {
    async fn delete_collection(
        &self,
        gvr: &GroupVersionResource,
        selector: &str,
    ) -> Result<(), ClientError> {
        self.api(gvr, "")
            .delete_collection(&DeleteParams::default(), &ListParams::default().labels(selector))
            .await?;
        Ok(())
    }

    async fn list(
        &self,
        gvr: &GroupVersionResource,
        selector: &str,
    ) -> Result<Vec<ObjectRef>, ClientError> {
        let api = self.api(gvr, "");
        let mut list_params = ListParams::default().labels(selector);
        list_params.limit = Some(KUBE_LIST_PAGE_SIZE);

        let mut refs = Vec::new();
        let mut page_count = 0;
        loop {
            page_count += 1;
            let page = api.list(&list_params).await?;
            refs.extend(page.items.into_iter().filter_map(|obj| {
                Some(ObjectRef {
                    name: obj.metadata.name?,
                    namespace: obj.metadata.namespace.unwrap_or_default(),
                    labels: obj.metadata.labels.unwrap_or_default(),
                })
            }));

            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => list_params.continue_token = Some(token),
                _ => break,
            }
        }

        debug!(
            gvr = %gvr,
            total_pages = page_count,
            total_items = refs.len(),
            "Completed paginated list operation"
        );
        Ok(refs)
    }

    async fn delete(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClientError> {
        self.api(gvr, namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }
}
