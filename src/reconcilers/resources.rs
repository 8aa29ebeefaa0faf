// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state objects and the create-or-apply / delete operations on them.
//!
//! A [`ManagedObject`] is a fully-formed Kubernetes object the operator owns, erased to
//! a [`DynamicObject`] so that objects of different kinds can share one list. An
//! object whose `deletionTimestamp` is set is an instruction to remove it rather than
//! to apply it.
//!
//! # Example
//!
//! ```rust,no_run
//! use app_routing_operator::reconcilers::resources::{KubeObjectClient, ManagedObject, ObjectClient};
//! use k8s_openapi::api::core::v1::Namespace;
//! use kube::api::ObjectMeta;
//! use kube::Client;
//!
//! async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//!     let ns = Namespace {
//!         metadata: ObjectMeta {
//!             name: Some("app-routing-system".to_string()),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!     let object = ManagedObject::from_resource(&ns)?;
//!     KubeObjectClient::new(client).upsert(&object).await?;
//!     Ok(())
//! }
//! ```

use crate::constants::FIELD_MANAGER;
use crate::errors::ClientError;
use crate::gvk::GroupVersionKind;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::jiff::Timestamp;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, Patch, PatchParams, PostParams, TypeMeta,
};
use kube::{Client, Resource};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// An object the operator keeps in (or removes from) the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedObject {
    object: DynamicObject,
    resource: ApiResource,
}

impl ManagedObject {
    /// Erase a typed resource into a managed object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidObject`] if the object cannot be serialized or has
    /// no name.
    pub fn from_resource<K>(resource: &K) -> Result<Self, ClientError>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let api_resource = ApiResource::erase::<K>(&());
        let value = serde_json::to_value(resource)
            .map_err(|e| ClientError::InvalidObject(e.to_string()))?;
        let mut object: DynamicObject = serde_json::from_value(value)
            .map_err(|e| ClientError::InvalidObject(e.to_string()))?;

        if object.metadata.name.as_deref().unwrap_or_default().is_empty() {
            return Err(ClientError::InvalidObject(format!(
                "{} has no name",
                api_resource.kind
            )));
        }

        object.types = Some(TypeMeta {
            api_version: api_resource.api_version.clone(),
            kind: api_resource.kind.clone(),
        });

        Ok(Self {
            object,
            resource: api_resource,
        })
    }

    /// Mark the object for removal: the reconciler deletes it instead of applying it.
    #[must_use]
    pub fn marked_for_deletion(mut self) -> Self {
        self.object.metadata.deletion_timestamp = Some(Time(Timestamp::now()));
        self
    }

    /// Returns `true` if the object carries a deletion timestamp.
    #[must_use]
    pub fn is_marked_for_deletion(&self) -> bool {
        self.object.metadata.deletion_timestamp.is_some()
    }

    /// The object's kind coordinates.
    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::from(&self.resource)
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.object.metadata.name.as_deref().unwrap_or_default()
    }

    /// Namespace, or `None` for cluster-scoped objects.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.object
            .metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
    }

    /// A copy of the object's labels, empty if it has none.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        self.object.metadata.labels.clone().unwrap_or_default()
    }

    /// The type-erased desired object.
    #[must_use]
    pub fn object(&self) -> &DynamicObject {
        &self.object
    }

    /// The resource the object is served under.
    #[must_use]
    pub fn api_resource(&self) -> &ApiResource {
        &self.resource
    }

    /// `Kind namespace/name`, or `Kind name` when cluster-scoped.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{} {}/{}", self.resource.kind, ns, self.name()),
            None => format!("{} {}", self.resource.kind, self.name()),
        }
    }
}

/// Apply and delete operations on managed objects.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Create the object, or server-side apply it if it already exists.
    ///
    /// # Errors
    ///
    /// Returns the classified API error.
    async fn upsert(&self, object: &ManagedObject) -> Result<(), ClientError>;

    /// Delete the object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if it is already gone.
    async fn delete(&self, object: &ManagedObject) -> Result<(), ClientError>;
}

/// [`ObjectClient`] backed by a kube [`Client`].
#[derive(Clone)]
pub struct KubeObjectClient {
    client: Client,
}

impl KubeObjectClient {
    /// Wrap a kube client; writes use the operator's field manager.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, object: &ManagedObject) -> Api<DynamicObject> {
        match object.namespace() {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, object.api_resource()),
            None => Api::all_with(self.client.clone(), object.api_resource()),
        }
    }
}

#[async_trait]
impl ObjectClient for KubeObjectClient {
    async fn upsert(&self, object: &ManagedObject) -> Result<(), ClientError> {
        let api = self.api(object);
        let name = object.name();

        if api.get_opt(name).await?.is_some() {
            debug!(object = %object.describe(), "Object exists, applying update");
            api.patch(
                name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(object.object()),
            )
            .await?;
            info!("Updated {}", object.describe());
        } else {
            debug!(object = %object.describe(), "Object does not exist, creating");
            let params = PostParams {
                field_manager: Some(FIELD_MANAGER.to_string()),
                ..Default::default()
            };
            api.create(&params, object.object()).await?;
            info!("Created {}", object.describe());
        }

        Ok(())
    }

    async fn delete(&self, object: &ManagedObject) -> Result<(), ClientError> {
        self.api(object)
            .delete(object.name(), &DeleteParams::default())
            .await?;
        info!("Deleted {}", object.describe());
        Ok(())
    }
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
