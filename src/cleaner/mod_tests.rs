// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the cleaner

#[cfg(test)]
mod tests {
    use super::super::client::{CleanupClient, ObjectRef};
    use super::super::retriever::CleanTypeRetriever;
    use super::super::Cleaner;
    use crate::errors::{CleanerError, ClientError, RunError};
    use crate::gvk::{GroupKind, GroupVersionResource};
    use crate::mapper::StaticRestMapper;
    use crate::runtime::Runnable;
    use crate::selector::matches_labels;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    const VERSION: &str = "app.kubernetes.io/version";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        DeleteCollection(String, String),
        List(String, String),
        Delete(String, String, String),
    }

    /// In-memory cluster. `list` ignores the selector so the cleaner's own label
    /// check is exercised.
    #[derive(Default)]
    struct FakeCleanupClient {
        objects: Mutex<HashMap<GroupVersionResource, Vec<ObjectRef>>>,
        no_collection_delete: HashSet<GroupVersionResource>,
        failing: HashSet<GroupVersionResource>,
        missing_on_delete: HashSet<String>,
        calls: Mutex<Vec<(Call, Instant)>>,
    }

    impl FakeCleanupClient {
        fn with_object(
            self,
            gvr: &GroupVersionResource,
            namespace: &str,
            name: &str,
            labels: &BTreeMap<String, String>,
        ) -> Self {
            self.objects
                .lock()
                .unwrap()
                .entry(gvr.clone())
                .or_default()
                .push(ObjectRef {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    labels: labels.clone(),
                });
            self
        }

        fn names(&self, gvr: &GroupVersionResource) -> Vec<String> {
            self.objects
                .lock()
                .unwrap()
                .get(gvr)
                .map(|objs| objs.iter().map(|o| o.name.clone()).collect())
                .unwrap_or_default()
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push((call, Instant::now()));
        }
    }

    fn parse_selector(selector: &str) -> BTreeMap<String, String> {
        selector
            .split(',')
            .filter(|term| !term.is_empty())
            .filter_map(|term| term.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn server_error() -> ClientError {
        ClientError::Api {
            code: 500,
            message: "internal error".to_string(),
        }
    }

    #[async_trait]
    impl CleanupClient for FakeCleanupClient {
        async fn delete_collection(
            &self,
            gvr: &GroupVersionResource,
            selector: &str,
        ) -> Result<(), ClientError> {
            self.record(Call::DeleteCollection(gvr.to_string(), selector.to_string()));
            if self.failing.contains(gvr) {
                return Err(server_error());
            }
            if self.no_collection_delete.contains(gvr) {
                return Err(ClientError::MethodNotSupported(gvr.to_string()));
            }
            let required = parse_selector(selector);
            if let Some(objects) = self.objects.lock().unwrap().get_mut(gvr) {
                objects.retain(|o| !matches_labels(&required, &o.labels));
            }
            Ok(())
        }

        async fn list(
            &self,
            gvr: &GroupVersionResource,
            selector: &str,
        ) -> Result<Vec<ObjectRef>, ClientError> {
            self.record(Call::List(gvr.to_string(), selector.to_string()));
            Ok(self
                .objects
                .lock()
                .unwrap()
                .get(gvr)
                .cloned()
                .unwrap_or_default())
        }

        async fn delete(
            &self,
            gvr: &GroupVersionResource,
            namespace: &str,
            name: &str,
        ) -> Result<(), ClientError> {
            self.record(Call::Delete(
                gvr.to_string(),
                namespace.to_string(),
                name.to_string(),
            ));
            if self.missing_on_delete.contains(name) {
                return Err(ClientError::NotFound(name.to_string()));
            }
            if let Some(objects) = self.objects.lock().unwrap().get_mut(gvr) {
                objects.retain(|o| !(o.namespace == namespace && o.name == name));
            }
            Ok(())
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn owned() -> BTreeMap<String, String> {
        labels(&[(MANAGED_BY, "app-routing-operator"), (VERSION, "0.2.0")])
    }

    fn mapper() -> Arc<StaticRestMapper> {
        Arc::new(
            StaticRestMapper::new()
                .with("apps", "v1", "Deployment", "deployments")
                .with("", "v1", "Service", "services")
                .with("rbac.authorization.k8s.io", "v1", "ClusterRole", "clusterroles"),
        )
    }

    fn deployments() -> GroupVersionResource {
        GroupVersionResource::new("apps", "v1", "deployments")
    }

    fn services() -> GroupVersionResource {
        GroupVersionResource::new("", "v1", "services")
    }

    fn cluster_roles() -> GroupVersionResource {
        GroupVersionResource::new("rbac.authorization.k8s.io", "v1", "clusterroles")
    }

    fn cleaner(client: &Arc<FakeCleanupClient>, retriever: CleanTypeRetriever) -> Cleaner {
        Cleaner::new("test-cleaner", client.clone(), mapper(), retriever).unwrap()
    }

    fn scope(kinds: &[(&str, &str)]) -> CleanTypeRetriever {
        CleanTypeRetriever::from_group_kinds(
            owned(),
            kinds.iter().map(|(g, k)| GroupKind::new(*g, *k)),
        )
    }

    #[test]
    fn test_requires_leader_election() {
        let client = Arc::new(FakeCleanupClient::default());
        let cleaner = cleaner(&client, CleanTypeRetriever::empty());

        assert!(cleaner.need_leader_election());
        assert_eq!(cleaner.max_retries(), 3);
    }

    /// The attempt count saturates instead of overflowing at the retry ceiling
    #[test]
    fn test_max_attempts_saturates() {
        let client = Arc::new(FakeCleanupClient::default());

        assert_eq!(cleaner(&client, CleanTypeRetriever::empty()).max_attempts(), 4);
        let unbounded = cleaner(&client, CleanTypeRetriever::empty()).with_max_retries(u32::MAX);
        assert_eq!(unbounded.max_attempts(), u32::MAX);
    }

    #[test]
    fn test_empty_name_rejected() {
        let client = Arc::new(FakeCleanupClient::default());

        let result = Cleaner::new("", client, mapper(), CleanTypeRetriever::empty());

        assert!(matches!(result, Err(CleanerError::Config(_))));
    }

    /// Only labeled objects are removed, using the exact selector
    #[tokio::test]
    async fn test_clean_uses_exact_selector() {
        let client = Arc::new(
            FakeCleanupClient::default()
                .with_object(&deployments(), "ns-a", "old-nginx", &owned())
                .with_object(&deployments(), "ns-a", "user-app", &labels(&[("app", "web")]))
                .with_object(
                    &deployments(),
                    "ns-b",
                    "half-labeled",
                    &labels(&[(MANAGED_BY, "app-routing-operator")]),
                ),
        );

        cleaner(&client, scope(&[("apps", "Deployment")]))
            .clean()
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![Call::DeleteCollection(
                "apps/v1/deployments".to_string(),
                "app.kubernetes.io/managed-by=app-routing-operator,app.kubernetes.io/version=0.2.0"
                    .to_string()
            )]
        );
        assert_eq!(client.names(&deployments()), vec!["user-app", "half-labeled"]);
    }

    /// A second pass finds nothing and leaves the same state
    #[tokio::test]
    async fn test_clean_is_idempotent() {
        let client = Arc::new(
            FakeCleanupClient::default()
                .with_object(&deployments(), "ns-a", "old-nginx", &owned())
                .with_object(&deployments(), "ns-a", "user-app", &labels(&[("app", "web")])),
        );
        let cleaner = cleaner(&client, scope(&[("apps", "Deployment")]));

        cleaner.clean().await.unwrap();
        let after_first = client.names(&deployments());
        cleaner.clean().await.unwrap();

        assert_eq!(client.names(&deployments()), after_first);
        assert_eq!(after_first, vec!["user-app"]);
    }

    /// Unsupported DeleteCollection falls back to one delete per matching item in its
    /// own namespace
    #[tokio::test]
    async fn test_fallback_deletes_each_item_in_its_namespace() {
        let mut fake = FakeCleanupClient::default()
            .with_object(&services(), "ns-a", "svc-a", &owned())
            .with_object(&services(), "ns-b", "svc-b", &owned())
            .with_object(&services(), "ns-b", "user-svc", &labels(&[("app", "web")]))
            .with_object(&cluster_roles(), "", "old-role", &owned());
        fake.no_collection_delete.insert(services());
        fake.no_collection_delete.insert(cluster_roles());
        let client = Arc::new(fake);

        cleaner(
            &client,
            scope(&[("", "Service"), ("rbac.authorization.k8s.io", "ClusterRole")]),
        )
        .clean()
        .await
        .unwrap();

        let deletes: Vec<Call> = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Delete(..)))
            .collect();
        assert_eq!(
            deletes,
            vec![
                Call::Delete("v1/services".into(), "ns-a".into(), "svc-a".into()),
                Call::Delete("v1/services".into(), "ns-b".into(), "svc-b".into()),
                Call::Delete(
                    "rbac.authorization.k8s.io/v1/clusterroles".into(),
                    String::new(),
                    "old-role".into()
                ),
            ]
        );
        assert_eq!(client.names(&services()), vec!["user-svc"]);
        assert!(client.names(&cluster_roles()).is_empty());
    }

    #[tokio::test]
    async fn test_fallback_tolerates_not_found() {
        let mut fake = FakeCleanupClient::default()
            .with_object(&services(), "ns-a", "vanished", &owned())
            .with_object(&services(), "ns-a", "svc-a", &owned());
        fake.no_collection_delete.insert(services());
        fake.missing_on_delete.insert("vanished".to_string());
        let client = Arc::new(fake);

        let result = cleaner(&client, scope(&[("", "Service")])).clean().await;

        assert!(result.is_ok());
        assert_eq!(client.names(&services()), vec!["vanished"]);
    }

    /// The first failing resource type aborts the pass
    #[tokio::test]
    async fn test_clean_aborts_on_first_failure() {
        let mut fake = FakeCleanupClient::default();
        fake.failing.insert(deployments());
        let client = Arc::new(fake);

        let result = cleaner(&client, scope(&[("apps", "Deployment"), ("", "Service")]))
            .clean()
            .await;

        match result {
            Err(CleanerError::Clean { gvr, source }) => {
                assert_eq!(gvr, "apps/v1/deployments");
                assert!(matches!(source, ClientError::Api { code: 500, .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(client.calls().len(), 1);
    }

    /// Invalid labels fail before any API call
    #[tokio::test]
    async fn test_invalid_label_fails_before_any_call() {
        let client = Arc::new(FakeCleanupClient::default());
        let retriever = scope(&[("apps", "Deployment")]).add(
            CleanTypeRetriever::from_group_kinds(
                labels(&[("bad key!", "x")]),
                [GroupKind::new("", "Service")],
            ),
        );

        let result = cleaner(&client, retriever).clean().await;

        assert!(matches!(result, Err(CleanerError::Selector(_))));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_kind_fails_retrieval() {
        let client = Arc::new(FakeCleanupClient::default());

        let result = cleaner(&client, scope(&[("example.com", "Widget")]))
            .clean()
            .await;

        assert!(matches!(result, Err(CleanerError::Retrieve(_))));
        assert!(client.calls().is_empty());
    }

    /// With two retries the cleaner waits 1s then 2s and still returns Ok
    #[tokio::test(start_paused = true)]
    async fn test_start_backoff_schedule() {
        let mut fake = FakeCleanupClient::default();
        fake.failing.insert(deployments());
        let client = Arc::new(fake);
        let cleaner = cleaner(&client, scope(&[("apps", "Deployment")])).with_max_retries(2);

        let result = cleaner.start(CancellationToken::new()).await;

        assert!(result.is_ok());
        let times = client.call_times();
        assert_eq!(times.len(), 3);
        assert_eq!(times[1] - times[0], Duration::from_secs(1));
        assert_eq!(times[2] - times[1], Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stops_after_success() {
        let client = Arc::new(
            FakeCleanupClient::default().with_object(&deployments(), "ns-a", "old", &owned()),
        );

        let result = cleaner(&client, scope(&[("apps", "Deployment")]))
            .start(CancellationToken::new())
            .await;

        assert!(result.is_ok());
        assert_eq!(client.calls().len(), 1);
        assert!(client.names(&deployments()).is_empty());
    }

    /// Cancellation during backoff is reported as cancellation
    #[tokio::test(start_paused = true)]
    async fn test_start_cancelled_during_backoff() {
        let mut fake = FakeCleanupClient::default();
        fake.failing.insert(deployments());
        let client = Arc::new(fake);
        let cleaner = Arc::new(cleaner(&client, scope(&[("apps", "Deployment")])));
        let shutdown = CancellationToken::new();

        let handle = {
            let cleaner = cleaner.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { cleaner.start(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown.cancel();

        assert!(matches!(handle.await.unwrap(), Err(RunError::Cancelled)));
        assert_eq!(client.calls().len(), 1);
    }
}
