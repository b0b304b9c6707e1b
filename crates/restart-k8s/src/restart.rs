use std::fmt::Debug;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams};
use kube::core::Selector;
use kube::{Client, Resource};
use serde::de::DeserializeOwned;

use restart_core::config::PluginConfig;
use restart_core::error::{RestartError, RestartResult};
use restart_core::kind::WorkloadKind;

/// A workload controller that owns its pods through a label selector.
pub trait PodTemplateOwner:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + Debug + DeserializeOwned
{
    fn declared_selector(&self) -> Option<&LabelSelector>;
}

impl PodTemplateOwner for Deployment {
    fn declared_selector(&self) -> Option<&LabelSelector> {
        self.spec.as_ref().map(|s| &s.selector)
    }
}

impl PodTemplateOwner for StatefulSet {
    fn declared_selector(&self) -> Option<&LabelSelector> {
        self.spec.as_ref().map(|s| &s.selector)
    }
}

impl PodTemplateOwner for DaemonSet {
    fn declared_selector(&self) -> Option<&LabelSelector> {
        self.spec.as_ref().map(|s| &s.selector)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartOutcome {
    pub kind: WorkloadKind,
    pub namespace: String,
    pub workload: String,
    pub selector: String,
    /// Pods the API server reported as deleted, when it returns the list.
    pub deleted: Option<usize>,
}

/// Restarts a workload by deleting every pod its controller owns.
pub struct WorkloadRestarter {
    client: Client,
}

impl WorkloadRestarter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn restart(&self, config: &PluginConfig) -> RestartResult<RestartOutcome> {
        let (kind, namespace, workload) = (config.kind(), config.namespace(), config.workload());

        let selector = self.resolve_selector(kind, namespace, workload).await?;
        tracing::info!(%kind, namespace, workload, %selector, "Resolved pod selector");

        let deleted = self.delete_pods(namespace, &selector).await?;

        Ok(RestartOutcome {
            kind,
            namespace: namespace.to_string(),
            workload: workload.to_string(),
            selector: selector.to_string(),
            deleted,
        })
    }

    pub async fn resolve_selector(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> RestartResult<Selector> {
        match kind {
            WorkloadKind::Deployment => self.workload_selector::<Deployment>(namespace, name).await,
            WorkloadKind::StatefulSet => self.workload_selector::<StatefulSet>(namespace, name).await,
            WorkloadKind::DaemonSet => self.workload_selector::<DaemonSet>(namespace, name).await,
        }
    }

    async fn workload_selector<K: PodTemplateOwner>(
        &self,
        namespace: &str,
        name: &str,
    ) -> RestartResult<Selector> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let workload = api
            .get(name)
            .await
            .map_err(|e| RestartError::Lookup(e.into()))?;

        let kind = K::kind(&());
        let declared = workload
            .declared_selector()
            .cloned()
            .ok_or_else(|| RestartError::Selector(format!("{kind} {name} has no spec")))?;
        let selector =
            Selector::try_from(declared).map_err(|e| RestartError::Selector(e.to_string()))?;

        // An empty selector matches every pod in the namespace.
        if selector.to_string().is_empty() {
            return Err(RestartError::Selector(format!(
                "{kind} {name} declares an empty selector"
            )));
        }
        Ok(selector)
    }

    /// Delete all pods in `namespace` matching `selector` in one request.
    pub async fn delete_pods(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> RestartResult<Option<usize>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = ListParams::default().labels_from(selector);

        let response = pods
            .delete_collection(&DeleteParams::default(), &lp)
            .await
            .map_err(|e| RestartError::Delete(e.into()))?;

        let deleted = response.left().map(|list| list.items.len());
        tracing::info!(namespace, %selector, deleted = ?deleted, "Pods deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Request, Response, StatusCode};
    use kube::client::Body;
    use restart_core::config::RawSettings;
    use serde_json::{json, Value};
    use tokio::task::JoinHandle;
    use tower_test::mock::Handle;

    type Seen = Vec<(Method, String, String)>;

    fn mock_client() -> (Client, Handle<Request<Body>, Response<Body>>) {
        let (service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        (Client::new(service, "default"), handle)
    }

    /// Answer requests with the scripted responses in order and record
    /// method, path and query of each. Ends once the client is dropped.
    fn serve(
        mut handle: Handle<Request<Body>, Response<Body>>,
        responses: Vec<(StatusCode, Value)>,
    ) -> JoinHandle<Seen> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut responses = responses.into_iter();
            while let Some((request, send)) = handle.next_request().await {
                seen.push((
                    request.method().clone(),
                    request.uri().path().to_string(),
                    request.uri().query().unwrap_or_default().to_string(),
                ));
                let (status, body) = responses.next().expect("unexpected request");
                send.send_response(
                    Response::builder()
                        .status(status)
                        .body(Body::from(serde_json::to_vec(&body).unwrap()))
                        .unwrap(),
                );
            }
            seen
        })
    }

    fn config(kind: &str, namespace: Option<&str>, workload: &str) -> PluginConfig {
        PluginConfig::resolve(RawSettings {
            server: Some("https://10.0.0.1:6443".into()),
            ca: Some("Y2E=".into()),
            token: Some("s3cr3t".into()),
            namespace: namespace.map(Into::into),
            kind: Some(kind.into()),
            workload: Some(workload.into()),
        })
        .unwrap()
    }

    fn workload(api_version: &str, kind: &str, name: &str, selector: Value) -> Value {
        json!({
            "apiVersion": api_version,
            "kind": kind,
            "metadata": { "name": name, "namespace": "default" },
            "spec": {
                "selector": selector,
                "serviceName": name,
                "template": { "metadata": { "labels": { "app": name } } }
            }
        })
    }

    fn pod_list(names: &[&str]) -> Value {
        let items: Vec<Value> = names
            .iter()
            .map(|n| json!({ "apiVersion": "v1", "kind": "Pod", "metadata": { "name": n } }))
            .collect();
        json!({ "apiVersion": "v1", "kind": "PodList", "metadata": {}, "items": items })
    }

    fn not_found(resource: &str, name: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Status",
            "metadata": {},
            "status": "Failure",
            "message": format!("{resource} \"{name}\" not found"),
            "reason": "NotFound",
            "code": 404
        })
    }

    #[tokio::test]
    async fn deployment_restart_in_default_namespace() {
        let (client, handle) = mock_client();
        let server = serve(
            handle,
            vec![
                (
                    StatusCode::OK,
                    workload(
                        "apps/v1",
                        "Deployment",
                        "api",
                        json!({ "matchLabels": { "app": "api", "tier": "web" } }),
                    ),
                ),
                (StatusCode::OK, pod_list(&["api-7d9f-abcde", "api-7d9f-fghij"])),
            ],
        );

        let restarter = WorkloadRestarter::new(client);
        let outcome = restarter.restart(&config("Deployment", None, "api")).await.unwrap();
        drop(restarter);

        assert_eq!(outcome.kind, WorkloadKind::Deployment);
        assert_eq!(outcome.namespace, "default");
        assert_eq!(outcome.selector, "app=api,tier=web");
        assert_eq!(outcome.deleted, Some(2));

        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, Method::GET);
        assert_eq!(seen[0].1, "/apis/apps/v1/namespaces/default/deployments/api");
        assert_eq!(seen[1].0, Method::DELETE);
        assert_eq!(seen[1].1, "/api/v1/namespaces/default/pods");
        assert!(seen[1].2.contains("labelSelector=app%3Dapi%2Ctier%3Dweb"));
        assert!(!seen[1].2.contains("fieldSelector"));
    }

    #[tokio::test]
    async fn statefulset_uses_its_own_resource_and_namespace() {
        let (client, handle) = mock_client();
        let server = serve(
            handle,
            vec![
                (
                    StatusCode::OK,
                    workload(
                        "apps/v1",
                        "StatefulSet",
                        "db",
                        json!({ "matchLabels": { "app": "db" } }),
                    ),
                ),
                (StatusCode::OK, pod_list(&["db-0"])),
            ],
        );

        let restarter = WorkloadRestarter::new(client);
        let outcome = restarter
            .restart(&config("StatefulSet", Some("data"), "db"))
            .await
            .unwrap();
        drop(restarter);

        assert_eq!(outcome.deleted, Some(1));
        let seen = server.await.unwrap();
        assert_eq!(seen[0].1, "/apis/apps/v1/namespaces/data/statefulsets/db");
        assert_eq!(seen[1].1, "/api/v1/namespaces/data/pods");
        assert!(seen[1].2.contains("labelSelector=app%3Ddb"));
    }

    #[tokio::test]
    async fn daemonset_selector_with_expression() {
        let (client, handle) = mock_client();
        let server = serve(
            handle,
            vec![(
                StatusCode::OK,
                workload(
                    "apps/v1",
                    "DaemonSet",
                    "node-exporter",
                    json!({ "matchExpressions": [
                        { "key": "app", "operator": "Exists" }
                    ] }),
                ),
            )],
        );

        let restarter = WorkloadRestarter::new(client);
        let selector = restarter
            .resolve_selector(WorkloadKind::DaemonSet, "monitoring", "node-exporter")
            .await
            .unwrap();
        drop(restarter);

        assert_eq!(selector.to_string(), "app");
        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].1,
            "/apis/apps/v1/namespaces/monitoring/daemonsets/node-exporter"
        );
    }

    #[tokio::test]
    async fn lookup_failure_skips_delete() {
        let (client, handle) = mock_client();
        let server = serve(
            handle,
            vec![(StatusCode::NOT_FOUND, not_found("deployments.apps", "api"))],
        );

        let restarter = WorkloadRestarter::new(client);
        let err = restarter
            .restart(&config("Deployment", None, "api"))
            .await
            .unwrap_err();
        drop(restarter);

        assert!(matches!(err, RestartError::Lookup(_)), "got {err}");
        assert!(err.to_string().contains("not found"));
        let seen = server.await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, Method::GET);
    }

    #[tokio::test]
    async fn empty_selector_is_refused() {
        let (client, handle) = mock_client();
        let server = serve(
            handle,
            vec![(
                StatusCode::OK,
                workload("apps/v1", "Deployment", "api", json!({})),
            )],
        );

        let restarter = WorkloadRestarter::new(client);
        let err = restarter
            .restart(&config("Deployment", None, "api"))
            .await
            .unwrap_err();
        drop(restarter);

        assert!(matches!(err, RestartError::Selector(_)), "got {err}");
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_selector_operator_is_refused() {
        let (client, handle) = mock_client();
        let server = serve(
            handle,
            vec![(
                StatusCode::OK,
                workload(
                    "apps/v1",
                    "Deployment",
                    "api",
                    json!({ "matchExpressions": [
                        { "key": "app", "operator": "Contains", "values": ["api"] }
                    ] }),
                ),
            )],
        );

        let restarter = WorkloadRestarter::new(client);
        let err = restarter
            .restart(&config("Deployment", None, "api"))
            .await
            .unwrap_err();
        drop(restarter);

        assert!(matches!(err, RestartError::Selector(_)), "got {err}");
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_failure_is_reported() {
        let (client, handle) = mock_client();
        let forbidden = json!({
            "apiVersion": "v1",
            "kind": "Status",
            "metadata": {},
            "status": "Failure",
            "message": "pods is forbidden",
            "reason": "Forbidden",
            "code": 403
        });
        let server = serve(
            handle,
            vec![
                (
                    StatusCode::OK,
                    workload(
                        "apps/v1",
                        "Deployment",
                        "api",
                        json!({ "matchLabels": { "app": "api" } }),
                    ),
                ),
                (StatusCode::FORBIDDEN, forbidden),
            ],
        );

        let restarter = WorkloadRestarter::new(client);
        let err = restarter
            .restart(&config("Deployment", None, "api"))
            .await
            .unwrap_err();
        drop(restarter);

        assert!(matches!(err, RestartError::Delete(_)), "got {err}");
        assert!(err.to_string().contains("forbidden"));
        assert_eq!(server.await.unwrap().len(), 2);
    }
}
