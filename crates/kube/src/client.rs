//! kube-rs implementation of the backend seam.

use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use caravel_core::{
    ApiError, Connection, EventKind, LabelSelector, Propagation, Resource, ResourceEvent,
};
use futures::StreamExt;
use kube::api::{Api, DeleteParams, ListParams, WatchEvent, WatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject};
use kube::discovery::{Discovery, Scope};
use kube::{Client, Config};
use tracing::{debug, warn};

use crate::backend::{ClusterBackend, EventStream, ResourceApi};
use crate::discovery::ResourceType;

/// Backend over a kube-rs [`Client`].
#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
}

impl KubeBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Infer the connection from the environment (kubeconfig or in-cluster).
    pub async fn try_default() -> anyhow::Result<Self> {
        let client = Client::try_default()
            .await
            .context("building kube client from environment")?;
        Ok(Self { client })
    }

    /// Mint a client from an explicit [`Connection`]. The credential
    /// material rides through an in-memory kubeconfig; nothing touches disk.
    pub async fn connect(conn: &Connection) -> anyhow::Result<Self> {
        let mut cluster = serde_json::json!({ "server": conn.server });
        if conn.insecure {
            cluster["insecure-skip-tls-verify"] = serde_json::Value::Bool(true);
        }
        if let Some(path) = &conn.ca_file {
            cluster["certificate-authority"] = path.display().to_string().into();
        } else if let Some(data) = &conn.ca_data {
            cluster["certificate-authority-data"] = BASE64.encode(data).into();
        }

        let mut user = serde_json::json!({});
        if let Some(path) = &conn.client_cert_file {
            user["client-certificate"] = path.display().to_string().into();
        } else if let Some(data) = &conn.client_cert_data {
            user["client-certificate-data"] = BASE64.encode(data).into();
        }
        if let Some(path) = &conn.client_key_file {
            user["client-key"] = path.display().to_string().into();
        } else if let Some(data) = &conn.client_key_data {
            user["client-key-data"] = BASE64.encode(data).into();
        }
        if let Some(token) = &conn.bearer_token {
            user["token"] = token.clone().into();
        }
        if let Some(username) = &conn.username {
            user["username"] = username.clone().into();
        }
        if let Some(password) = &conn.password {
            user["password"] = password.clone().into();
        }

        let kubeconfig: Kubeconfig = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Config",
            "clusters": [{ "name": "caravel", "cluster": cluster }],
            "users": [{ "name": "caravel", "user": user }],
            "contexts": [{
                "name": "caravel",
                "context": { "cluster": "caravel", "user": "caravel" },
            }],
            "current-context": "caravel",
        }))
        .context("assembling kubeconfig from connection")?;

        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context("building client config")?;
        let client = Client::try_from(config).context("building kube client")?;
        Ok(Self { client })
    }

    /// Validate the connection by fetching the server version.
    pub async fn probe(&self) -> anyhow::Result<()> {
        let version = self
            .client
            .apiserver_version()
            .await
            .context("connection config invalid")?;
        debug!(version = %version.git_version, "API server reachable");
        Ok(())
    }
}

#[async_trait]
impl ClusterBackend for KubeBackend {
    async fn server_resources(&self) -> Result<Vec<ResourceType>, ApiError> {
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|e| anyhow::Error::new(e).context("running API discovery"))?;
        let mut out = Vec::new();
        for group in discovery.groups() {
            // all versions, not only recommended, so legacy groups surface
            // alongside their stable successors
            for version in group.versions() {
                for (ar, caps) in group.versioned_resources(version) {
                    out.push(ResourceType {
                        group: ar.group.clone(),
                        version: ar.version.clone(),
                        kind: ar.kind.clone(),
                        plural: ar.plural.clone(),
                        namespaced: matches!(caps.scope, Scope::Namespaced),
                        verbs: caps.operations.clone(),
                    });
                }
            }
        }
        out.sort_by(|a, b| {
            a.group
                .cmp(&b.group)
                .then_with(|| a.version.cmp(&b.version))
                .then_with(|| a.kind.cmp(&b.kind))
        });
        debug!(types = out.len(), "API catalogue enumerated");
        Ok(out)
    }

    fn bind(&self, resource: &ResourceType, namespace: &str) -> Box<dyn ResourceApi> {
        let ar = ApiResource {
            group: resource.group.clone(),
            version: resource.version.clone(),
            api_version: resource.api_version(),
            kind: resource.kind.clone(),
            plural: resource.plural.clone(),
        };
        let api: Api<DynamicObject> = if resource.namespaced && !namespace.is_empty() {
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        };
        Box::new(DynamicHandle { api, key: resource.gvk_key() })
    }
}

struct DynamicHandle {
    api: Api<DynamicObject>,
    key: String,
}

fn wrap(err: kube::Error) -> ApiError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ApiError::NotFound,
        other => ApiError::Other(anyhow::Error::new(other)),
    }
}

fn to_resource(obj: &DynamicObject) -> Result<Resource, ApiError> {
    let raw = serde_json::to_value(obj)
        .map_err(|e| anyhow::Error::new(e).context("serializing object"))?;
    Ok(Resource(raw))
}

fn delete_params(propagation: Propagation) -> DeleteParams {
    match propagation {
        Propagation::Foreground => DeleteParams::foreground(),
        Propagation::Background => DeleteParams::background(),
        Propagation::Orphan => DeleteParams::orphan(),
    }
}

#[async_trait]
impl ResourceApi for DynamicHandle {
    async fn list(&self, selector: Option<&LabelSelector>) -> Result<Vec<Resource>, ApiError> {
        let mut lp = ListParams::default();
        if let Some(sel) = selector {
            lp = lp.labels(&sel.to_query());
        }
        let list = self.api.list(&lp).await.map_err(wrap)?;
        list.items.iter().map(to_resource).collect()
    }

    async fn watch(&self, label_selector: &str) -> Result<EventStream, ApiError> {
        let wp = WatchParams::default().labels(label_selector);
        let stream = self.api.watch(&wp, "0").await.map_err(wrap)?;
        let key = self.key.clone();
        let events = stream.filter_map(move |event| {
            let key = key.clone();
            async move {
                match event {
                    Ok(WatchEvent::Added(o)) => to_event(EventKind::Added, &o),
                    Ok(WatchEvent::Modified(o)) => to_event(EventKind::Modified, &o),
                    Ok(WatchEvent::Deleted(o)) => to_event(EventKind::Deleted, &o),
                    Ok(WatchEvent::Bookmark(_)) => None,
                    Ok(WatchEvent::Error(e)) => {
                        warn!(gvk = %key, code = e.code, message = %e.message, "error event on watch");
                        None
                    }
                    Err(e) => {
                        warn!(gvk = %key, error = %e, "watch stream error");
                        None
                    }
                }
            }
        });
        Ok(Box::pin(events))
    }

    async fn get(&self, name: &str) -> Result<Resource, ApiError> {
        let obj = self.api.get(name).await.map_err(wrap)?;
        to_resource(&obj)
    }

    async fn delete(&self, name: &str, propagation: Propagation) -> Result<(), ApiError> {
        let dp = delete_params(propagation);
        self.api.delete(name, &dp).await.map(|_| ()).map_err(wrap)
    }

    async fn delete_collection(
        &self,
        selector: &LabelSelector,
        propagation: Propagation,
    ) -> Result<(), ApiError> {
        let dp = delete_params(propagation);
        let lp = ListParams::default().labels(&selector.to_query());
        self.api
            .delete_collection(&dp, &lp)
            .await
            .map(|_| ())
            .map_err(wrap)
    }
}

fn to_event(kind: EventKind, obj: &DynamicObject) -> Option<ResourceEvent> {
    match serde_json::to_value(obj) {
        Ok(raw) => Some(ResourceEvent { kind, resource: Resource(raw) }),
        Err(e) => {
            warn!(error = %e, "dropping unserializable watch event");
            None
        }
    }
}
