//! Caravel CRUD façade interfaces.
//!
//! Remote-procedure surfaces the controller exposes for cluster and
//! application resources, served over RPC with an HTTP/JSON gateway. They
//! are thin pass-throughs and deliberately excluded from the orchestration
//! core; this crate defines the traits and wire types, plus an in-memory
//! registry used by tests.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use caravel_core::{Connection, Resource};
use serde::{Deserialize, Serialize};

/// A registered cluster, keyed by API server URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub server: String,
    pub name: String,
    pub connection: Connection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterList {
    pub items: Vec<Cluster>,
}

/// A registered application: a name plus its declared desired state,
/// opaque to the façade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub spec: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationList {
    pub items: Vec<Application>,
}

/// Façade errors suitable for transport over RPC.
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
pub enum ServiceError {
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Cluster CRUD façade.
#[async_trait]
pub trait ClusterService: Send + Sync {
    /// `GET /api/v1/clusters`
    async fn list(&self) -> ServiceResult<ClusterList>;

    /// `GET /api/v1/clusters/{server}`
    async fn get(&self, server: &str) -> ServiceResult<Cluster>;

    /// `POST /api/v1/clusters`
    async fn create(&self, cluster: Cluster) -> ServiceResult<Cluster>;

    /// `PUT /api/v1/clusters/{server}`
    async fn update(&self, cluster: Cluster) -> ServiceResult<Cluster>;

    /// `DELETE /api/v1/clusters/{server}`
    async fn delete(&self, server: &str) -> ServiceResult<()>;
}

/// Application CRUD façade.
#[async_trait]
pub trait ApplicationService: Send + Sync {
    /// `GET /api/v1/applications`
    async fn list(&self) -> ServiceResult<ApplicationList>;

    /// `GET /api/v1/applications/{name}`
    async fn get(&self, name: &str) -> ServiceResult<Application>;

    /// `POST /api/v1/applications`
    async fn create(&self, app: Application) -> ServiceResult<Application>;

    /// `PUT /api/v1/applications/{name}`
    async fn update(&self, app: Application) -> ServiceResult<Application>;

    /// `DELETE /api/v1/applications/{name}`
    async fn delete(&self, name: &str) -> ServiceResult<()>;

    /// `GET /api/v1/applications/{name}/pods` — the pods currently backing
    /// an application.
    async fn list_pods(&self, name: &str) -> ServiceResult<Vec<Resource>>;
}

// ----------------- In-memory implementation -----------------

/// Registry backing both façades with process-local state; the RPC servers
/// in the controller wrap the real stores.
#[derive(Default)]
pub struct InMemoryRegistry {
    clusters: RwLock<HashMap<String, Cluster>>,
    apps: RwLock<HashMap<String, Application>>,
    pods: RwLock<HashMap<String, Vec<Resource>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pods(&self, app: &str, pods: Vec<Resource>) {
        self.pods.write().unwrap().insert(app.to_string(), pods);
    }
}

#[async_trait]
impl ClusterService for InMemoryRegistry {
    async fn list(&self) -> ServiceResult<ClusterList> {
        let mut items: Vec<_> = self.clusters.read().unwrap().values().cloned().collect();
        items.sort_by(|a, b| a.server.cmp(&b.server));
        Ok(ClusterList { items })
    }

    async fn get(&self, server: &str) -> ServiceResult<Cluster> {
        self.clusters
            .read()
            .unwrap()
            .get(server)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(server.to_string()))
    }

    async fn create(&self, cluster: Cluster) -> ServiceResult<Cluster> {
        if cluster.server.is_empty() {
            return Err(ServiceError::Validation("cluster server is required".into()));
        }
        self.clusters
            .write()
            .unwrap()
            .insert(cluster.server.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn update(&self, cluster: Cluster) -> ServiceResult<Cluster> {
        let mut clusters = self.clusters.write().unwrap();
        if !clusters.contains_key(&cluster.server) {
            return Err(ServiceError::NotFound(cluster.server));
        }
        clusters.insert(cluster.server.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn delete(&self, server: &str) -> ServiceResult<()> {
        self.clusters
            .write()
            .unwrap()
            .remove(server)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(server.to_string()))
    }
}

#[async_trait]
impl ApplicationService for InMemoryRegistry {
    async fn list(&self) -> ServiceResult<ApplicationList> {
        let mut items: Vec<_> = self.apps.read().unwrap().values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ApplicationList { items })
    }

    async fn get(&self, name: &str) -> ServiceResult<Application> {
        self.apps
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }

    async fn create(&self, app: Application) -> ServiceResult<Application> {
        if app.name.is_empty() {
            return Err(ServiceError::Validation("application name is required".into()));
        }
        self.apps.write().unwrap().insert(app.name.clone(), app.clone());
        Ok(app)
    }

    async fn update(&self, app: Application) -> ServiceResult<Application> {
        let mut apps = self.apps.write().unwrap();
        if !apps.contains_key(&app.name) {
            return Err(ServiceError::NotFound(app.name));
        }
        apps.insert(app.name.clone(), app.clone());
        Ok(app)
    }

    async fn delete(&self, name: &str) -> ServiceResult<()> {
        self.apps
            .write()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }

    async fn list_pods(&self, name: &str) -> ServiceResult<Vec<Resource>> {
        Ok(self
            .pods
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(server: &str) -> Cluster {
        Cluster {
            server: server.to_string(),
            name: "test".to_string(),
            connection: Connection::new(server),
        }
    }

    #[tokio::test]
    async fn cluster_crud_round_trip() {
        let registry = InMemoryRegistry::new();
        let c = cluster("https://10.0.0.1:6443");
        ClusterService::create(&registry, c.clone()).await.unwrap();
        assert_eq!(
            ClusterService::get(&registry, &c.server).await.unwrap().server,
            c.server
        );
        assert_eq!(ClusterService::list(&registry).await.unwrap().items.len(), 1);
        ClusterService::delete(&registry, &c.server).await.unwrap();
        assert!(matches!(
            ClusterService::get(&registry, &c.server).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn updating_an_unknown_application_is_not_found() {
        let registry = InMemoryRegistry::new();
        let app = Application { name: "guestbook".into(), spec: serde_json::json!({}) };
        assert!(matches!(
            ApplicationService::update(&registry, app).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn application_pods_pass_through() {
        let registry = InMemoryRegistry::new();
        registry.set_pods(
            "guestbook",
            vec![Resource(serde_json::json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": { "name": "guestbook-0" },
            }))],
        );
        let pods = ApplicationService::list_pods(&registry, "guestbook").await.unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].name(), "guestbook-0");
    }
}
