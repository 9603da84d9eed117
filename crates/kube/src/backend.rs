//! Transport seam between the engine and the API server.
//!
//! The engine never talks to a cluster directly: it enumerates descriptors
//! through [`ClusterBackend`] and drives every request through a bound
//! [`ResourceApi`] handle. The kube-rs implementation lives in
//! [`crate::client`]; tests substitute an in-memory one.

use async_trait::async_trait;
use caravel_core::{ApiError, LabelSelector, Propagation, Resource, ResourceEvent};
use futures::stream::BoxStream;

use crate::discovery::ResourceType;

/// Live event sequence from one per-type watch. Ends when the server closes
/// the stream; the engine handles cancellation above this seam.
pub type EventStream = BoxStream<'static, ResourceEvent>;

/// Discovery plus per-type handle minting for one cluster connection.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// One catalogue fetch. Invoked fresh by every engine operation;
    /// implementations must not cache across calls.
    async fn server_resources(&self) -> Result<Vec<ResourceType>, ApiError>;

    /// Bind a client for one descriptor within one namespace scope. The
    /// handle lives only for the duration of the current call.
    fn bind(&self, resource: &ResourceType, namespace: &str) -> Box<dyn ResourceApi>;
}

/// Request surface of one bound resource type.
///
/// `NotFound` outcomes are reported as [`ApiError::NotFound`]; tolerance is
/// decided by the engine, not here.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// List, with a best-effort server-side selector hint. Callers re-check
    /// labels client-side; the hint alone is not trusted.
    async fn list(&self, selector: Option<&LabelSelector>) -> Result<Vec<Resource>, ApiError>;

    /// Open a server-side watch scoped by a label selector expression.
    async fn watch(&self, label_selector: &str) -> Result<EventStream, ApiError>;

    async fn get(&self, name: &str) -> Result<Resource, ApiError>;

    async fn delete(&self, name: &str, propagation: Propagation) -> Result<(), ApiError>;

    async fn delete_collection(
        &self,
        selector: &LabelSelector,
        propagation: Propagation,
    ) -> Result<(), ApiError>;
}
