//! In-memory cluster backend for engine tests: a fixed catalogue, per-type
//! object stores, scripted failures, and a call journal.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use caravel_core::{ApiError, LabelSelector, Propagation, Resource, ResourceEvent};
use caravel_kube::{ClusterBackend, EventStream, ResourceApi, ResourceType};
use tokio::sync::mpsc;

pub fn resource_type(
    group: &str,
    version: &str,
    kind: &str,
    plural: &str,
    verbs: &[&str],
) -> ResourceType {
    ResourceType {
        group: group.into(),
        version: version.into(),
        kind: kind.into(),
        plural: plural.into(),
        namespaced: true,
        verbs: verbs.iter().map(|v| v.to_string()).collect(),
    }
}

pub fn resource(
    api_version: &str,
    kind: &str,
    name: &str,
    uid: &str,
    labels: &[(&str, &str)],
) -> Resource {
    let mut metadata = serde_json::json!({ "name": name, "namespace": "default" });
    if !uid.is_empty() {
        metadata["uid"] = uid.into();
    }
    if !labels.is_empty() {
        let map: serde_json::Map<String, serde_json::Value> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        metadata["labels"] = serde_json::Value::Object(map);
    }
    Resource(serde_json::json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": metadata,
    }))
}

#[derive(Default)]
struct State {
    fail_discovery: bool,
    honor_list_selector: bool,
    objects: HashMap<String, Vec<Resource>>,
    feeds: HashMap<String, mpsc::Receiver<ResourceEvent>>,
    fail_list: HashSet<String>,
    fail_watch: HashSet<String>,
    vanish_on_delete: HashSet<String>,
    not_found_on_collection: HashSet<String>,
    journal: Vec<String>,
}

/// The backend under test. Keys are descriptor `gvk_key()` strings.
pub struct MockCluster {
    types: Vec<ResourceType>,
    state: Arc<Mutex<State>>,
}

impl MockCluster {
    pub fn new(types: Vec<ResourceType>) -> Self {
        Self { types, state: Arc::new(Mutex::new(State::default())) }
    }

    pub fn add(&self, key: &str, resource: Resource) {
        self.state
            .lock()
            .unwrap()
            .objects
            .entry(key.to_string())
            .or_default()
            .push(resource);
    }

    /// By default the mock server IGNORES list selector hints, standing in
    /// for backends without server-side label filtering.
    pub fn honor_list_selector(&self) {
        self.state.lock().unwrap().honor_list_selector = true;
    }

    pub fn fail_discovery(&self) {
        self.state.lock().unwrap().fail_discovery = true;
    }

    pub fn fail_list(&self, key: &str) {
        self.state.lock().unwrap().fail_list.insert(key.to_string());
    }

    pub fn fail_watch(&self, key: &str) {
        self.state.lock().unwrap().fail_watch.insert(key.to_string());
    }

    /// Deletes of this type answer 404, as if another controller got there
    /// first.
    pub fn vanish_on_delete(&self, key: &str) {
        self.state
            .lock()
            .unwrap()
            .vanish_on_delete
            .insert(key.to_string());
    }

    pub fn not_found_on_collection(&self, key: &str) {
        self.state
            .lock()
            .unwrap()
            .not_found_on_collection
            .insert(key.to_string());
    }

    /// Register a live watch feed for one type; the returned sender keeps
    /// the per-type stream open until dropped.
    pub fn feed(&self, key: &str) -> mpsc::Sender<ResourceEvent> {
        let (tx, rx) = mpsc::channel(16);
        self.state.lock().unwrap().feeds.insert(key.to_string(), rx);
        tx
    }

    pub fn journal(&self) -> Vec<String> {
        self.state.lock().unwrap().journal.clone()
    }

    pub fn objects(&self, key: &str) -> Vec<Resource> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ClusterBackend for MockCluster {
    async fn server_resources(&self) -> Result<Vec<ResourceType>, ApiError> {
        if self.state.lock().unwrap().fail_discovery {
            return Err(ApiError::Other(anyhow::anyhow!("catalogue unavailable")));
        }
        Ok(self.types.clone())
    }

    fn bind(&self, resource: &ResourceType, _namespace: &str) -> Box<dyn ResourceApi> {
        Box::new(MockHandle { key: resource.gvk_key(), state: Arc::clone(&self.state) })
    }
}

struct MockHandle {
    key: String,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl ResourceApi for MockHandle {
    async fn list(&self, selector: Option<&LabelSelector>) -> Result<Vec<Resource>, ApiError> {
        let mut state = self.state.lock().unwrap();
        let hint = selector.map(LabelSelector::to_query).unwrap_or_default();
        state.journal.push(format!("list {} {hint}", self.key));
        if state.fail_list.contains(&self.key) {
            return Err(ApiError::Other(anyhow::anyhow!("list {} refused", self.key)));
        }
        let items = state.objects.get(&self.key).cloned().unwrap_or_default();
        if state.honor_list_selector {
            if let Some(sel) = selector {
                return Ok(items.into_iter().filter(|r| sel.matches(r)).collect());
            }
        }
        Ok(items)
    }

    async fn watch(&self, label_selector: &str) -> Result<EventStream, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(format!("watch {} {label_selector}", self.key));
        if state.fail_watch.contains(&self.key) {
            return Err(ApiError::Other(anyhow::anyhow!("watch {} refused", self.key)));
        }
        match state.feeds.remove(&self.key) {
            Some(rx) => Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|ev| (ev, rx))
            }))),
            None => Ok(Box::pin(futures::stream::empty())),
        }
    }

    async fn get(&self, name: &str) -> Result<Resource, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(format!("get {}/{name}", self.key));
        state
            .objects
            .get(&self.key)
            .and_then(|items| items.iter().find(|r| r.name() == name))
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn delete(&self, name: &str, propagation: Propagation) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state
            .journal
            .push(format!("delete {}/{name} {propagation:?}", self.key));
        if state.vanish_on_delete.contains(&self.key) {
            return Err(ApiError::NotFound);
        }
        let items = state.objects.entry(self.key.clone()).or_default();
        match items.iter().position(|r| r.name() == name) {
            Some(at) => {
                items.remove(at);
                Ok(())
            }
            None => Err(ApiError::NotFound),
        }
    }

    async fn delete_collection(
        &self,
        selector: &LabelSelector,
        propagation: Propagation,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(format!(
            "deletecollection {} {} {propagation:?}",
            self.key,
            selector.to_query()
        ));
        if state.not_found_on_collection.contains(&self.key) {
            return Err(ApiError::NotFound);
        }
        let items = state.objects.entry(self.key.clone()).or_default();
        items.retain(|r| !selector.matches(r));
        Ok(())
    }
}
