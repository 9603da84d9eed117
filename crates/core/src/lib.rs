//! Caravel core types: the schema-less resource model shared by the
//! orchestration engine, the apply path, and the RPC façades.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub mod error;
pub use error::{ApiError, Error};

/// Verbs the engine negotiates per resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    List,
    Watch,
    Delete,
    DeleteCollection,
}

impl Verb {
    /// The verb string as the discovery catalogue spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::List => "list",
            Verb::Watch => "watch",
            Verb::Delete => "delete",
            Verb::DeleteCollection => "deletecollection",
        }
    }
}

/// Cascading-delete mode. The engine always requests `Foreground` so that
/// dependents are removed before the parent counts as deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Propagation {
    Foreground,
    Background,
    Orphan,
}

/// A point-in-time cluster object: apiVersion/kind plus an opaque payload.
///
/// Accessors only read; the engine never mutates a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(pub Value);

impl Resource {
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        use anyhow::Context as _;
        let val: serde_yaml::Value = serde_yaml::from_str(yaml).context("parsing YAML")?;
        Ok(Self(serde_json::to_value(val).context("converting YAML to JSON")?))
    }

    pub fn api_version(&self) -> &str {
        self.0.get("apiVersion").and_then(Value::as_str).unwrap_or("")
    }

    pub fn kind(&self) -> &str {
        self.0.get("kind").and_then(Value::as_str).unwrap_or("")
    }

    /// Split `apiVersion` into (group, version); the core group is `""`.
    pub fn group_version(&self) -> (&str, &str) {
        match self.api_version().split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", self.api_version()),
        }
    }

    pub fn name(&self) -> &str {
        self.0
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.pointer("/metadata/namespace").and_then(Value::as_str)
    }

    pub fn uid(&self) -> Option<&str> {
        self.0.pointer("/metadata/uid").and_then(Value::as_str)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.0
            .pointer("/metadata/labels")
            .and_then(Value::as_object)
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.0
            .pointer("/metadata/labels")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Unique identity: the server-assigned uid when present and well formed,
    /// otherwise the (group, version, kind, namespace, name) coordinates.
    pub fn identity(&self) -> Identity {
        if let Some(uid) = self.uid().and_then(|s| Uuid::parse_str(s).ok()) {
            return Identity::Uid(uid);
        }
        let (group, version) = self.group_version();
        Identity::Coordinates {
            group: group.to_string(),
            version: version.to_string(),
            kind: self.kind().to_string(),
            namespace: self.namespace().map(str::to_string),
            name: self.name().to_string(),
        }
    }
}

/// Identity a resource deduplicates under when it is reachable through more
/// than one API group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Uid(Uuid),
    Coordinates {
        group: String,
        version: String,
        kind: String,
        namespace: Option<String>,
        name: String,
    },
}

/// Exact-match label predicate. The only selector language callers get;
/// the server-side hint it renders is best-effort and every list/delete
/// path re-checks `matches` client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl LabelSelector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    /// Server-side selector hint, `key=value`.
    pub fn to_query(&self) -> String {
        format!("{}={}", self.key, self.value)
    }

    /// Mandatory client-side re-check; not every API backend honors the hint.
    pub fn matches(&self, resource: &Resource) -> bool {
        resource.label(&self.key) == Some(self.value.as_str())
    }
}

/// One element of a merged watch sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub kind: EventKind,
    pub resource: Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
}

/// Opaque endpoint and credential material for one cluster.
///
/// The engine mints per-type clients from it; the apply path materializes
/// the in-memory TLS bytes to files and rewrites the `*_file` fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Connection {
    pub server: String,
    pub insecure: bool,
    pub ca_data: Option<Vec<u8>>,
    pub ca_file: Option<PathBuf>,
    pub client_cert_data: Option<Vec<u8>>,
    pub client_cert_file: Option<PathBuf>,
    pub client_key_data: Option<Vec<u8>>,
    pub client_key_file: Option<PathBuf>,
    pub bearer_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Connection {
    pub fn new(server: impl Into<String>) -> Self {
        Self { server: server.into(), ..Self::default() }
    }
}
