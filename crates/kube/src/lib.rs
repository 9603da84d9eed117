//! Caravel engine: runtime API discovery and per-type fan-out over one
//! cluster.
//!
//! Every operation starts from a fresh catalogue of served resource types,
//! launches one worker per eligible type, and folds the per-type outputs
//! into one deduplicated answer. The transport seam is the
//! [`ClusterBackend`]/[`ResourceApi`] trait pair; [`KubeBackend`] is the
//! kube-rs implementation.

#![forbid(unsafe_code)]

pub mod backend;
pub mod client;
pub mod discovery;
pub mod fanout;
pub mod live;
pub mod merge;
pub mod watch;

pub use backend::{ClusterBackend, EventStream, ResourceApi};
pub use client::KubeBackend;
pub use discovery::ResourceType;
pub use fanout::{delete_by_label, delete_strategy, list_by_label, list_types, DeleteStrategy};
pub use live::{resolve_live, resolve_live_all};
pub use merge::{merge, ResourceSet};
pub use watch::watch_by_label;
