//! Fan-out executor for list and delete: one worker per eligible resource
//! type, folded into one deduplicated result or one representative error.

use caravel_core::{ApiError, Error, LabelSelector, Propagation, Resource, Verb};
use metrics::counter;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::backend::{ClusterBackend, ResourceApi};
use crate::discovery::ResourceType;
use crate::merge::ResourceSet;

/// Propagation every engine delete issues: dependents are removed before
/// the parent counts as deleted. Callers rely on that ordering.
pub const DELETE_PROPAGATION: Propagation = Propagation::Foreground;

/// Per-type delete plan, picked from the advertised verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStrategy {
    /// One deletecollection call carries the selector.
    Collection,
    /// List, re-filter client-side, then delete each match by name.
    PerItem,
}

/// Strategy table: deletecollection wins over per-item delete; a type with
/// neither verb sits the fan-out out.
pub fn delete_strategy(resource: &ResourceType) -> Option<DeleteStrategy> {
    if resource.supports(Verb::DeleteCollection) {
        Some(DeleteStrategy::Collection)
    } else if resource.supports(Verb::Delete) {
        Some(DeleteStrategy::PerItem)
    } else {
        None
    }
}

/// List every resource carrying the label across all list-capable types.
///
/// Concurrency equals the number of eligible descriptors. Every worker runs
/// to completion even after a sibling fails; on any failure the call returns
/// `Error::Aggregate` wrapping the failure with the lowest catalogue index.
pub async fn list_by_label(
    backend: &dyn ClusterBackend,
    namespace: &str,
    selector: &LabelSelector,
) -> Result<Vec<Resource>, Error> {
    let types = backend.server_resources().await.map_err(Error::Discovery)?;
    list_across(backend, &types, namespace, Some(selector)).await
}

/// List resources of an explicit descriptor set, deduplicated by identity.
/// The selector is optional; when present the client-side re-check applies.
pub async fn list_types(
    backend: &dyn ClusterBackend,
    types: &[ResourceType],
    namespace: &str,
    selector: Option<&LabelSelector>,
) -> Result<Vec<Resource>, Error> {
    list_across(backend, types, namespace, selector).await
}

async fn list_across(
    backend: &dyn ClusterBackend,
    types: &[ResourceType],
    namespace: &str,
    selector: Option<&LabelSelector>,
) -> Result<Vec<Resource>, Error> {
    let mut workers = JoinSet::new();
    let mut launched = 0usize;
    for (index, rt) in types.iter().enumerate() {
        if !rt.supports(Verb::List) {
            continue;
        }
        launched += 1;
        let handle = backend.bind(rt, namespace);
        let key = rt.gvk_key();
        let selector = selector.cloned();
        workers.spawn(async move { (index, list_one_type(handle, &key, selector.as_ref()).await) });
    }
    debug!(types = types.len(), launched, ns = %namespace, "list fan-out started");
    counter!("caravel_list_workers", launched as u64);

    let mut set = ResourceSet::new();
    let mut failures = Vec::new();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((_, Ok(items))) => set.extend(items),
            Ok((index, Err(e))) => failures.push((index, e)),
            Err(join_err) => failures.push((
                usize::MAX,
                Error::transport("list worker panicked", ApiError::Other(join_err.into())),
            )),
        }
    }
    match first_failure(failures, launched) {
        Some(err) => Err(err),
        None => {
            debug!(items = set.len(), "list fan-out merged");
            Ok(set.into_vec())
        }
    }
}

async fn list_one_type(
    handle: Box<dyn ResourceApi>,
    key: &str,
    selector: Option<&LabelSelector>,
) -> Result<Vec<Resource>, Error> {
    let items = handle
        .list(selector)
        .await
        .map_err(|e| Error::transport(format!("list {key} failed"), e))?;
    // server-side filtering is a hint; not every API backend honors it
    Ok(match selector {
        Some(sel) => items.into_iter().filter(|r| sel.matches(r)).collect(),
        None => items,
    })
}

/// Delete every resource carrying the label across all delete-capable
/// types, with foreground propagation. Not-found responses collapse to
/// success, making the call idempotent. Aggregation as in [`list_by_label`].
pub async fn delete_by_label(
    backend: &dyn ClusterBackend,
    namespace: &str,
    selector: &LabelSelector,
) -> Result<(), Error> {
    let types = backend.server_resources().await.map_err(Error::Discovery)?;
    let mut workers = JoinSet::new();
    let mut launched = 0usize;
    for (index, rt) in types.iter().enumerate() {
        let Some(strategy) = delete_strategy(rt) else {
            continue;
        };
        launched += 1;
        let handle = backend.bind(rt, namespace);
        let key = rt.gvk_key();
        let selector = selector.clone();
        workers
            .spawn(async move { (index, delete_one_type(handle, &key, strategy, &selector).await) });
    }
    debug!(types = types.len(), launched, ns = %namespace, "delete fan-out started");
    counter!("caravel_delete_workers", launched as u64);

    let mut failures = Vec::new();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((index, Err(e))) => failures.push((index, e)),
            Err(join_err) => failures.push((
                usize::MAX,
                Error::transport("delete worker panicked", ApiError::Other(join_err.into())),
            )),
        }
    }
    match first_failure(failures, launched) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn delete_one_type(
    handle: Box<dyn ResourceApi>,
    key: &str,
    strategy: DeleteStrategy,
    selector: &LabelSelector,
) -> Result<(), Error> {
    match strategy {
        DeleteStrategy::Collection => {
            match handle.delete_collection(selector, DELETE_PROPAGATION).await {
                Ok(()) => Ok(()),
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(Error::transport(format!("deletecollection {key} failed"), e)),
            }
        }
        DeleteStrategy::PerItem => {
            let items = handle
                .list(Some(selector))
                .await
                .map_err(|e| Error::transport(format!("list {key} failed"), e))?;
            for item in items.into_iter().filter(|r| selector.matches(r)) {
                match handle.delete(item.name(), DELETE_PROPAGATION).await {
                    Ok(()) | Err(ApiError::NotFound) => {}
                    Err(e) => {
                        return Err(Error::transport(
                            format!("delete {key}/{} failed", item.name()),
                            e,
                        ))
                    }
                }
            }
            Ok(())
        }
    }
}

/// Pick the representative error: lowest catalogue index wins. The source
/// implementation left this to scheduler timing; here it is deterministic.
fn first_failure(mut failures: Vec<(usize, Error)>, launched: usize) -> Option<Error> {
    if failures.is_empty() {
        return None;
    }
    let failed = failures.len();
    counter!("caravel_fanout_failures", failed as u64);
    failures.sort_by_key(|(index, _)| *index);
    let mut iter = failures.into_iter();
    let first = iter.next().map(|(_, e)| e)?;
    for (index, err) in iter {
        warn!(index, error = %err, "additional fan-out failure dropped");
    }
    Some(Error::Aggregate { failed, launched, source: Box::new(first) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(verbs: &[&str]) -> ResourceType {
        ResourceType {
            group: String::new(),
            version: "v1".into(),
            kind: "Pod".into(),
            plural: "pods".into(),
            namespaced: true,
            verbs: verbs.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn strategy_prefers_deletecollection() {
        assert_eq!(
            delete_strategy(&descriptor(&["delete", "deletecollection"])),
            Some(DeleteStrategy::Collection)
        );
        assert_eq!(
            delete_strategy(&descriptor(&["delete", "list"])),
            Some(DeleteStrategy::PerItem)
        );
        assert_eq!(delete_strategy(&descriptor(&["get", "list"])), None);
    }

    #[test]
    fn representative_error_is_lowest_index() {
        let failures = vec![
            (4, Error::transport("d", ApiError::NotFound)),
            (1, Error::transport("b", ApiError::NotFound)),
            (3, Error::transport("c", ApiError::NotFound)),
        ];
        match first_failure(failures, 5) {
            Some(Error::Aggregate { failed, launched, source }) => {
                assert_eq!(failed, 3);
                assert_eq!(launched, 5);
                assert_eq!(source.to_string(), "b");
            }
            other => panic!("expected aggregate, got {other:?}"),
        }
        assert!(first_failure(Vec::new(), 5).is_none());
    }
}
