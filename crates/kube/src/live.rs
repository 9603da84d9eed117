//! Live-resource resolution: one desired manifest to its concrete live
//! counterpart, by group/version/kind and name.

use caravel_core::{ApiError, Error, Resource};
use tracing::{debug, info};

use crate::backend::ClusterBackend;

/// Fetch the live counterpart of `manifest` in `namespace`.
///
/// A not-found response is a defined absent result, not an error; it is
/// logged for diagnostics. A manifest kind no discovered type serves fails
/// with [`Error::NotServable`].
pub async fn resolve_live(
    backend: &dyn ClusterBackend,
    manifest: &Resource,
    namespace: &str,
) -> Result<Option<Resource>, Error> {
    let name = manifest.name();
    if name.is_empty() {
        return Err(Error::transport(
            "manifest was supplied without a name",
            ApiError::Other(anyhow::anyhow!("missing metadata.name")),
        ));
    }
    let (group, version) = manifest.group_version();
    let kind = manifest.kind();

    let types = backend.server_resources().await.map_err(Error::Discovery)?;
    let resource = types
        .iter()
        .find(|rt| rt.group == group && rt.version == version && rt.kind == kind)
        .ok_or_else(|| Error::NotServable {
            api_version: manifest.api_version().to_string(),
            kind: kind.to_string(),
        })?;
    debug!(gvk = %resource.gvk_key(), plural = %resource.plural, "descriptor matched for manifest");

    let handle = backend.bind(resource, namespace);
    match handle.get(name).await {
        Ok(live) => Ok(Some(live)),
        Err(e) if e.is_not_found() => {
            info!(gvk = %resource.gvk_key(), name = %name, ns = %namespace, "no live counterpart");
            Ok(None)
        }
        Err(e) => Err(Error::transport(
            format!("get {}/{} failed", resource.gvk_key(), name),
            e,
        )),
    }
}

/// Resolve a slice of manifests in order; each entry is the live
/// counterpart or `None` when absent.
pub async fn resolve_live_all(
    backend: &dyn ClusterBackend,
    manifests: &[Resource],
    namespace: &str,
) -> Result<Vec<Option<Resource>>, Error> {
    let mut live = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        live.push(resolve_live(backend, manifest, namespace).await?);
    }
    Ok(live)
}
