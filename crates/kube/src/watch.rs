//! Watch fan-in: one live merged event sequence across every watch-capable
//! resource type, terminated by cancellation or stream closure.

use caravel_core::{Error, ResourceEvent, Verb};
use futures::StreamExt;
use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::ClusterBackend;

fn queue_cap() -> usize {
    std::env::var("CARAVEL_QUEUE_CAP")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1024)
}

/// Merge server-side watches scoped by `label_selector` across every type
/// that supports watch.
///
/// The receiver yields events until `cancel` fires or every underlying
/// stream closes; it closes only after all per-type workers have exited.
/// Cross-type ordering is unspecified; within one type, delivery order
/// matches the underlying stream. A worker whose watch fails to open is
/// logged and excluded from the merge — callers needing full type coverage
/// must verify it independently.
pub async fn watch_by_label(
    backend: &dyn ClusterBackend,
    cancel: CancellationToken,
    namespace: &str,
    label_selector: &str,
) -> Result<mpsc::Receiver<ResourceEvent>, Error> {
    let types = backend.server_resources().await.map_err(Error::Discovery)?;
    let (tx, rx) = mpsc::channel(queue_cap());

    let mut launched = 0usize;
    for rt in types.iter().filter(|rt| rt.supports(Verb::Watch)) {
        launched += 1;
        let handle = backend.bind(rt, namespace);
        let key = rt.gvk_key();
        let tx = tx.clone();
        let cancel = cancel.clone();
        let selector = label_selector.to_string();
        tokio::spawn(async move {
            let mut stream = match handle.watch(&selector).await {
                Ok(stream) => stream,
                Err(e) => {
                    // degraded mode: this type simply drops out of the merge
                    warn!(gvk = %key, error = %e, "watch failed to open; type excluded");
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(gvk = %key, "watch stopped by cancellation");
                        break;
                    }
                    event = stream.next() => match event {
                        Some(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            debug!(gvk = %key, "watch stream closed");
                            break;
                        }
                    }
                }
            }
        });
    }
    // the merged receiver closes once the last worker drops its sender
    drop(tx);
    info!(watchers = launched, selector = %label_selector, ns = %namespace, "watch fan-in started");
    counter!("caravel_watch_workers", launched as u64);
    Ok(rx)
}
