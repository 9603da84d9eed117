//! Apply path: serialize a resource and hand it to an external `kubectl`
//! with flags derived from the cluster connection.

#![forbid(unsafe_code)]

pub mod credentials;
pub use credentials::{materialize_tls, MaterializeOptions, TlsFiles};

use std::process::Stdio;

use caravel_core::{Connection, Resource};
use metrics::counter;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Error)]
pub enum ApplyError {
    /// The connection holds in-memory credential material no flag can
    /// reference; materialize it to files first.
    #[error("cannot derive kubectl flags: {0}")]
    Flags(String),

    #[error("serializing resource for apply")]
    Encode(#[source] serde_json::Error),

    #[error("running kubectl")]
    Subprocess(#[from] std::io::Error),

    /// kubectl exited non-zero; `diagnostic` is its stderr, verbatim.
    #[error("failed to apply '{name}': {diagnostic}")]
    Kubectl { name: String, diagnostic: String },

    #[error("failed to apply '{name}': unreadable kubectl output")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// kubectl flags equivalent to the given connection.
///
/// Only file-backed TLS material can be referenced; in-memory bytes are a
/// hard error so a missing [`materialize_tls`] call fails loudly instead of
/// silently skipping verification.
pub fn kubectl_flags(conn: &Connection) -> Result<Vec<String>, ApplyError> {
    let mut flags = vec!["--server".to_string(), conn.server.clone()];
    if conn.insecure {
        flags.push("--insecure-skip-tls-verify=true".to_string());
    }
    if let Some(path) = &conn.ca_file {
        flags.push("--certificate-authority".to_string());
        flags.push(path.display().to_string());
    } else if conn.ca_data.is_some() {
        return Err(ApplyError::Flags("in-memory CA material".to_string()));
    }
    if let Some(path) = &conn.client_cert_file {
        flags.push("--client-certificate".to_string());
        flags.push(path.display().to_string());
    } else if conn.client_cert_data.is_some() {
        return Err(ApplyError::Flags("in-memory client certificate".to_string()));
    }
    if let Some(path) = &conn.client_key_file {
        flags.push("--client-key".to_string());
        flags.push(path.display().to_string());
    } else if conn.client_key_data.is_some() {
        return Err(ApplyError::Flags("in-memory client key".to_string()));
    }
    if let Some(username) = &conn.username {
        flags.push("--username".to_string());
        flags.push(username.clone());
    }
    if let Some(password) = &conn.password {
        flags.push("--password".to_string());
        flags.push(password.clone());
    }
    if let Some(token) = &conn.bearer_token {
        flags.push("--token".to_string());
        flags.push(token.clone());
    }
    Ok(flags)
}

/// Apply one resource in `namespace` and return the live object kubectl
/// prints back. A non-zero exit surfaces the tool's stderr verbatim.
pub async fn apply_resource(
    conn: &Connection,
    resource: &Resource,
    namespace: &str,
) -> Result<Resource, ApplyError> {
    info!(
        kind = %resource.kind(),
        name = %resource.name(),
        server = %conn.server,
        ns = %namespace,
        "applying resource"
    );
    counter!("caravel_apply_attempts", 1u64);

    let mut args = kubectl_flags(conn)?;
    args.extend(
        ["-n", namespace, "apply", "-o", "json", "-f", "-"]
            .iter()
            .map(|s| s.to_string()),
    );
    let payload = serde_json::to_vec(&resource.0).map_err(ApplyError::Encode)?;

    let mut child = Command::new("kubectl")
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(&payload).await?;
    }
    let output = child.wait_with_output().await?;

    if !output.status.success() {
        counter!("caravel_apply_errors", 1u64);
        return Err(ApplyError::Kubectl {
            name: resource.name().to_string(),
            diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let live = serde_json::from_slice(&output.stdout).map_err(|e| ApplyError::Decode {
        name: resource.name().to_string(),
        source: e,
    })?;
    counter!("caravel_apply_ok", 1u64);
    Ok(Resource(live))
}
