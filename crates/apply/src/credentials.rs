//! Materialize a connection's in-memory TLS material to files an external
//! tool can reference by path.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use caravel_core::Connection;
use tempfile::{Builder, TempPath};
use tracing::debug;

/// Where credential files are written. The caller resolves this once and
/// passes it in; the materializer never consults ambient state.
#[derive(Debug, Clone)]
pub struct MaterializeOptions {
    pub scratch_dir: PathBuf,
}

impl MaterializeOptions {
    /// Prefer a memory-backed filesystem when the host has one, so key
    /// material never reaches durable storage.
    pub fn detect() -> Self {
        let shm = Path::new("/dev/shm");
        let scratch_dir = if shm.is_dir() { shm.to_path_buf() } else { std::env::temp_dir() };
        Self { scratch_dir }
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { scratch_dir: dir.into() }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Ca,
    Cert,
    Key,
}

/// Scoped handle to the materialized files.
///
/// [`TlsFiles::release`] removes the files and resets the connection's path
/// fields. If release is never reached, dropping the handle still removes
/// the files from disk.
#[derive(Debug, Default)]
pub struct TlsFiles {
    entries: Vec<(Slot, TempPath)>,
}

impl TlsFiles {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|(_, p)| p.as_ref())
    }

    /// Remove every materialized file and reset the corresponding path
    /// fields on the connection.
    pub fn release(self, conn: &mut Connection) -> io::Result<()> {
        for (slot, path) in self.entries {
            debug!(path = %path.display(), "removing credential file");
            path.close()?;
            match slot {
                Slot::Ca => conn.ca_file = None,
                Slot::Cert => conn.client_cert_file = None,
                Slot::Key => conn.client_key_file = None,
            }
        }
        Ok(())
    }
}

/// Write the connection's in-memory CA/cert/key bytes to files under the
/// configured scratch directory and rewrite the `*_file` fields to point at
/// them. Fields that already reference a file are left untouched.
pub fn materialize_tls(
    conn: &mut Connection,
    options: &MaterializeOptions,
) -> io::Result<TlsFiles> {
    let host = host_prefix(&conn.server);
    let mut files = TlsFiles::default();

    if conn.ca_file.is_none() {
        if let Some(data) = conn.ca_data.clone() {
            let path = write_scratch(&options.scratch_dir, &format!("{host}-ca.crt-"), &data)?;
            conn.ca_file = Some(path.to_path_buf());
            files.entries.push((Slot::Ca, path));
        }
    }
    if conn.client_cert_file.is_none() {
        if let Some(data) = conn.client_cert_data.clone() {
            let path =
                write_scratch(&options.scratch_dir, &format!("{host}-client.crt-"), &data)?;
            conn.client_cert_file = Some(path.to_path_buf());
            files.entries.push((Slot::Cert, path));
        }
    }
    if conn.client_key_file.is_none() {
        if let Some(data) = conn.client_key_data.clone() {
            let path =
                write_scratch(&options.scratch_dir, &format!("{host}-client.key-"), &data)?;
            conn.client_key_file = Some(path.to_path_buf());
            files.entries.push((Slot::Key, path));
        }
    }
    Ok(files)
}

fn write_scratch(dir: &Path, prefix: &str, data: &[u8]) -> io::Result<TempPath> {
    let mut file = Builder::new().prefix(prefix).tempfile_in(dir)?;
    file.write_all(data)?;
    file.flush()?;
    Ok(file.into_temp_path())
}

fn host_prefix(server: &str) -> String {
    let trimmed = server
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect()
}
