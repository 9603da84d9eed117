//! Error taxonomy for the orchestration engine.

use thiserror::Error;

/// Outcome of a single backend request, as the per-type client reports it.
///
/// `NotFound` is never surfaced to callers: the engine collapses it to
/// success for deletes and to an absent result for live resolution.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

/// Engine-level failures a caller can observe.
#[derive(Debug, Error)]
pub enum Error {
    /// The catalogue fetch failed. Fatal to the whole call; no partial
    /// enumeration is accepted.
    #[error("API catalogue discovery failed")]
    Discovery(#[source] ApiError),

    /// A single request failed.
    #[error("{context}")]
    Transport {
        context: String,
        #[source]
        source: ApiError,
    },

    /// The manifest names a kind no discovered type serves.
    #[error("cluster does not serve {api_version}/{kind}")]
    NotServable { api_version: String, kind: String },

    /// One representative failure among concurrently failing fan-out
    /// workers: the one with the lowest catalogue index. Sibling errors are
    /// logged, then dropped.
    #[error("{failed} of {launched} fan-out workers failed")]
    Aggregate {
        failed: usize,
        launched: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn transport(context: impl Into<String>, source: ApiError) -> Self {
        Error::Transport { context: context.into(), source }
    }
}
