//! Error taxonomy for the chat pipeline.
//!
//! Configuration lookups fail loudly and synchronously; transport failures are
//! mapped to a visible error state; per-chunk parse failures are recovered
//! locally and never appear here.

use std::time::Duration;

/// Errors surfaced by the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Lookup of an unknown provider id.
    #[error("unknown provider: {0}")]
    ProviderNotFound(String),

    /// Lookup of an unknown model for a known provider.
    #[error("unknown model '{model}' for provider '{provider}'")]
    ModelNotFound { provider: String, model: String },

    /// Network failure or non-2xx vendor response.
    #[error("transport error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    /// A request exceeded its configured deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A second submission was started while one is in flight.
    #[error("a submission is already in progress for this conversation")]
    SubmissionInProgress,

    /// Raised before a write that would exceed the storage quota.
    #[error("storage quota exceeded: writing {attempted} bytes would pass the {limit} byte limit")]
    StorageQuota { attempted: u64, limit: u64 },

    /// Request could not be serialized or a full response deserialized.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying HTTP client failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem failure in the conversation store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a transport error from a vendor HTTP status and body.
    pub fn vendor(status: u16, body: impl Into<String>) -> Self {
        Error::Transport {
            status: Some(status),
            message: body.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
