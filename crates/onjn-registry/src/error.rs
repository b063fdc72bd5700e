use std::path::PathBuf;

use onjn_core::RecordError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by registry (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid registry base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("invalid record {}: {source}", serial.as_deref().unwrap_or("<no serial>"))]
    Record {
        serial: Option<String>,
        #[source]
        source: RecordError,
    },

    #[error("cannot read snapshot {}: {source}", path.display())]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse snapshot {} at line {line}: {source}", path.display())]
    SnapshotParse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
