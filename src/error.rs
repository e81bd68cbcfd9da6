use std::path::PathBuf;
use thiserror::Error;

/// Errors raised inside the accounting engine.
///
/// None of these escape the public service operations: the snapshot source
/// maps them to "unavailable" and the state store logs and swallows them.
#[derive(Debug, Error)]
pub enum CostError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("account endpoint returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed account payload: {0}")]
    Decode(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CostError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CostError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CostError>;
