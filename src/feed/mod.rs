pub mod poller;
pub mod types;

use thiserror::Error;

/// Why a single poll produced nothing usable.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request never completed: refused, reset, or timed out.
    #[error("network failure: {0}")]
    Network(String),
    #[error("http status {0}")]
    Status(u16),
    /// Body was not JSON, had the wrong shape, or carried a bad timestamp.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Status(_) => "status",
            FetchError::Malformed(_) => "malformed",
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
