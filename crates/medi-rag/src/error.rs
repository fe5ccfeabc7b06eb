//! Error taxonomy
//!
//! Only `TriageError` is allowed to reach callers of the assistant. HTTP and
//! source errors stop at the retrieval orchestrator, which turns them into
//! strings on the result envelope.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    /// Connection-level failure (DNS, refused, reset).
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Non-2xx response. Never retried.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("failed to read response body from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("cache error: {0}")]
    Cache(String),
}

impl HttpError {
    /// Only transport failures are worth retrying; a status code is an answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HttpError::Network { .. } | HttpError::Timeout { .. })
    }

    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() || err.is_request() {
            HttpError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else if err.is_body() || err.is_decode() {
            HttpError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            HttpError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The upstream answered, but not in a shape the adapter understands.
    #[error("unexpected response shape: {0}")]
    Parse(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum TriageError {
    /// The classification oracle could not be reached. No safe default label
    /// exists, so this is surfaced instead of guessed around.
    #[error("question classifier failed: {0}")]
    Classifier(#[source] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
