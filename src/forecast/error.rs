use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::SystemTimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("forecast request failed for {0}")]
    Network(String, #[source] reqwest::Error),

    #[error("forecast request failed for {url} with status {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("forecast response for centroid '{centroid_id}' contained no usable data")]
    EmptyDataset { centroid_id: String },

    #[error("forecast response for centroid '{centroid_id}' could not be parsed: {detail}")]
    MalformedResponse { centroid_id: String, detail: String },

    #[error("failed to read forecast cache file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("failed to write forecast cache file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("failed to decode forecast cache file '{0}'")]
    CacheDecode(PathBuf, #[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to encode forecast cache entry")]
    CacheEncode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to read cache age for '{0:?}'")]
    CacheAge(PathBuf, #[source] SystemTimeError),
}

impl ForecastError {
    /// Transient failures are retried; client errors (4xx) never are.
    pub fn is_transient(&self) -> bool {
        match self {
            ForecastError::Network(_, e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ForecastError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}
