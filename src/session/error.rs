use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to read service-account key file '{0}'")]
    KeyFileRead(PathBuf, #[source] std::io::Error),

    #[error("service-account key is not valid JSON")]
    MalformedKey(#[source] serde_json::Error),

    #[error("service-account key is missing field '{0}'")]
    IncompleteKey(&'static str),

    #[error("token request to '{0}' failed")]
    TokenRequest(String, #[source] reqwest::Error),

    #[error("platform rejected the service-account credential ({status}) at '{url}'")]
    Rejected { url: String, status: StatusCode },

    #[error("token response from '{0}' could not be parsed")]
    MalformedTokenResponse(String, #[source] reqwest::Error),
}
