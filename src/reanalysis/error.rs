use crate::session::error::AuthError;
use chrono::NaiveDate;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("invalid date range {start}..{end}: {reason}")]
    InvalidDateRange {
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    },

    #[error("platform request failed for {0}")]
    Network(String, #[source] reqwest::Error),

    #[error("platform request failed for {url} with status {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("platform response for {url} could not be parsed")]
    MalformedResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(
        "reanalysis batch of {} centroid(s) failed for {date} after retries",
        .centroid_ids.len()
    )]
    BatchFailed {
        date: NaiveDate,
        centroid_ids: Vec<String>,
        #[source]
        source: Box<ExtractionError>,
    },

    #[error(
        "platform returned no grid cell near {} centroid(s) for {date}",
        .missing.len()
    )]
    BatchIncomplete {
        date: NaiveDate,
        missing: Vec<String>,
    },

    #[error("background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ExtractionError {
    /// Whether the failure is worth retrying: rate limiting, server-side
    /// errors and transport failures are; everything else is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            ExtractionError::Network(_, e) => {
                e.is_timeout() || e.is_connect() || e.is_request()
            }
            ExtractionError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}
