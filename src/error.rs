use crate::centroids::error::CentroidError;
use crate::config::ConfigError;
use crate::forecast::error::ForecastError;
use crate::merge::error::MergeError;
use crate::output::error::OutputError;
use crate::reanalysis::error::ExtractionError;
use crate::session::error::AuthError;
use crate::transform::TransformError;
use crate::types::date_range::InvertedDateRange;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClimateEtlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Centroid(#[from] CentroidError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    InvalidDateRange(#[from] InvertedDateRange),

    #[error("variable catalog is inconsistent: {0}")]
    Catalog(String),

    #[error("run exceeded its deadline of {limit:?}; nothing was written")]
    DeadlineExceeded { limit: Duration },

    #[error("failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),
}
