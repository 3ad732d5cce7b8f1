use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CentroidError {
    #[error("failed to read centroid file '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("centroid file '{0}' is empty")]
    EmptyFile(PathBuf),

    #[error("failed to parse CSV centroid file '{path}'")]
    CsvParse {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("failed to parse vector centroid file '{path}'")]
    GeoJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("centroid file '{path}' is missing required column or attribute '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("vector centroid file '{path}' contains a non-point geometry for feature '{id}'")]
    NonPointGeometry { path: PathBuf, id: String },

    #[error(
        "centroid '{id}' has out-of-range coordinates ({latitude}, {longitude}) in '{path}'"
    )]
    CoordinateOutOfRange {
        path: PathBuf,
        id: String,
        latitude: f64,
        longitude: f64,
    },

    #[error("centroid id '{id}' appears more than once in '{path}'")]
    DuplicateId { path: PathBuf, id: String },

    #[error("centroid '{id}' in '{path}' has a missing or non-numeric coordinate")]
    MissingCoordinate { path: PathBuf, id: String },

    #[error("background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
