use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to assemble output frame")]
    Frame(#[source] PolarsError),

    #[error("failed to scan existing output '{0}'")]
    ParquetScan(PathBuf, #[source] PolarsError),

    #[error("I/O error writing output '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("encoding error writing output '{0}'")]
    ParquetWrite(PathBuf, #[source] PolarsError),

    #[error("failed to move completed output into place at '{0}'")]
    Persist(PathBuf, #[source] std::io::Error),

    #[error("background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
