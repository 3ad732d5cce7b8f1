mod centroids;
mod config;
mod error;
mod forecast;
mod merge;
mod output;
mod pipeline;
mod reanalysis;
mod retry;
mod session;
mod transform;
mod types;
mod utils;

pub use error::ClimateEtlError;
pub use pipeline::{ClimatePipeline, RunSummary};

pub use config::{ConfigError, CredentialSource, PipelineConfig};
pub use config::{ENV_CREDENTIAL_JSON, ENV_CREDENTIAL_PATH, ENV_FORECAST_URL, ENV_LOG_LEVEL};

pub use types::centroid::{Centroid, LatLon};
pub use types::date_range::{DateRange, InvertedDateRange};
pub use types::observation::{ClimateObservation, DataSource, Measurement, MergedRecord};
pub use types::request::{DownloadRequest, ExtractionRequest};
pub use types::variable::{verify_catalog, Unit, Variable};

pub use centroids::error::CentroidError;
pub use centroids::loader::load_centroids;

pub use session::error::AuthError;
pub use session::manager::{global as session_manager, ServiceAccountKey, Session, SessionManager};

pub use reanalysis::client::{GridCellSample, HttpPlatformClient, PlatformClient};
pub use reanalysis::error::ExtractionError;
pub use reanalysis::extractor::ReanalysisExtractor;

pub use forecast::api::{DailyForecast, ForecastApi, OpenMeteoApi};
pub use forecast::cache::{CacheKey, ResponseCache};
pub use forecast::downloader::ForecastDownloader;
pub use forecast::error::ForecastError;

pub use transform::{
    kelvin_to_celsius, meters_to_millimeters, pascals_to_hectopascals, to_canonical_units,
    TransformError,
};

pub use merge::error::MergeError;
pub use merge::merger::{merge, SourcePrecedence};
pub use merge::validator::{ValidationOutcome, Validator};

pub use output::error::OutputError;
pub use output::writer::write_records;

pub use retry::{retry_with_policy, RetryPolicy};
