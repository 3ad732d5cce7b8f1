//! Process-wide pipeline configuration, resolved once at startup.
//!
//! The mandatory platform credential and the optional overrides are read from
//! the environment up front so a missing credential is reported before any
//! extraction work begins, not discovered deep inside a query.

use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding a path to the service-account key file.
pub const ENV_CREDENTIAL_PATH: &str = "GEE_SERVICE_ACCOUNT_JSON_PATH";
/// Environment variable holding the service-account key JSON inline.
pub const ENV_CREDENTIAL_JSON: &str = "GEE_SERVICE_ACCOUNT_JSON";
/// Environment variable overriding the forecast API base URL.
pub const ENV_FORECAST_URL: &str = "FORECAST_API_URL";
/// Environment variable selecting the log verbosity surfaced to the caller.
pub const ENV_LOG_LEVEL: &str = "CLIMATE_ETL_LOG";

const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no platform credential configured; set {ENV_CREDENTIAL_PATH} or {ENV_CREDENTIAL_JSON}"
    )]
    MissingCredential,

    #[error("environment variable {0} contains invalid unicode")]
    InvalidEnvVar(String),
}

/// Where the service-account credential comes from: a key file on disk or an
/// inline JSON payload. Resolved into a concrete key exactly once, by the
/// session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    KeyFile(PathBuf),
    Inline(String),
}

/// All knobs the pipeline honors, with the defaults the production paths use.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Service-account credential for the reanalysis platform. Mandatory.
    pub credential: CredentialSource,
    /// Base URL of the forecast API.
    pub forecast_base_url: String,
    /// IANA timezone the forecast daily series are requested in.
    pub forecast_timezone: String,
    /// Cache directory override; the system cache dir is used when `None`.
    pub cache_dir: Option<PathBuf>,
    /// Time-to-live for cached forecast responses.
    pub cache_ttl: Duration,
    /// Upper bound on in-flight requests per extraction path.
    pub max_concurrent_requests: usize,
    /// Centroids per platform-side feature collection.
    pub batch_size: usize,
    /// Shared retry policy for both network paths.
    pub retry: RetryPolicy,
    /// Days the reanalysis collection trails realtime.
    pub availability_lag_days: u32,
    /// Fraction of records validation may drop before the run fails.
    pub max_dropped_fraction: f64,
    /// Log verbosity requested for this run; surfaced to the embedding
    /// application, which owns logger installation.
    pub log_level: String,
}

impl PipelineConfig {
    pub fn new(credential: CredentialSource) -> Self {
        Self {
            credential,
            forecast_base_url: DEFAULT_FORECAST_URL.to_string(),
            forecast_timezone: "UTC".to_string(),
            cache_dir: None,
            cache_ttl: Duration::from_secs(3600),
            max_concurrent_requests: 6,
            batch_size: 1000,
            retry: RetryPolicy::default(),
            availability_lag_days: 5,
            max_dropped_fraction: 0.5,
            log_level: "info".to_string(),
        }
    }

    /// Resolves the configuration from the process environment.
    ///
    /// The credential path takes precedence over the inline payload when both
    /// are set, matching how deployments layer a mounted key file over a
    /// baked-in fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credential = match read_env(ENV_CREDENTIAL_PATH)? {
            Some(path) => CredentialSource::KeyFile(PathBuf::from(path)),
            None => match read_env(ENV_CREDENTIAL_JSON)? {
                Some(json) => CredentialSource::Inline(json),
                None => return Err(ConfigError::MissingCredential),
            },
        };

        let mut config = Self::new(credential);
        if let Some(url) = read_env(ENV_FORECAST_URL)? {
            config.forecast_base_url = url;
        }
        if let Some(level) = read_env(ENV_LOG_LEVEL)? {
            config.log_level = level;
        }
        Ok(config)
    }
}

fn read_env(name: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(ConfigError::InvalidEnvVar(name.to_string()))
        }
    }
}
