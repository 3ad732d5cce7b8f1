//! The main entry point for running the climate ETL pipeline.
//!
//! A [`ClimatePipeline`] holds the resolved configuration and the two source
//! clients. The end-to-end [`ClimatePipeline::run`] operation loads
//! centroids, drives the two extraction paths concurrently, normalizes
//! units, merges, validates and persists the result; the individual
//! operations are also exposed for callers that orchestrate their own flow.

use crate::centroids::loader::load_centroids;
use crate::config::PipelineConfig;
use crate::error::ClimateEtlError;
use crate::forecast::api::{ForecastApi, OpenMeteoApi};
use crate::forecast::downloader::ForecastDownloader;
use crate::merge::merger::{merge, SourcePrecedence};
use crate::merge::validator::Validator;
use crate::reanalysis::client::{HttpPlatformClient, PlatformClient};
use crate::reanalysis::extractor::ReanalysisExtractor;
use crate::transform::to_canonical_units;
use crate::types::date_range::DateRange;
use crate::types::observation::ClimateObservation;
use crate::types::request::{DownloadRequest, ExtractionRequest};
use crate::types::variable::{verify_catalog, Variable};
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use crate::output::writer::write_records;
use bon::bon;
use chrono::NaiveDate;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// What a completed run produced: surviving record count, how many records
/// validation dropped, and where the artifact was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub dropped: usize,
    pub output: PathBuf,
}

/// The pipeline client.
///
/// Create one with [`ClimatePipeline::new`] for the production sources, or
/// [`ClimatePipeline::with_sources`] to inject alternative implementations of
/// the two source seams (tests use this for mocks).
///
/// # Examples
///
/// ```no_run
/// # use climate_etl::{ClimatePipeline, PipelineConfig, ClimateEtlError};
/// # use chrono::NaiveDate;
/// # async fn run() -> Result<(), ClimateEtlError> {
/// let config = PipelineConfig::from_env()?;
/// let pipeline = ClimatePipeline::new(config).await?;
///
/// let summary = pipeline
///     .run()
///     .centroids_path("data/centroids.csv")
///     .start_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
///     .end_date(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap())
///     .output("outputs/climate.parquet")
///     .call()
///     .await?;
/// println!("wrote {} records to {}", summary.records, summary.output.display());
/// # Ok(())
/// # }
/// ```
pub struct ClimatePipeline {
    config: Arc<PipelineConfig>,
    platform: Arc<dyn PlatformClient>,
    forecast_api: Arc<dyn ForecastApi>,
    cache_dir: PathBuf,
}

#[bon]
impl ClimatePipeline {
    /// Creates a pipeline wired to the production reanalysis platform and
    /// forecast API.
    pub async fn new(config: PipelineConfig) -> Result<Self, ClimateEtlError> {
        let config = Arc::new(config);
        let platform = Arc::new(HttpPlatformClient::new(Arc::clone(&config)));
        let forecast_api = Arc::new(OpenMeteoApi::new(
            &config.forecast_base_url,
            &config.forecast_timezone,
        ));
        Self::with_sources(config, platform, forecast_api).await
    }

    /// Creates a pipeline with injected source implementations.
    pub async fn with_sources(
        config: Arc<PipelineConfig>,
        platform: Arc<dyn PlatformClient>,
        forecast_api: Arc<dyn ForecastApi>,
    ) -> Result<Self, ClimateEtlError> {
        verify_catalog().map_err(ClimateEtlError::Catalog)?;

        let cache_dir = match &config.cache_dir {
            Some(dir) => dir.clone(),
            None => get_cache_dir().map_err(ClimateEtlError::CacheDirResolution)?,
        };
        ensure_cache_dir_exists(&cache_dir)
            .await
            .map_err(|e| ClimateEtlError::CacheDirCreation(cache_dir.clone(), e))?;

        Ok(Self {
            config,
            platform,
            forecast_api,
            cache_dir,
        })
    }

    /// Runs the reanalysis extraction path on its own.
    pub async fn extract_reanalysis(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Vec<ClimateObservation>, ClimateEtlError> {
        let extractor = ReanalysisExtractor::new(Arc::clone(&self.platform), &self.config);
        Ok(extractor.extract(request).await?)
    }

    /// Runs the forecast download path on its own.
    pub async fn download_forecast(
        &self,
        request: &DownloadRequest,
    ) -> Result<Vec<ClimateObservation>, ClimateEtlError> {
        let downloader = ForecastDownloader::new(
            Arc::clone(&self.forecast_api),
            &self.cache_dir,
            &self.config,
        );
        Ok(downloader.download(request).await?)
    }

    /// The end-to-end operation: extract both sources concurrently,
    /// normalize, merge, validate, persist.
    ///
    /// # Arguments
    ///
    /// * `.centroids_path(impl AsRef<Path>)`: **Required.** Tabular or vector centroid file.
    /// * `.start_date(NaiveDate)` / `.end_date(NaiveDate)`: **Required.** Reanalysis date range (inclusive).
    /// * `.output(impl Into<PathBuf>)`: **Required.** Target Parquet artifact.
    /// * `.variables(Vec<Variable>)`: Optional. Defaults to the full catalog.
    /// * `.past_days(u32)` / `.forecast_days(u32)`: Optional. Forecast window, defaults 5 and 3.
    /// * `.precedence(SourcePrecedence)`: Optional. Overlap rule, defaults to reanalysis-authoritative.
    /// * `.append(bool)`: Optional. Fold into an existing artifact instead of replacing it.
    /// * `.deadline(Duration)`: Optional. Cancels extraction and merge past this duration; nothing is written.
    ///
    /// # Errors
    ///
    /// Input and configuration problems ([`ClimateEtlError::Centroid`],
    /// [`ClimateEtlError::InvalidDateRange`], [`ClimateEtlError::Auth`]) fail
    /// the run immediately. Source failures surface as
    /// [`ClimateEtlError::Extraction`] / [`ClimateEtlError::Forecast`] once
    /// retries are exhausted. [`ClimateEtlError::Merge`] reports integrity
    /// defects or an excessive validation drop rate.
    #[builder]
    pub async fn run(
        &self,
        centroids_path: impl AsRef<Path>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        output: impl Into<PathBuf>,
        variables: Option<Vec<Variable>>,
        past_days: Option<u32>,
        forecast_days: Option<u32>,
        precedence: Option<SourcePrecedence>,
        append: Option<bool>,
        deadline: Option<Duration>,
    ) -> Result<RunSummary, ClimateEtlError> {
        let date_range = DateRange::new(start_date, end_date)?;
        let variables = variables.unwrap_or_else(|| Variable::ALL.to_vec());
        let centroids = load_centroids(centroids_path.as_ref()).await?;

        let extraction_request = ExtractionRequest::new(
            centroids.clone(),
            date_range,
            variables.iter().copied(),
        );
        let download_request = DownloadRequest::new(
            centroids,
            variables.iter().copied(),
            past_days.unwrap_or(5),
            forecast_days.unwrap_or(3),
        );

        let work = async {
            let (reanalysis, forecast) = tokio::try_join!(
                self.extract_reanalysis(&extraction_request),
                self.download_forecast(&download_request),
            )?;
            info!(
                "Collected {} reanalysis and {} forecast observation(s)",
                reanalysis.len(),
                forecast.len()
            );

            let reanalysis = to_canonical_units(reanalysis)?;
            let forecast = to_canonical_units(forecast)?;

            let merged = merge(reanalysis, forecast, precedence.unwrap_or_default())?;
            let outcome = Validator::new(self.config.max_dropped_fraction).validate(merged)?;
            Ok::<_, ClimateEtlError>(outcome)
        };

        let outcome = match deadline {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| ClimateEtlError::DeadlineExceeded { limit })?,
            None => work.await,
        }?;

        let records = outcome.records.len();
        let output = write_records(
            outcome.records,
            &output.into(),
            append.unwrap_or(false),
        )
        .await?;

        Ok(RunSummary {
            records,
            dropped: outcome.dropped,
            output,
        })
    }
}
