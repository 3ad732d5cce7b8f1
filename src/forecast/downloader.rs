//! Downloads forecast series for every centroid in a request and normalizes
//! them into [`ClimateObservation`]s.
//!
//! The downloader composes the cache (TTL + single-flight) around the retry
//! policy around the raw API call, so the cross-cutting behavior is identical
//! to the reanalysis path and testable on its own.

use crate::config::PipelineConfig;
use crate::forecast::api::{DailyForecast, ForecastApi};
use crate::forecast::cache::{CacheKey, ResponseCache};
use crate::forecast::error::ForecastError;
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::types::centroid::Centroid;
use crate::types::observation::{ClimateObservation, DataSource, Measurement};
use crate::types::request::DownloadRequest;
use crate::types::variable::Variable;
use futures_util::{stream, StreamExt, TryStreamExt};
use log::info;
use std::path::Path;
use std::sync::Arc;

pub struct ForecastDownloader {
    api: Arc<dyn ForecastApi>,
    cache: ResponseCache,
    retry: RetryPolicy,
    max_concurrent: usize,
}

impl ForecastDownloader {
    pub fn new(api: Arc<dyn ForecastApi>, cache_dir: &Path, config: &PipelineConfig) -> Self {
        Self {
            api,
            cache: ResponseCache::new(cache_dir, config.cache_ttl),
            retry: config.retry,
            max_concurrent: config.max_concurrent_requests.max(1),
        }
    }

    /// Fetches the daily forecast for every centroid in `request`.
    ///
    /// A cache hit short-circuits the network entirely; transient HTTP
    /// failures are retried per the policy; 4xx responses fail immediately.
    pub async fn download(
        &self,
        request: &DownloadRequest,
    ) -> Result<Vec<ClimateObservation>, ForecastError> {
        let variables: Vec<Variable> = request
            .variables
            .iter()
            .copied()
            .filter(|v| v.forecast_series().is_some())
            .collect();
        if variables.is_empty() || request.centroids.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            "Downloading forecast for {} centroid(s), {} variable(s), window p{}/f{}",
            request.centroids.len(),
            variables.len(),
            request.past_days,
            request.forecast_days
        );

        let variables = &variables;
        let observations: Vec<Vec<ClimateObservation>> = stream::iter(request.centroids.clone())
            .map(move |centroid| async move {
                self.download_centroid(&centroid, variables, request).await
            })
            .buffer_unordered(self.max_concurrent)
            .try_collect()
            .await?;

        Ok(observations.into_iter().flatten().collect())
    }

    async fn download_centroid(
        &self,
        centroid: &Centroid,
        variables: &[Variable],
        request: &DownloadRequest,
    ) -> Result<Vec<ClimateObservation>, ForecastError> {
        let key = CacheKey::new(centroid, variables, request.past_days, request.forecast_days);
        let forecast = self
            .cache
            .get_or_fetch(key, || {
                retry_with_policy(
                    &self.retry,
                    "forecast download",
                    ForecastError::is_transient,
                    || {
                        self.api.fetch_daily(
                            centroid,
                            variables,
                            request.past_days,
                            request.forecast_days,
                        )
                    },
                )
            })
            .await?;

        Ok(to_observations(&centroid.id, &forecast))
    }
}

/// Expands a per-centroid forecast into one observation per date. Dates with
/// no values at all are omitted rather than fabricated.
fn to_observations(centroid_id: &str, forecast: &DailyForecast) -> Vec<ClimateObservation> {
    let mut observations = Vec::with_capacity(forecast.dates.len());
    for (index, date) in forecast.dates.iter().enumerate() {
        let mut observation =
            ClimateObservation::new(centroid_id, *date, DataSource::Forecast);
        for (variable, values) in &forecast.series {
            let Some((_, unit)) = variable.forecast_series() else {
                continue;
            };
            if let Some(Some(value)) = values.get(index) {
                observation
                    .values
                    .insert(*variable, Measurement::new(*value, unit));
            }
        }
        if !observation.is_empty() {
            observations.push(observation);
        }
    }
    observations
}
