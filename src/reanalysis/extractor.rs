//! Extracts reanalysis variables for every centroid/date in a request.
//!
//! Centroids are batched into platform-side collections (one query per batch
//! per day) instead of one query per centroid, and the batches run through a
//! bounded pool of in-flight requests. Grid cells returned by the platform
//! are reduced to one value per centroid by nearest-cell lookup.

use crate::config::PipelineConfig;
use crate::reanalysis::client::{GridCellSample, PlatformClient};
use crate::reanalysis::error::ExtractionError;
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::types::centroid::Centroid;
use crate::types::observation::{ClimateObservation, DataSource, Measurement};
use crate::types::request::ExtractionRequest;
use crate::types::variable::Variable;
use chrono::{NaiveDate, Utc};
use futures_util::{stream, StreamExt, TryStreamExt};
use haversine::{distance, Location, Units};
use log::info;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::sync::Arc;

/// First day of the reanalysis collection's temporal coverage.
const COLLECTION_START: (i32, u32, u32) = (1950, 1, 1);
/// A centroid further than this from every returned cell center has no
/// usable sample; roughly twice the grid spacing.
const MAX_CELL_DISTANCE_KM: f64 = 25.0;

pub struct ReanalysisExtractor {
    client: Arc<dyn PlatformClient>,
    batch_size: usize,
    max_concurrent: usize,
    retry: RetryPolicy,
    availability_lag_days: u32,
}

impl ReanalysisExtractor {
    pub fn new(client: Arc<dyn PlatformClient>, config: &PipelineConfig) -> Self {
        Self {
            client,
            batch_size: config.batch_size.max(1),
            max_concurrent: config.max_concurrent_requests.max(1),
            retry: config.retry,
            availability_lag_days: config.availability_lag_days,
        }
    }

    /// Runs the full extraction for `request`.
    ///
    /// Fails fast with [`ExtractionError::InvalidDateRange`] before any
    /// network traffic when the range falls outside the collection's
    /// coverage, and with [`ExtractionError::Auth`] when the platform session
    /// cannot be established. A batch that exhausts its retries fails the
    /// extraction with the offending centroids and date attached.
    pub async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Vec<ClimateObservation>, ExtractionError> {
        self.check_coverage(request)?;

        let variables: Vec<Variable> = request
            .variables
            .iter()
            .copied()
            .filter(|v| v.reanalysis_band().is_some())
            .collect();
        if variables.is_empty() || request.centroids.is_empty() {
            return Ok(Vec::new());
        }

        self.client.ensure_session().await?;

        let batches: Vec<&[Centroid]> = request.centroids.chunks(self.batch_size).collect();
        let tasks: Vec<(NaiveDate, &[Centroid])> = request
            .date_range
            .iter_days()
            .flat_map(|date| batches.iter().map(move |batch| (date, *batch)))
            .collect();

        info!(
            "Extracting {} variable(s) for {} centroid(s) over {} day(s) in {} request(s)",
            variables.len(),
            request.centroids.len(),
            request.date_range.num_days(),
            tasks.len()
        );

        let observations: Vec<Vec<ClimateObservation>> = stream::iter(tasks)
            .map(|(date, batch)| self.extract_batch(date, batch, &variables))
            .buffer_unordered(self.max_concurrent)
            .try_collect()
            .await?;

        Ok(observations.into_iter().flatten().collect())
    }

    fn check_coverage(&self, request: &ExtractionRequest) -> Result<(), ExtractionError> {
        let range = request.date_range;
        let collection_start =
            NaiveDate::from_ymd_opt(COLLECTION_START.0, COLLECTION_START.1, COLLECTION_START.2)
                .unwrap_or_default();
        let collection_end = Utc::now().date_naive()
            - chrono::Duration::days(self.availability_lag_days as i64);

        if range.start() < collection_start {
            return Err(ExtractionError::InvalidDateRange {
                start: range.start(),
                end: range.end(),
                reason: format!("collection coverage begins {collection_start}"),
            });
        }
        if range.end() > collection_end {
            return Err(ExtractionError::InvalidDateRange {
                start: range.start(),
                end: range.end(),
                reason: format!("collection coverage ends {collection_end}"),
            });
        }
        Ok(())
    }

    async fn extract_batch(
        &self,
        date: NaiveDate,
        batch: &[Centroid],
        variables: &[Variable],
    ) -> Result<Vec<ClimateObservation>, ExtractionError> {
        let cells = retry_with_policy(
            &self.retry,
            "reanalysis sample",
            ExtractionError::is_transient,
            || self.client.sample_grid(batch, date, variables),
        )
        .await
        .map_err(|e| match e {
            // Session failures surface unchanged; everything else carries the
            // batch context so a failed chunk is reproducible.
            auth @ ExtractionError::Auth(_) => auth,
            other => ExtractionError::BatchFailed {
                date,
                centroid_ids: batch.iter().map(|c| c.id.clone()).collect(),
                source: Box::new(other),
            },
        })?;

        reduce_to_centroids(date, batch, &cells)
    }
}

/// Reduces grid-cell samples to per-centroid observations by nearest-cell
/// lookup. Centroids with no cell within range are reported, never dropped.
fn reduce_to_centroids(
    date: NaiveDate,
    batch: &[Centroid],
    cells: &[GridCellSample],
) -> Result<Vec<ClimateObservation>, ExtractionError> {
    let tree: RTree<GeomWithData<[f64; 2], usize>> = RTree::bulk_load(
        cells
            .iter()
            .enumerate()
            .map(|(index, sample)| GeomWithData::new([sample.cell.0, sample.cell.1], index))
            .collect(),
    );

    let mut observations = Vec::with_capacity(batch.len());
    let mut missing = Vec::new();

    for centroid in batch {
        let nearest = tree
            .nearest_neighbor(&[centroid.location.0, centroid.location.1])
            .filter(|neighbor| {
                let cell = &cells[neighbor.data].cell;
                let km = distance(
                    Location {
                        latitude: centroid.location.0,
                        longitude: centroid.location.1,
                    },
                    Location {
                        latitude: cell.0,
                        longitude: cell.1,
                    },
                    Units::Kilometers,
                );
                km <= MAX_CELL_DISTANCE_KM
            });

        let Some(neighbor) = nearest else {
            missing.push(centroid.id.clone());
            continue;
        };

        let sample = &cells[neighbor.data];
        let mut observation =
            ClimateObservation::new(centroid.id.clone(), date, DataSource::Reanalysis);
        for (variable, value) in &sample.values {
            let Some((_, unit)) = variable.reanalysis_band() else {
                continue;
            };
            observation
                .values
                .insert(*variable, Measurement::new(*value, unit));
        }
        if !observation.is_empty() {
            observations.push(observation);
        }
    }

    if !missing.is_empty() {
        return Err(ExtractionError::BatchIncomplete { date, missing });
    }
    Ok(observations)
}
