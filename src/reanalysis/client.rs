//! The seam between the extractor and the reanalysis platform: an
//! object-safe client trait plus the HTTP implementation used in production.
//!
//! The trait keeps platform-specific wire details out of the extractor and
//! lets tests substitute an in-memory source with call-count assertions.

use crate::config::PipelineConfig;
use crate::reanalysis::error::ExtractionError;
use crate::session;
use crate::types::centroid::{Centroid, LatLon};
use crate::types::variable::Variable;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

const PLATFORM_URL: &str = "https://earthengine.googleapis.com/v1/sample";
const COLLECTION: &str = "ECMWF/ERA5_LAND/DAILY_AGGR";
/// Native grid resolution requested from the platform, in meters.
const SAMPLE_SCALE_M: u32 = 10_000;

/// One grid cell's worth of values returned by a platform sample query.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCellSample {
    /// Center of the grid cell the values were read from.
    pub cell: LatLon,
    /// Values per recognized variable, in the collection's native units.
    pub values: HashMap<Variable, f64>,
}

/// Samples the reanalysis grid for a batch of points on a single day.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Establishes (or reuses) the platform session. Extraction never
    /// proceeds past a failed session; [`ExtractionError::Auth`] surfaces
    /// unchanged.
    async fn ensure_session(&self) -> Result<(), ExtractionError>;

    /// Returns the grid cells covering `centroids` for `date`, restricted to
    /// `variables`. Cells are not guaranteed to be in centroid order; the
    /// extractor reduces them by nearest-cell lookup.
    async fn sample_grid(
        &self,
        centroids: &[Centroid],
        date: NaiveDate,
        variables: &[Variable],
    ) -> Result<Vec<GridCellSample>, ExtractionError>;
}

/// Production client: authenticated point-reduction queries against the
/// platform's sample endpoint.
pub struct HttpPlatformClient {
    config: Arc<PipelineConfig>,
}

impl HttpPlatformClient {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }
}

#[derive(Debug, Deserialize)]
struct SampleResponse {
    #[serde(default)]
    cells: Vec<SampleCell>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SampleCell {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    values: HashMap<String, f64>,
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn ensure_session(&self) -> Result<(), ExtractionError> {
        session::manager::global()
            .ensure_session(&self.config)
            .await?;
        Ok(())
    }

    async fn sample_grid(
        &self,
        centroids: &[Centroid],
        date: NaiveDate,
        variables: &[Variable],
    ) -> Result<Vec<GridCellSample>, ExtractionError> {
        let session = session::manager::global()
            .ensure_session(&self.config)
            .await?;

        let bands: Vec<&str> = variables
            .iter()
            .filter_map(|v| v.reanalysis_band().map(|(band, _)| band))
            .collect();
        let points: Vec<_> = centroids
            .iter()
            .map(|c| json!({"latitude": c.location.0, "longitude": c.location.1}))
            .collect();

        let body = json!({
            "collection": COLLECTION,
            "date": date.format("%Y-%m-%d").to_string(),
            "bands": bands,
            "scale": SAMPLE_SCALE_M,
            "points": points,
            "project": session.project_id,
        });

        debug!(
            "Sampling {} band(s) for {} point(s) on {date}",
            bands.len(),
            points.len()
        );

        let response = session
            .client
            .post(PLATFORM_URL)
            .bearer_auth(&session.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::Network(PLATFORM_URL.to_string(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::HttpStatus {
                url: PLATFORM_URL.to_string(),
                status,
            });
        }

        let parsed: SampleResponse =
            response
                .json()
                .await
                .map_err(|e| ExtractionError::MalformedResponse {
                    url: PLATFORM_URL.to_string(),
                    source: e,
                })?;

        Ok(parsed
            .cells
            .into_iter()
            .map(|cell| {
                let values = variables
                    .iter()
                    .filter_map(|v| {
                        let (band, _) = v.reanalysis_band()?;
                        cell.values.get(band).map(|value| (*v, *value))
                    })
                    .collect();
                GridCellSample {
                    cell: LatLon(cell.latitude, cell.longitude),
                    values,
                }
            })
            .collect())
    }
}
