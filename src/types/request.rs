//! Per-invocation request parameters for the two extraction paths.

use crate::types::centroid::Centroid;
use crate::types::date_range::DateRange;
use crate::types::variable::Variable;
use std::collections::BTreeSet;

/// Parameters for one reanalysis extraction: which centroids, which dates,
/// which variables. Created per invocation, never persisted.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub centroids: Vec<Centroid>,
    pub date_range: DateRange,
    pub variables: BTreeSet<Variable>,
}

impl ExtractionRequest {
    pub fn new(
        centroids: Vec<Centroid>,
        date_range: DateRange,
        variables: impl IntoIterator<Item = Variable>,
    ) -> Self {
        Self {
            centroids,
            date_range,
            variables: variables.into_iter().collect(),
        }
    }
}

/// Parameters for one forecast download.
///
/// `past_days` pulls recent history from the forecast service alongside the
/// prediction window, which lets the forecast path backfill dates the
/// reanalysis collection has not published yet.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub centroids: Vec<Centroid>,
    pub variables: BTreeSet<Variable>,
    pub past_days: u32,
    pub forecast_days: u32,
}

impl DownloadRequest {
    pub fn new(
        centroids: Vec<Centroid>,
        variables: impl IntoIterator<Item = Variable>,
        past_days: u32,
        forecast_days: u32,
    ) -> Self {
        Self {
            centroids,
            variables: variables.into_iter().collect(),
            past_days,
            forecast_days,
        }
    }
}
