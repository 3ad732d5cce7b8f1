//! The observation shapes both extraction paths are normalized into before
//! merging, and the merged record the pipeline persists.

use crate::types::variable::{Unit, Variable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which external source an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataSource {
    Reanalysis,
    Forecast,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Reanalysis => write!(f, "reanalysis"),
            DataSource::Forecast => write!(f, "forecast"),
        }
    }
}

/// A numeric value together with the unit it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit: Unit,
}

impl Measurement {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }
}

/// One centroid/date worth of values from a single source.
///
/// Both extractors emit exactly one observation per (centroid, date, source)
/// combination; the merger treats a repeat of that key as a defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateObservation {
    pub centroid_id: String,
    pub date: NaiveDate,
    /// Per-variable values in the unit recorded in each [`Measurement`].
    pub values: BTreeMap<Variable, Measurement>,
    pub source: DataSource,
}

impl ClimateObservation {
    pub fn new(centroid_id: impl Into<String>, date: NaiveDate, source: DataSource) -> Self {
        Self {
            centroid_id: centroid_id.into(),
            date,
            values: BTreeMap::new(),
            source,
        }
    }

    /// True when the observation carries no values at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One persisted record: everything known for a centroid on a date, in
/// canonical units, with the contributing sources recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub centroid_id: String,
    pub date: NaiveDate,
    /// Canonical-unit values; variables absent from both sources are absent
    /// here, never fabricated.
    pub values: BTreeMap<Variable, f64>,
    /// Sources that contributed at least one value, ascending.
    pub sources_present: Vec<DataSource>,
}

impl MergedRecord {
    /// Formats `sources_present` for the output artifact, e.g.
    /// `"reanalysis+forecast"`.
    pub fn sources_label(&self) -> String {
        let mut sources = self.sources_present.clone();
        sources.sort();
        sources
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("+")
    }
}
