//! Joins the two sources' observations into one record per centroid/date.
//!
//! Both inputs arrive already normalized to canonical units and to the shared
//! observation shape, so the merger never branches on source specifics beyond
//! the configured precedence rule.

use crate::merge::error::MergeError;
use crate::types::observation::{ClimateObservation, DataSource, MergedRecord};
use crate::types::variable::Variable;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

/// Which source wins when both report a value for the same variable on the
/// same centroid/date. Reanalysis is the calibrated historical source, so it
/// is authoritative by default; the rule is a run parameter rather than a
/// hardcoded assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourcePrecedence {
    #[default]
    PreferReanalysis,
    PreferForecast,
}

impl SourcePrecedence {
    fn authoritative(&self) -> DataSource {
        match self {
            SourcePrecedence::PreferReanalysis => DataSource::Reanalysis,
            SourcePrecedence::PreferForecast => DataSource::Forecast,
        }
    }
}

struct PendingRecord {
    values: BTreeMap<Variable, (f64, DataSource)>,
    sources: Vec<DataSource>,
}

/// Merges reanalysis and forecast observations on (centroid_id, date).
///
/// The authoritative source wins per variable regardless of argument order;
/// the other source fills variables and dates the authoritative one lacks.
/// Keys with no values from either source are omitted. A repeated
/// (centroid, date, source) observation is a defect and fails the merge.
///
/// The output is deterministic: sorted by date, then centroid id.
pub fn merge(
    reanalysis: Vec<ClimateObservation>,
    forecast: Vec<ClimateObservation>,
    precedence: SourcePrecedence,
) -> Result<Vec<MergedRecord>, MergeError> {
    let authoritative = precedence.authoritative();
    let mut seen: HashSet<(String, NaiveDate, DataSource)> = HashSet::new();
    let mut pending: BTreeMap<(NaiveDate, String), PendingRecord> = BTreeMap::new();

    for observation in reanalysis.into_iter().chain(forecast) {
        let key = (
            observation.centroid_id.clone(),
            observation.date,
            observation.source,
        );
        if !seen.insert(key) {
            return Err(MergeError::DataIntegrity {
                centroid_id: observation.centroid_id,
                date: observation.date,
                source_kind: observation.source,
            });
        }
        if observation.is_empty() {
            continue;
        }

        let entry = pending
            .entry((observation.date, observation.centroid_id.clone()))
            .or_insert_with(|| PendingRecord {
                values: BTreeMap::new(),
                sources: Vec::new(),
            });
        if !entry.sources.contains(&observation.source) {
            entry.sources.push(observation.source);
        }

        for (variable, measurement) in observation.values {
            match entry.values.get(&variable) {
                // The authoritative value stays, whatever arrives later.
                Some((_, existing)) if *existing == authoritative => {}
                _ => {
                    entry
                        .values
                        .insert(variable, (measurement.value, observation.source));
                }
            }
        }
    }

    Ok(pending
        .into_iter()
        .map(|((date, centroid_id), record)| {
            let mut sources = record.sources;
            sources.sort();
            MergedRecord {
                centroid_id,
                date,
                values: record
                    .values
                    .into_iter()
                    .map(|(variable, (value, _))| (variable, value))
                    .collect(),
                sources_present: sources,
            }
        })
        .collect())
}
