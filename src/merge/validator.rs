//! Post-merge quality gate: required variables, physical plausibility and
//! duplicate-key detection.
//!
//! Per-record failures degrade the dataset (the record is dropped, logged and
//! counted); only a dropped fraction above the configured limit fails the
//! whole run.

use crate::merge::error::MergeError;
use crate::types::observation::MergedRecord;
use crate::types::variable::{Unit, Variable};
use log::warn;
use std::collections::{BTreeSet, HashSet};

/// Outcome of a validation pass: the surviving records plus drop accounting.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub records: Vec<MergedRecord>,
    pub dropped: usize,
}

pub struct Validator {
    required: BTreeSet<Variable>,
    max_dropped_fraction: f64,
}

impl Validator {
    pub fn new(max_dropped_fraction: f64) -> Self {
        Self {
            required: BTreeSet::from([Variable::Temperature2m, Variable::TotalPrecipitation]),
            max_dropped_fraction,
        }
    }

    pub fn with_required(
        required: impl IntoIterator<Item = Variable>,
        max_dropped_fraction: f64,
    ) -> Self {
        Self {
            required: required.into_iter().collect(),
            max_dropped_fraction,
        }
    }

    /// Validates merged records.
    ///
    /// Duplicate (centroid_id, date) keys are a structural defect and fail
    /// immediately. Otherwise offending records are dropped and counted; the
    /// pass fails only when the dropped fraction exceeds the limit or nothing
    /// survives at all.
    pub fn validate(&self, records: Vec<MergedRecord>) -> Result<ValidationOutcome, MergeError> {
        let mut keys = HashSet::with_capacity(records.len());
        for record in &records {
            if !keys.insert((record.centroid_id.clone(), record.date)) {
                return Err(MergeError::DuplicateMergedKey {
                    centroid_id: record.centroid_id.clone(),
                    date: record.date,
                });
            }
        }

        let total = records.len();
        let mut kept = Vec::with_capacity(total);
        let mut dropped = 0usize;

        for record in records {
            match self.check(&record) {
                Ok(()) => kept.push(record),
                Err(reason) => {
                    warn!(
                        "Dropping record (centroid '{}', {}): {reason}",
                        record.centroid_id, record.date
                    );
                    dropped += 1;
                }
            }
        }

        if total > 0 {
            let fraction = dropped as f64 / total as f64;
            if kept.is_empty() || fraction > self.max_dropped_fraction {
                return Err(MergeError::Validation {
                    dropped,
                    total,
                    percent: fraction * 100.0,
                });
            }
        }

        Ok(ValidationOutcome {
            records: kept,
            dropped,
        })
    }

    fn check(&self, record: &MergedRecord) -> Result<(), String> {
        for required in &self.required {
            if !record.values.contains_key(required) {
                return Err(format!("missing required variable '{required}'"));
            }
        }
        for (variable, value) in &record.values {
            if !value.is_finite() {
                return Err(format!("non-finite value for '{variable}'"));
            }
            let (min, max) = plausible_range(*variable);
            if *value < min || *value > max {
                return Err(format!(
                    "'{variable}' = {value} outside plausible range [{min}, {max}]"
                ));
            }
        }
        Ok(())
    }
}

/// Physically plausible bounds per canonical unit.
fn plausible_range(variable: Variable) -> (f64, f64) {
    match variable.canonical_unit() {
        Unit::Celsius => (-90.0, 60.0),
        Unit::Millimeters => (0.0, 10_000.0),
        Unit::Hectopascals => (300.0, 1100.0),
        Unit::MetersPerSecond => (-150.0, 150.0),
        // Source units never reach the validator; treat them as unbounded.
        Unit::Kelvin | Unit::Meters | Unit::Pascals => (f64::NEG_INFINITY, f64::INFINITY),
    }
}
