//! Pure unit conversions from source-native to canonical units.
//!
//! Every measurement carries a unit tag; conversion rewrites the value and the
//! tag together, so feeding an already-canonical measurement back through a
//! conversion surfaces as an error instead of a silent double conversion.

use crate::types::observation::ClimateObservation;
use crate::types::variable::Unit;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error(
        "no conversion from {from:?} to {to:?} for variable '{variable}' \
         (centroid '{centroid_id}', {date})"
    )]
    UnitMismatch {
        variable: String,
        centroid_id: String,
        date: chrono::NaiveDate,
        from: Unit,
        to: Unit,
    },
}

/// `c = k - 273.15`
pub fn kelvin_to_celsius(k: f64) -> f64 {
    k - 273.15
}

/// `mm = m * 1000`
pub fn meters_to_millimeters(m: f64) -> f64 {
    m * 1000.0
}

/// `hPa = Pa / 100`
pub fn pascals_to_hectopascals(pa: f64) -> f64 {
    pa / 100.0
}

/// Converts a value between two unit tags. Identity when the tags already
/// match; `None` when no conversion between the tags exists.
fn convert(value: f64, from: Unit, to: Unit) -> Option<f64> {
    match (from, to) {
        _ if from == to => Some(value),
        (Unit::Kelvin, Unit::Celsius) => Some(kelvin_to_celsius(value)),
        (Unit::Meters, Unit::Millimeters) => Some(meters_to_millimeters(value)),
        (Unit::Pascals, Unit::Hectopascals) => Some(pascals_to_hectopascals(value)),
        _ => None,
    }
}

/// Rewrites every measurement in `observations` into the owning variable's
/// canonical unit, preserving (centroid, date) identity.
///
/// A measurement whose tag has no conversion path to the canonical unit —
/// including one that was already converted and re-submitted under a stale
/// source tag — fails the whole collection with [`TransformError::UnitMismatch`].
pub fn to_canonical_units(
    mut observations: Vec<ClimateObservation>,
) -> Result<Vec<ClimateObservation>, TransformError> {
    for obs in &mut observations {
        for (variable, measurement) in &mut obs.values {
            let canonical = variable.canonical_unit();
            match convert(measurement.value, measurement.unit, canonical) {
                Some(value) => {
                    measurement.value = value;
                    measurement.unit = canonical;
                }
                None => {
                    return Err(TransformError::UnitMismatch {
                        variable: variable.to_string(),
                        centroid_id: obs.centroid_id.clone(),
                        date: obs.date,
                        from: measurement.unit,
                        to: canonical,
                    });
                }
            }
        }
    }
    Ok(observations)
}
