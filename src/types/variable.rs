//! The fixed catalog of climate variables the pipeline recognizes, with the
//! source-native name and unit each external service reports them in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A recognized climate variable.
///
/// The set is fixed; both extraction paths map their source-native series
/// names onto these variants so the merger only ever deals with one
/// vocabulary. Variables a source cannot provide simply have no name for
/// that source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variable {
    Temperature2m,
    Temperature2mMin,
    Temperature2mMax,
    DewpointTemperature2m,
    TotalPrecipitation,
    SurfacePressure,
    WindU10m,
    WindV10m,
    WindSpeed10mMax,
}

/// The unit a numeric value is expressed in.
///
/// Every measurement carries its unit tag so a conversion applied to an
/// already-converted value is a detectable error rather than a silent
/// double conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Kelvin,
    Celsius,
    Meters,
    Millimeters,
    Pascals,
    Hectopascals,
    MetersPerSecond,
}

impl Variable {
    /// Every recognized variable, in canonical (output column) order.
    pub const ALL: [Variable; 9] = [
        Variable::Temperature2m,
        Variable::Temperature2mMin,
        Variable::Temperature2mMax,
        Variable::DewpointTemperature2m,
        Variable::TotalPrecipitation,
        Variable::SurfacePressure,
        Variable::WindU10m,
        Variable::WindV10m,
        Variable::WindSpeed10mMax,
    ];

    /// The canonical (pipeline-internal) unit for this variable.
    pub fn canonical_unit(&self) -> Unit {
        match self {
            Variable::Temperature2m
            | Variable::Temperature2mMin
            | Variable::Temperature2mMax
            | Variable::DewpointTemperature2m => Unit::Celsius,
            Variable::TotalPrecipitation => Unit::Millimeters,
            Variable::SurfacePressure => Unit::Hectopascals,
            Variable::WindU10m | Variable::WindV10m | Variable::WindSpeed10mMax => {
                Unit::MetersPerSecond
            }
        }
    }

    /// The band name in the reanalysis image collection, with the unit the
    /// collection reports it in. `None` when the collection has no such band.
    pub fn reanalysis_band(&self) -> Option<(&'static str, Unit)> {
        match self {
            Variable::Temperature2m => Some(("temperature_2m", Unit::Kelvin)),
            Variable::Temperature2mMin => Some(("temperature_2m_min", Unit::Kelvin)),
            Variable::Temperature2mMax => Some(("temperature_2m_max", Unit::Kelvin)),
            Variable::DewpointTemperature2m => Some(("dewpoint_temperature_2m", Unit::Kelvin)),
            Variable::TotalPrecipitation => Some(("total_precipitation_sum", Unit::Meters)),
            Variable::SurfacePressure => Some(("surface_pressure", Unit::Pascals)),
            Variable::WindU10m => Some(("u_component_of_wind_10m", Unit::MetersPerSecond)),
            Variable::WindV10m => Some(("v_component_of_wind_10m", Unit::MetersPerSecond)),
            Variable::WindSpeed10mMax => None,
        }
    }

    /// The daily series name in the forecast API, with the unit the API
    /// reports it in. `None` when the API has no such series.
    pub fn forecast_series(&self) -> Option<(&'static str, Unit)> {
        match self {
            Variable::Temperature2m => Some(("temperature_2m_mean", Unit::Celsius)),
            Variable::Temperature2mMin => Some(("temperature_2m_min", Unit::Celsius)),
            Variable::Temperature2mMax => Some(("temperature_2m_max", Unit::Celsius)),
            Variable::DewpointTemperature2m => Some(("dew_point_2m_mean", Unit::Celsius)),
            Variable::TotalPrecipitation => Some(("precipitation_sum", Unit::Millimeters)),
            Variable::SurfacePressure => Some(("surface_pressure_mean", Unit::Hectopascals)),
            Variable::WindU10m | Variable::WindV10m => None,
            Variable::WindSpeed10mMax => Some(("wind_speed_10m_max", Unit::MetersPerSecond)),
        }
    }

    /// The output column name for this variable.
    pub fn column_name(&self) -> &'static str {
        match self {
            Variable::Temperature2m => "temperature_2m",
            Variable::Temperature2mMin => "temperature_2m_min",
            Variable::Temperature2mMax => "temperature_2m_max",
            Variable::DewpointTemperature2m => "dewpoint_temperature_2m",
            Variable::TotalPrecipitation => "total_precipitation",
            Variable::SurfacePressure => "surface_pressure",
            Variable::WindU10m => "wind_u_10m",
            Variable::WindV10m => "wind_v_10m",
            Variable::WindSpeed10mMax => "wind_speed_10m_max",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

/// Checks the variable catalog for internal consistency: no duplicate output
/// columns or source names, and every variable reachable from at least one
/// source. Called once at pipeline construction; a failure here is a
/// programming error in the catalog, reported as a message rather than a
/// panic so the caller can surface it.
pub fn verify_catalog() -> Result<(), String> {
    let mut columns = std::collections::HashSet::new();
    let mut bands = std::collections::HashSet::new();
    let mut series = std::collections::HashSet::new();

    for var in Variable::ALL {
        if !columns.insert(var.column_name()) {
            return Err(format!("duplicate output column '{}'", var.column_name()));
        }
        if let Some((band, _)) = var.reanalysis_band() {
            if !bands.insert(band) {
                return Err(format!("duplicate reanalysis band '{band}'"));
            }
        }
        if let Some((name, _)) = var.forecast_series() {
            if !series.insert(name) {
                return Err(format!("duplicate forecast series '{name}'"));
            }
        }
        if var.reanalysis_band().is_none() && var.forecast_series().is_none() {
            return Err(format!("variable '{var}' is reachable from no source"));
        }
    }
    Ok(())
}
