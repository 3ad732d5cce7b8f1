//! Defines the geographic point types the pipeline samples climate data at:
//! a bare coordinate pair and an identified centroid.

use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
/// Both values are represented as `f64`.
///
/// # Examples
///
/// ```
/// use climate_etl::LatLon;
///
/// let sao_paulo = LatLon(-23.5505, -46.6333);
/// assert_eq!(sao_paulo.0, -23.5505); // Latitude
/// assert_eq!(sao_paulo.1, -46.6333); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    /// Whether the coordinate lies within the valid latitude/longitude domain.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.0) && (-180.0..=180.0).contains(&self.1)
    }
}

/// A single area-of-interest sampling point.
///
/// Centroids are loaded once per run from a tabular or vector source and are
/// immutable afterwards. Ids must be unique within a run; the loader enforces
/// this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    /// The unique identifier of the centroid within a run (e.g. a grid id).
    pub id: String,
    /// The point location of the centroid.
    pub location: LatLon,
}

impl Centroid {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            location: LatLon(latitude, longitude),
        }
    }
}
