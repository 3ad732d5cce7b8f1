//! Loads the run's centroid list from a tabular (CSV, optionally gzipped) or
//! vector (GeoJSON point collection) file.
//!
//! The format is detected from the file's structure rather than its
//! extension: a gzip magic number, a leading JSON bracket, or plain CSV.
//! Every format resolves to the same validated `Vec<Centroid>`.

use crate::centroids::error::CentroidError;
use crate::types::centroid::Centroid;
use async_compression::tokio::bufread::GzipDecoder;
use log::info;
use polars::prelude::*;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::task;

const ID_ALIASES: [&str; 3] = ["id", "FID", "grid_id"];
const LAT_ALIASES: [&str; 2] = ["latitude", "lat"];
const LON_ALIASES: [&str; 2] = ["longitude", "lon"];

/// Loads and validates centroids from `path`.
///
/// Fails when the file is missing, empty, lacks the required
/// columns/attributes, contains out-of-range coordinates, or repeats an id.
/// An empty file is always an error; the loader never reports an empty list
/// as success.
pub async fn load_centroids(path: &Path) -> Result<Vec<Centroid>, CentroidError> {
    let mut bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CentroidError::Io(path.to_path_buf(), e))?;

    // Gzipped tabular input carries the same payload as plain CSV.
    if bytes.starts_with(&[0x1f, 0x8b]) {
        bytes = gunzip(path, &bytes).await?;
    }

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(CentroidError::EmptyFile(path.to_path_buf()));
    }

    let first = bytes
        .iter()
        .copied()
        .find(|b| !b.is_ascii_whitespace())
        .unwrap_or(b' ');
    let centroids = if first == b'{' || first == b'[' {
        parse_geojson(path, &bytes)?
    } else {
        parse_csv(path.to_path_buf(), bytes).await?
    };

    validate(path, centroids)
}

async fn gunzip(path: &Path, bytes: &[u8]) -> Result<Vec<u8>, CentroidError> {
    let mut decoder = GzipDecoder::new(BufReader::new(bytes));
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .await
        .map_err(|e| CentroidError::Io(path.to_path_buf(), e))?;
    Ok(decompressed)
}

async fn parse_csv(path: PathBuf, bytes: Vec<u8>) -> Result<Vec<Centroid>, CentroidError> {
    task::spawn_blocking(move || {
        let mut temp_file =
            NamedTempFile::new().map_err(|e| CentroidError::Io(path.clone(), e))?;
        temp_file
            .write_all(&bytes)
            .and_then(|_| temp_file.flush())
            .map_err(|e| CentroidError::Io(path.clone(), e))?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))
            .map_err(|e| CentroidError::CsvParse {
                path: path.clone(),
                source: e,
            })?
            .finish()
            .map_err(|e| CentroidError::CsvParse {
                path: path.clone(),
                source: e,
            })?;

        let id_col = resolve_column(&df, &ID_ALIASES, &path)?;
        let lat_col = resolve_column(&df, &LAT_ALIASES, &path)?;
        let lon_col = resolve_column(&df, &LON_ALIASES, &path)?;

        let to_parse_err = |e: PolarsError| CentroidError::CsvParse {
            path: path.clone(),
            source: e,
        };
        let ids = df
            .column(&id_col)
            .and_then(|c| c.cast(&DataType::String))
            .map_err(to_parse_err)?;
        let ids = ids.str().map_err(to_parse_err)?;
        let lats = df
            .column(&lat_col)
            .and_then(|c| c.cast(&DataType::Float64))
            .map_err(to_parse_err)?;
        let lats = lats.f64().map_err(to_parse_err)?;
        let lons = df
            .column(&lon_col)
            .and_then(|c| c.cast(&DataType::Float64))
            .map_err(to_parse_err)?;
        let lons = lons.f64().map_err(to_parse_err)?;

        let mut centroids = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let id = ids
                .get(i)
                .map(str::to_string)
                .ok_or_else(|| CentroidError::MissingColumn {
                    path: path.clone(),
                    column: id_col.clone(),
                })?;
            let (latitude, longitude) = match (lats.get(i), lons.get(i)) {
                (Some(lat), Some(lon)) => (lat, lon),
                _ => {
                    return Err(CentroidError::MissingCoordinate {
                        path: path.clone(),
                        id,
                    })
                }
            };
            centroids.push(Centroid::new(id, latitude, longitude));
        }
        Ok(centroids)
    })
    .await?
}

fn resolve_column(
    df: &DataFrame,
    aliases: &[&str],
    path: &Path,
) -> Result<String, CentroidError> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    aliases
        .iter()
        .find(|alias| names.iter().any(|n| n == *alias))
        .map(|alias| alias.to_string())
        .ok_or_else(|| CentroidError::MissingColumn {
            path: path.to_path_buf(),
            column: aliases.join("|"),
        })
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<serde_json::Value>,
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: serde_json::Value,
}

fn parse_geojson(path: &Path, bytes: &[u8]) -> Result<Vec<Centroid>, CentroidError> {
    let collection: FeatureCollection =
        serde_json::from_slice(bytes).map_err(|e| CentroidError::GeoJsonParse {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut centroids = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.iter().enumerate() {
        let id = feature_id(feature).ok_or_else(|| CentroidError::MissingColumn {
            path: path.to_path_buf(),
            column: format!("{} (feature {index})", ID_ALIASES.join("|")),
        })?;

        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| CentroidError::NonPointGeometry {
                path: path.to_path_buf(),
                id: id.clone(),
            })?;
        if geometry.kind != "Point" {
            return Err(CentroidError::NonPointGeometry {
                path: path.to_path_buf(),
                id,
            });
        }

        // GeoJSON point coordinates are [longitude, latitude].
        let coords: Vec<f64> = serde_json::from_value(geometry.coordinates.clone())
            .map_err(|e| CentroidError::GeoJsonParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        if coords.len() < 2 {
            return Err(CentroidError::MissingCoordinate {
                path: path.to_path_buf(),
                id,
            });
        }
        centroids.push(Centroid::new(id, coords[1], coords[0]));
    }
    Ok(centroids)
}

fn feature_id(feature: &Feature) -> Option<String> {
    if let Some(props) = &feature.properties {
        for alias in ID_ALIASES {
            if let Some(value) = props.get(alias) {
                return Some(json_value_to_id(value));
            }
        }
    }
    feature.id.as_ref().map(json_value_to_id)
}

fn json_value_to_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn validate(path: &Path, centroids: Vec<Centroid>) -> Result<Vec<Centroid>, CentroidError> {
    if centroids.is_empty() {
        return Err(CentroidError::EmptyFile(path.to_path_buf()));
    }

    let mut seen = HashSet::new();
    for centroid in &centroids {
        if !seen.insert(centroid.id.clone()) {
            return Err(CentroidError::DuplicateId {
                path: path.to_path_buf(),
                id: centroid.id.clone(),
            });
        }
        if !centroid.location.is_valid() {
            return Err(CentroidError::CoordinateOutOfRange {
                path: path.to_path_buf(),
                id: centroid.id.clone(),
                latitude: centroid.location.0,
                longitude: centroid.location.1,
            });
        }
    }

    info!("Loaded {} centroids from {}", centroids.len(), path.display());
    Ok(centroids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn loads_csv_with_canonical_columns() {
        let file = write_fixture(b"id,latitude,longitude\nA,-23.55,-46.63\nB,-3.12,-60.02\n");
        let centroids = load_centroids(file.path()).await.unwrap();
        assert_eq!(centroids.len(), 2);
        assert_eq!(centroids[0].id, "A");
        assert_eq!(centroids[0].location.0, -23.55);
        assert_eq!(centroids[1].location.1, -60.02);
    }

    #[tokio::test]
    async fn loads_csv_with_original_aliases() {
        let file = write_fixture(b"FID,lon,lat\n1,-53.9,-12.1\n2,-53.8,-12.2\n");
        let centroids = load_centroids(file.path()).await.unwrap();
        assert_eq!(centroids.len(), 2);
        assert_eq!(centroids[0].id, "1");
        assert_eq!(centroids[0].location, crate::LatLon(-12.1, -53.9));
    }

    #[tokio::test]
    async fn loads_gzipped_csv() {
        use async_compression::tokio::bufread::GzipEncoder;

        let csv = b"id,latitude,longitude\nA,-23.55,-46.63\n";
        let mut encoder = GzipEncoder::new(BufReader::new(&csv[..]));
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).await.unwrap();

        let file = write_fixture(&compressed);
        let centroids = load_centroids(file.path()).await.unwrap();
        assert_eq!(centroids.len(), 1);
        assert_eq!(centroids[0].id, "A");
    }

    #[tokio::test]
    async fn loads_geojson_points() {
        let geojson = br#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"id": "A"},
                    "geometry": {"type": "Point", "coordinates": [-46.63, -23.55]}
                }
            ]
        }"#;
        let file = write_fixture(geojson);
        let centroids = load_centroids(file.path()).await.unwrap();
        assert_eq!(centroids.len(), 1);
        // Coordinates arrive [lon, lat]; Centroid stores (lat, lon).
        assert_eq!(centroids[0].location, crate::LatLon(-23.55, -46.63));
    }

    #[tokio::test]
    async fn rejects_non_point_geometry() {
        let geojson = br#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"id": "A"},
                    "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}
                }
            ]
        }"#;
        let file = write_fixture(geojson);
        let err = load_centroids(file.path()).await.unwrap_err();
        assert!(matches!(err, CentroidError::NonPointGeometry { .. }));
    }

    #[tokio::test]
    async fn empty_file_is_an_error() {
        let file = write_fixture(b"");
        let err = load_centroids(file.path()).await.unwrap_err();
        assert!(matches!(err, CentroidError::EmptyFile(_)));
    }

    #[tokio::test]
    async fn header_only_csv_is_an_error() {
        let file = write_fixture(b"id,latitude,longitude\n");
        let err = load_centroids(file.path()).await.unwrap_err();
        assert!(matches!(
            err,
            CentroidError::EmptyFile(_) | CentroidError::CsvParse { .. }
        ));
    }

    #[tokio::test]
    async fn missing_column_is_an_error() {
        let file = write_fixture(b"id,latitude\nA,-23.55\n");
        let err = load_centroids(file.path()).await.unwrap_err();
        assert!(matches!(err, CentroidError::MissingColumn { .. }));
    }

    #[tokio::test]
    async fn out_of_range_coordinates_are_an_error() {
        let file = write_fixture(b"id,latitude,longitude\nA,-95.0,-46.63\n");
        let err = load_centroids(file.path()).await.unwrap_err();
        assert!(matches!(err, CentroidError::CoordinateOutOfRange { .. }));
    }

    #[tokio::test]
    async fn duplicate_ids_are_an_error() {
        let file = write_fixture(b"id,latitude,longitude\nA,-23.55,-46.63\nA,-3.12,-60.02\n");
        let err = load_centroids(file.path()).await.unwrap_err();
        assert!(matches!(err, CentroidError::DuplicateId { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let err = load_centroids(Path::new("/nonexistent/centroids.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, CentroidError::Io(_, _)));
    }
}
