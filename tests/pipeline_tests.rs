//! End-to-end pipeline runs against in-memory source implementations.

use async_trait::async_trait;
use chrono::NaiveDate;
use climate_etl::{
    Centroid, ClimateEtlError, ClimatePipeline, CredentialSource, DailyForecast, ExtractionError,
    ForecastApi, ForecastError, GridCellSample, LatLon, PipelineConfig, PlatformClient,
    RetryPolicy, Variable,
};
use polars::prelude::*;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Reanalysis source: one grid cell right next to each centroid, reporting
/// source-native units (Kelvin, meters, Pascals).
struct FakePlatform {
    hang: bool,
    reject_auth: bool,
}

impl FakePlatform {
    fn new() -> Self {
        Self {
            hang: false,
            reject_auth: false,
        }
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn ensure_session(&self) -> Result<(), ExtractionError> {
        if self.reject_auth {
            return Err(ExtractionError::Auth(
                climate_etl::AuthError::IncompleteKey("client_email"),
            ));
        }
        Ok(())
    }

    async fn sample_grid(
        &self,
        centroids: &[Centroid],
        _date: NaiveDate,
        _variables: &[Variable],
    ) -> Result<Vec<GridCellSample>, ExtractionError> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(centroids
            .iter()
            .map(|c| GridCellSample {
                cell: LatLon(c.location.0 + 0.02, c.location.1),
                values: HashMap::from([
                    (Variable::Temperature2m, 300.15),          // Kelvin -> 27 C
                    (Variable::TotalPrecipitation, 0.005),      // meters -> 5 mm
                    (Variable::SurfacePressure, 101_325.0),     // Pa -> 1013.25 hPa
                ]),
            })
            .collect())
    }
}

/// Forecast source: two fixed days in canonical-adjacent units (Celsius, mm).
struct FakeForecast;

#[async_trait]
impl ForecastApi for FakeForecast {
    async fn fetch_daily(
        &self,
        _centroid: &Centroid,
        _variables: &[Variable],
        _past_days: u32,
        _forecast_days: u32,
    ) -> Result<DailyForecast, ForecastError> {
        Ok(DailyForecast {
            dates: vec![
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            ],
            series: HashMap::from([
                (Variable::Temperature2m, vec![Some(26.0), Some(25.0)]),
                (Variable::TotalPrecipitation, vec![Some(2.5), Some(0.0)]),
                (Variable::WindSpeed10mMax, vec![Some(7.0), Some(9.5)]),
            ]),
        })
    }
}

fn write_brazil_centroids(dir: &Path) -> PathBuf {
    // Sao Paulo, Manaus, Brasilia.
    let path = dir.join("centroids.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "id,latitude,longitude").unwrap();
    writeln!(file, "A,-23.5505,-46.6333").unwrap();
    writeln!(file, "B,-3.1190,-60.0217").unwrap();
    writeln!(file, "C,-15.7939,-47.8828").unwrap();
    file.flush().unwrap();
    path
}

fn config(cache_dir: &Path) -> Arc<PipelineConfig> {
    let mut config = PipelineConfig::new(CredentialSource::Inline("{}".to_string()));
    config.cache_dir = Some(cache_dir.to_path_buf());
    config.retry = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        jitter: 0.0,
    };
    Arc::new(config)
}

async fn pipeline_with(
    cache_dir: &Path,
    platform: Arc<dyn PlatformClient>,
) -> ClimatePipeline {
    ClimatePipeline::with_sources(config(cache_dir), platform, Arc::new(FakeForecast))
        .await
        .unwrap()
}

#[tokio::test]
async fn three_centroids_two_days_yield_six_plausible_records() {
    let dir = tempfile::tempdir().unwrap();
    let centroids = write_brazil_centroids(dir.path());
    let output = dir.path().join("climate.parquet");

    let pipeline = pipeline_with(dir.path(), Arc::new(FakePlatform::new())).await;
    let summary = pipeline
        .run()
        .centroids_path(&centroids)
        .start_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        .end_date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
        .output(&output)
        .call()
        .await
        .unwrap();

    assert_eq!(summary.records, 6); // 3 centroids x 2 days
    assert_eq!(summary.dropped, 0);
    assert_eq!(summary.output, output);

    let frame = LazyFrame::scan_parquet(&output, Default::default())
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(frame.height(), 6);

    let temps = frame.column("temperature_2m").unwrap();
    let temps = temps.f64().unwrap();
    for value in temps.into_no_null_iter() {
        assert!((-90.0..=60.0).contains(&value), "temperature {value} out of range");
    }
    let precip = frame.column("total_precipitation").unwrap();
    let precip = precip.f64().unwrap();
    for value in precip.into_no_null_iter() {
        assert!(value >= 0.0, "negative precipitation {value}");
    }
}

#[tokio::test]
async fn reanalysis_values_win_and_forecast_fills_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let centroids = write_brazil_centroids(dir.path());
    let output = dir.path().join("climate.parquet");

    let pipeline = pipeline_with(dir.path(), Arc::new(FakePlatform::new())).await;
    pipeline
        .run()
        .centroids_path(&centroids)
        .start_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        .end_date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
        .output(&output)
        .call()
        .await
        .unwrap();

    let frame = LazyFrame::scan_parquet(&output, Default::default())
        .unwrap()
        .collect()
        .unwrap();

    // Reanalysis reported 300.15 K; the forecast said 26 C for the same key.
    // The calibrated source must win after conversion.
    let temps = frame.column("temperature_2m").unwrap();
    let temps = temps.f64().unwrap();
    for value in temps.into_no_null_iter() {
        assert!((value - 27.0).abs() < 1e-9, "expected reanalysis 27 C, got {value}");
    }

    // Wind speed max only exists in the forecast; it fills the gap.
    let wind = frame.column("wind_speed_10m_max").unwrap();
    let wind = wind.f64().unwrap();
    assert_eq!(wind.null_count(), 0);

    let sources = frame.column("sources_present").unwrap();
    let sources = sources.str().unwrap();
    for label in sources.into_no_null_iter() {
        assert_eq!(label, "reanalysis+forecast");
    }
}

#[tokio::test]
async fn inverted_range_fails_before_loading_anything() {
    let dir = tempfile::tempdir().unwrap();
    let centroids = write_brazil_centroids(dir.path());
    let output = dir.path().join("climate.parquet");

    let pipeline = pipeline_with(dir.path(), Arc::new(FakePlatform::new())).await;
    let err = pipeline
        .run()
        .centroids_path(&centroids)
        .start_date(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap())
        .end_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        .output(&output)
        .call()
        .await
        .unwrap_err();

    assert!(matches!(err, ClimateEtlError::InvalidDateRange(_)));
    assert!(!output.exists());
}

#[tokio::test]
async fn session_failure_surfaces_as_authentication_error() {
    let dir = tempfile::tempdir().unwrap();
    let centroids = write_brazil_centroids(dir.path());
    let output = dir.path().join("climate.parquet");

    let platform = Arc::new(FakePlatform {
        hang: false,
        reject_auth: true,
    });
    let pipeline = pipeline_with(dir.path(), platform).await;
    let err = pipeline
        .run()
        .centroids_path(&centroids)
        .start_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        .end_date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
        .output(&output)
        .call()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClimateEtlError::Extraction(ExtractionError::Auth(_))
    ));
    assert!(!output.exists());
}

#[tokio::test]
async fn deadline_cancels_cleanly_without_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let centroids = write_brazil_centroids(dir.path());
    let output = dir.path().join("climate.parquet");

    let platform = Arc::new(FakePlatform {
        hang: true,
        reject_auth: false,
    });
    let pipeline = pipeline_with(dir.path(), platform).await;
    let err = pipeline
        .run()
        .centroids_path(&centroids)
        .start_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        .end_date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
        .output(&output)
        .deadline(Duration::from_millis(50))
        .call()
        .await
        .unwrap_err();

    assert!(matches!(err, ClimateEtlError::DeadlineExceeded { .. }));
    assert!(!output.exists());
}

#[tokio::test]
async fn missing_centroid_file_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("climate.parquet");

    let pipeline = pipeline_with(dir.path(), Arc::new(FakePlatform::new())).await;
    let err = pipeline
        .run()
        .centroids_path(dir.path().join("missing.csv"))
        .start_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        .end_date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
        .output(&output)
        .call()
        .await
        .unwrap_err();

    assert!(matches!(err, ClimateEtlError::Centroid(_)));
}
