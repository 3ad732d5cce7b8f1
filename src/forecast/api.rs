//! The seam to the short-range forecast service: an object-safe API trait
//! and the Open-Meteo-style HTTP implementation.

use crate::forecast::error::ForecastError;
use crate::types::centroid::Centroid;
use crate::types::variable::Variable;
use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A parsed daily forecast for one centroid: a date axis plus one series per
/// requested variable. Series are aligned with `dates`; a `None` marks a day
/// the service reported no value for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub dates: Vec<NaiveDate>,
    pub series: HashMap<Variable, Vec<Option<f64>>>,
}

/// Fetches the daily forecast series for a single centroid.
#[async_trait]
pub trait ForecastApi: Send + Sync {
    async fn fetch_daily(
        &self,
        centroid: &Centroid,
        variables: &[Variable],
        past_days: u32,
        forecast_days: u32,
    ) -> Result<DailyForecast, ForecastError>;
}

/// Production client for the forecast HTTP API.
pub struct OpenMeteoApi {
    client: Client,
    base_url: String,
    timezone: String,
}

impl OpenMeteoApi {
    pub fn new(base_url: impl Into<String>, timezone: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            timezone: timezone.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    daily: Option<RawDaily>,
}

#[derive(Debug, Deserialize)]
struct RawDaily {
    #[serde(default)]
    time: Vec<String>,
    #[serde(flatten)]
    series: HashMap<String, serde_json::Value>,
}

#[async_trait]
impl ForecastApi for OpenMeteoApi {
    async fn fetch_daily(
        &self,
        centroid: &Centroid,
        variables: &[Variable],
        past_days: u32,
        forecast_days: u32,
    ) -> Result<DailyForecast, ForecastError> {
        let daily_names: Vec<&str> = variables
            .iter()
            .filter_map(|v| v.forecast_series().map(|(name, _)| name))
            .collect();

        debug!(
            "Fetching forecast for centroid '{}' ({} series)",
            centroid.id,
            daily_names.len()
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", centroid.location.0.to_string()),
                ("longitude", centroid.location.1.to_string()),
                ("daily", daily_names.join(",")),
                ("past_days", past_days.to_string()),
                ("forecast_days", forecast_days.to_string()),
                ("timezone", self.timezone.clone()),
            ])
            .send()
            .await
            .map_err(|e| ForecastError::Network(self.base_url.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForecastError::HttpStatus {
                url: self.base_url.clone(),
                status,
            });
        }

        let raw: RawResponse =
            response
                .json()
                .await
                .map_err(|e| ForecastError::MalformedResponse {
                    centroid_id: centroid.id.clone(),
                    detail: e.to_string(),
                })?;

        parse_daily(centroid, variables, raw)
    }
}

fn parse_daily(
    centroid: &Centroid,
    variables: &[Variable],
    raw: RawResponse,
) -> Result<DailyForecast, ForecastError> {
    let daily = raw.daily.ok_or_else(|| ForecastError::EmptyDataset {
        centroid_id: centroid.id.clone(),
    })?;
    if daily.time.is_empty() {
        return Err(ForecastError::EmptyDataset {
            centroid_id: centroid.id.clone(),
        });
    }

    let dates = daily
        .time
        .iter()
        .map(|t| {
            NaiveDate::parse_from_str(t, "%Y-%m-%d").map_err(|e| {
                ForecastError::MalformedResponse {
                    centroid_id: centroid.id.clone(),
                    detail: format!("bad date '{t}': {e}"),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut series = HashMap::new();
    for variable in variables {
        let Some((name, _)) = variable.forecast_series() else {
            continue;
        };
        let Some(values) = daily.series.get(name) else {
            continue;
        };
        let values: Vec<Option<f64>> =
            serde_json::from_value(values.clone()).map_err(|e| {
                ForecastError::MalformedResponse {
                    centroid_id: centroid.id.clone(),
                    detail: format!("series '{name}' is not numeric: {e}"),
                }
            })?;
        if values.len() != dates.len() {
            return Err(ForecastError::MalformedResponse {
                centroid_id: centroid.id.clone(),
                detail: format!(
                    "series '{name}' has {} values for {} dates",
                    values.len(),
                    dates.len()
                ),
            });
        }
        series.insert(*variable, values);
    }

    if series.is_empty() {
        return Err(ForecastError::EmptyDataset {
            centroid_id: centroid.id.clone(),
        });
    }

    Ok(DailyForecast { dates, series })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centroid() -> Centroid {
        Centroid::new("A", -23.55, -46.63)
    }

    fn raw(body: &str) -> RawResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn parses_aligned_series() {
        let response = raw(r#"{
            "daily": {
                "time": ["2025-01-01", "2025-01-02"],
                "temperature_2m_mean": [25.1, 26.3],
                "precipitation_sum": [0.0, 12.5]
            }
        }"#);
        let forecast = parse_daily(
            &centroid(),
            &[Variable::Temperature2m, Variable::TotalPrecipitation],
            response,
        )
        .unwrap();
        assert_eq!(forecast.dates.len(), 2);
        assert_eq!(
            forecast.series[&Variable::Temperature2m],
            vec![Some(25.1), Some(26.3)]
        );
        assert_eq!(
            forecast.series[&Variable::TotalPrecipitation],
            vec![Some(0.0), Some(12.5)]
        );
    }

    #[test]
    fn null_values_become_gaps() {
        let response = raw(r#"{
            "daily": {
                "time": ["2025-01-01", "2025-01-02"],
                "temperature_2m_mean": [25.1, null]
            }
        }"#);
        let forecast =
            parse_daily(&centroid(), &[Variable::Temperature2m], response).unwrap();
        assert_eq!(
            forecast.series[&Variable::Temperature2m],
            vec![Some(25.1), None]
        );
    }

    #[test]
    fn missing_daily_block_is_empty_dataset() {
        let response = raw("{}");
        let err =
            parse_daily(&centroid(), &[Variable::Temperature2m], response).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyDataset { .. }));
    }

    #[test]
    fn empty_time_axis_is_empty_dataset() {
        let response = raw(r#"{"daily": {"time": []}}"#);
        let err =
            parse_daily(&centroid(), &[Variable::Temperature2m], response).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyDataset { .. }));
    }

    #[test]
    fn misaligned_series_is_malformed() {
        let response = raw(r#"{
            "daily": {
                "time": ["2025-01-01", "2025-01-02"],
                "temperature_2m_mean": [25.1]
            }
        }"#);
        let err =
            parse_daily(&centroid(), &[Variable::Temperature2m], response).unwrap_err();
        assert!(matches!(err, ForecastError::MalformedResponse { .. }));
    }

    #[test]
    fn response_with_no_recognized_series_is_empty_dataset() {
        let response = raw(r#"{
            "daily": {
                "time": ["2025-01-01"],
                "uv_index_max": [7.0]
            }
        }"#);
        let err =
            parse_daily(&centroid(), &[Variable::Temperature2m], response).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyDataset { .. }));
    }
}
