//! Disk-backed TTL cache for forecast responses with a single-flight
//! in-memory front.
//!
//! Entries are keyed by (centroid, variable set, forecast window) and
//! persisted as bincode under the crate cache directory; the file's age
//! decides freshness. Concurrent requests for the same uncached key collapse
//! into one underlying fetch.

use crate::forecast::api::DailyForecast;
use crate::forecast::error::ForecastError;
use crate::types::centroid::Centroid;
use crate::types::variable::Variable;
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::{debug, info};
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Identity of one cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    centroid_id: String,
    latitude: OrderedFloat<f64>,
    longitude: OrderedFloat<f64>,
    fingerprint: String,
    past_days: u32,
    forecast_days: u32,
}

impl CacheKey {
    pub fn new(
        centroid: &Centroid,
        variables: &[Variable],
        past_days: u32,
        forecast_days: u32,
    ) -> Self {
        let mut names: Vec<&str> = variables
            .iter()
            .filter_map(|v| v.forecast_series().map(|(name, _)| name))
            .collect();
        names.sort_unstable();
        Self {
            centroid_id: centroid.id.clone(),
            latitude: OrderedFloat(centroid.location.0),
            longitude: OrderedFloat(centroid.location.1),
            fingerprint: names.join("-"),
            past_days,
            forecast_days,
        }
    }

    fn file_name(&self) -> String {
        let id: String = self
            .centroid_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        // The variable fingerprint is hashed to keep file names bounded.
        let fingerprint = {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            self.fingerprint.hash(&mut hasher);
            self.latitude.hash(&mut hasher);
            self.longitude.hash(&mut hasher);
            hasher.finish()
        };
        format!(
            "forecast-{id}-{fingerprint:016x}-p{}-f{}.bin",
            self.past_days, self.forecast_days
        )
    }
}

/// TTL response cache shared by all concurrent forecast calls.
pub struct ResponseCache {
    cache_dir: PathBuf,
    ttl: Duration,
    inflight: Mutex<HashMap<CacheKey, Arc<OnceCell<DailyForecast>>>>,
}

impl ResponseCache {
    pub fn new(cache_dir: &Path, ttl: Duration) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
            ttl,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached response for `key`, fetching it with `fetch` on a
    /// miss. Concurrent callers with the same key share one fetch; a failed
    /// fetch leaves the slot empty so the next caller retries.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
    ) -> Result<DailyForecast, ForecastError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DailyForecast, ForecastError>>,
    {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(inflight.entry(key.clone()).or_default())
        };

        let forecast = cell
            .get_or_try_init(|| async move {
                if let Some(cached) = self.read_fresh(&key).await? {
                    debug!("Forecast cache hit for centroid '{}'", key.centroid_id);
                    return Ok(cached);
                }
                info!(
                    "Forecast cache miss for centroid '{}'; fetching",
                    key.centroid_id
                );
                let fetched = fetch().await?;
                self.write(&key, &fetched).await?;
                Ok(fetched)
            })
            .await?;
        Ok(forecast.clone())
    }

    async fn read_fresh(&self, key: &CacheKey) -> Result<Option<DailyForecast>, ForecastError> {
        let path = self.cache_dir.join(key.file_name());
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(_) => return Ok(None),
        };

        let age = metadata
            .modified()
            .map_err(|e| ForecastError::CacheRead(path.clone(), e))?
            .elapsed()
            .map_err(|e| ForecastError::CacheAge(path.clone(), e))?;
        if age > self.ttl {
            debug!("Forecast cache entry expired: {}", path.display());
            return Ok(None);
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ForecastError::CacheRead(path.clone(), e))?;
        let (forecast, _) =
            bincode::serde::decode_from_slice::<DailyForecast, _>(&bytes, BINCODE_CONFIG)
                .map_err(|e| ForecastError::CacheDecode(path.clone(), Box::new(e)))?;
        Ok(Some(forecast))
    }

    async fn write(&self, key: &CacheKey, forecast: &DailyForecast) -> Result<(), ForecastError> {
        let path = self.cache_dir.join(key.file_name());
        let bytes = bincode::serde::encode_to_vec(forecast, BINCODE_CONFIG)
            .map_err(|e| ForecastError::CacheEncode(Box::new(e)))?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ForecastError::CacheWrite(path.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn forecast() -> DailyForecast {
        DailyForecast {
            dates: vec![NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()],
            series: HashMap::from([(Variable::Temperature2m, vec![Some(25.0)])]),
        }
    }

    fn key() -> CacheKey {
        CacheKey::new(
            &Centroid::new("A", -23.55, -46.63),
            &[Variable::Temperature2m],
            5,
            3,
        )
    }

    #[tokio::test]
    async fn second_lookup_hits_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600));
        let calls = AtomicU32::new(0);

        for _ in 0..2 {
            let result = cache
                .get_or_fetch(key(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(forecast())
                })
                .await
                .unwrap();
            assert_eq!(result, forecast());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disk_entries_survive_a_new_cache_instance() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600));
            cache
                .get_or_fetch(key(), || async { Ok(forecast()) })
                .await
                .unwrap();
        }

        // Fresh instance: no in-memory state, must come from disk.
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600));
        let calls = AtomicU32::new(0);
        let result = cache
            .get_or_fetch(key(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(forecast())
            })
            .await
            .unwrap();
        assert_eq!(result, forecast());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600));
            cache
                .get_or_fetch(key(), || async { Ok(forecast()) })
                .await
                .unwrap();
        }

        let cache = ResponseCache::new(dir.path(), Duration::ZERO);
        let calls = AtomicU32::new(0);
        cache
            .get_or_fetch(key(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(forecast())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_key_fetch_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ResponseCache::new(dir.path(), Duration::from_secs(3600)));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(key(), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Hold the fetch open long enough for every task to pile up.
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(forecast())
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), forecast());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_the_slot_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600));

        let err = cache
            .get_or_fetch(key(), || async {
                Err(ForecastError::EmptyDataset {
                    centroid_id: "A".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::EmptyDataset { .. }));

        let result = cache
            .get_or_fetch(key(), || async { Ok(forecast()) })
            .await
            .unwrap();
        assert_eq!(result, forecast());
    }

    #[test]
    fn distinct_windows_have_distinct_files() {
        let centroid = Centroid::new("A", -23.55, -46.63);
        let a = CacheKey::new(&centroid, &[Variable::Temperature2m], 5, 3);
        let b = CacheKey::new(&centroid, &[Variable::Temperature2m], 0, 3);
        assert_ne!(a.file_name(), b.file_name());
    }

    #[test]
    fn variable_order_does_not_change_the_key() {
        let centroid = Centroid::new("A", -23.55, -46.63);
        let a = CacheKey::new(
            &centroid,
            &[Variable::Temperature2m, Variable::TotalPrecipitation],
            5,
            3,
        );
        let b = CacheKey::new(
            &centroid,
            &[Variable::TotalPrecipitation, Variable::Temperature2m],
            5,
            3,
        );
        assert_eq!(a, b);
    }
}
