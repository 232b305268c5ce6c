//! Cache synchronisation against the remote API.
//!
//! Station and sensor listings are fetched once and then served from the
//! cache. Measurement series are downloaded for every sensor of a station in
//! parallel; failures are collected and reported together, and the sensor
//! the user actually selected gets one more attempt.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::Result;

use crate::{
    api::{Endpoints, HttpFetcher},
    cache::CacheStore,
    config::AppConfig,
    error::SyncError,
    model::{
        MeasurementSeries, Sensor, Station, filter_measurements, filter_station_fields,
        parse_sensors, parse_stations,
    },
    traits::JsonFetcher,
};

/// Outcome of a parallel measurement download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub succeeded: Vec<i64>,
    pub failed_ids: Vec<i64>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed_ids.is_empty()
    }

    /// One aggregated warning for all failed sensors, if any failed.
    pub fn warning_message(&self) -> Option<String> {
        if self.failed_ids.is_empty() {
            return None;
        }
        let ids: Vec<String> = self.failed_ids.iter().map(|id| id.to_string()).collect();
        Some(format!(
            "Failed to download data for sensors: {}",
            ids.join(", ")
        ))
    }
}

/// Keeps the local cache in step with the remote API.
#[derive(Clone)]
pub struct SyncCoordinator {
    fetcher: Arc<dyn JsonFetcher>,
    cache: CacheStore,
    endpoints: Endpoints,
}

impl SyncCoordinator {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, cache: CacheStore, endpoints: Endpoints) -> Self {
        Self {
            fetcher,
            cache,
            endpoints,
        }
    }

    /// Build a coordinator backed by the HTTP client.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.network)?;
        Ok(Self::new(
            Arc::new(fetcher),
            CacheStore::new(&config.cache.root),
            Endpoints::new(config.api.base_url.clone()),
        ))
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Load the station list, downloading it first if it is not cached.
    ///
    /// Only the allowlisted station fields are persisted.
    pub async fn ensure_station_list(&self) -> Result<Vec<Station>, SyncError> {
        let path = self.cache.stations_path();

        if self.cache.exists(&path) {
            tracing::debug!("Station list cached at {}", path.display());
        } else {
            tracing::info!("Station list not cached, downloading");
            let listing = self.fetcher.fetch_json(&self.endpoints.stations()).await?;
            let filtered = filter_station_fields(&listing)?;
            self.cache.persist_json(path.clone(), filtered).await?;
        }

        let listing = self.cache.read_json(&path)?;
        parse_stations(&listing)
    }

    /// Load the sensor list of a station, downloading it first if it is not cached.
    pub async fn ensure_sensor_list(&self, station_id: i64) -> Result<Vec<Sensor>, SyncError> {
        let path = self.cache.sensors_path(station_id);

        if self.cache.exists(&path) {
            tracing::debug!("Sensor list for station {} cached", station_id);
        } else {
            tracing::info!("Sensor list for station {} not cached, downloading", station_id);
            let listing = self
                .fetcher
                .fetch_json(&self.endpoints.sensors(station_id))
                .await?;
            // Only a listing that parses may enter the cache
            parse_sensors(&listing, station_id)?;
            self.cache.persist_json(path.clone(), listing).await?;
        }

        let listing = self.cache.read_json(&path)?;
        parse_sensors(&listing, station_id)
    }

    /// Download, filter and persist the series of one sensor.
    ///
    /// The file name is derived from the downloaded dates, so the download
    /// always happens; an existing file of that name is left untouched.
    /// Returns the path of the series file.
    pub async fn sync_sensor(&self, station_id: i64, sensor_id: i64) -> Result<PathBuf, SyncError> {
        let payload = self
            .fetcher
            .fetch_json(&self.endpoints.measurements(sensor_id))
            .await?;
        let filtered = filter_measurements(&payload)?;

        let path = self
            .cache
            .sensor_dir(station_id, sensor_id)
            .join(&filtered.file_name);
        if self.cache.exists(&path) {
            tracing::debug!("Series for sensor {} already cached at {}", sensor_id, path.display());
            return Ok(path);
        }
        self.cache
            .persist_json(path.clone(), filtered.document)
            .await?;

        tracing::debug!(
            "Saved {} samples for sensor {} to {}",
            filtered.sample_count,
            sensor_id,
            path.display()
        );
        Ok(path)
    }

    /// Download every sensor's series concurrently, one task per sensor.
    ///
    /// All tasks are joined before returning. A task that errors or panics
    /// counts as a failure of its sensor.
    pub async fn sync_all_sensor_data(&self, station_id: i64, sensor_ids: &[i64]) -> SyncReport {
        tracing::info!(
            "Downloading data for {} sensors of station {}",
            sensor_ids.len(),
            station_id
        );

        let failed: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = sensor_ids
            .iter()
            .map(|&sensor_id| {
                let coordinator = self.clone();
                let failed = Arc::clone(&failed);
                let handle = tokio::spawn(async move {
                    if let Err(e) = coordinator.sync_sensor(station_id, sensor_id).await {
                        tracing::warn!("Failed to download sensor {}: {}", sensor_id, e);
                        failed
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(sensor_id);
                    }
                });
                (sensor_id, handle)
            })
            .collect();

        for (sensor_id, handle) in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Download task for sensor {} aborted: {}", sensor_id, e);
                failed
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(sensor_id);
            }
        }

        let mut failed_ids = failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        failed_ids.sort_unstable();
        failed_ids.dedup();

        let mut succeeded: Vec<i64> = sensor_ids
            .iter()
            .copied()
            .filter(|id| !failed_ids.contains(id))
            .collect();
        succeeded.sort_unstable();
        succeeded.dedup();

        tracing::info!(
            "Sensor download finished: {} succeeded, {} failed",
            succeeded.len(),
            failed_ids.len()
        );

        SyncReport {
            succeeded,
            failed_ids,
        }
    }

    /// Give the selected sensor one more attempt if the batch failed it.
    ///
    /// Returns whether a retry happened. A failed retry is a terminal
    /// [`SyncError::Download`].
    pub async fn ensure_selected(
        &self,
        station_id: i64,
        sensor_id: i64,
        failed_ids: &[i64],
    ) -> Result<bool, SyncError> {
        if !failed_ids.contains(&sensor_id) {
            return Ok(false);
        }

        tracing::info!("Retrying download for selected sensor {}", sensor_id);
        match self.sync_sensor(station_id, sensor_id).await {
            Ok(_) => Ok(true),
            Err(e) => Err(SyncError::Download {
                sensor_id,
                reason: e.to_string(),
            }),
        }
    }
}

/// Read a cached series file.
pub fn load_series(cache: &CacheStore, path: &Path) -> Result<MeasurementSeries, SyncError> {
    let document = cache.read_json(path)?;
    let series = MeasurementSeries::from_payload(&document)?;
    if series.is_empty() {
        return Err(SyncError::Validation(format!(
            "no values in {}",
            path.display()
        )));
    }
    Ok(series)
}
