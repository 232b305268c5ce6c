//! Interactive selection workflow.
//!
//! A `Session` remembers the chosen station, sensor and data file and walks
//! the user through them via a [`Selector`], reporting problems through a
//! [`Notifier`]. Missing preconditions are reported and end the step with
//! `Ok(None)`; failures of the data layer are returned as errors.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use crate::{
    analytics::{TrendMethod, TrendResult, analyze},
    cache::filter_by_ids,
    config::AppConfig,
    error::SyncError,
    geo::{GeoPoint, rank_stations},
    model::{MeasurementSeries, Sample, Sensor, Station, parse_sensors, parse_stations},
    sync::{SyncCoordinator, load_series},
    traits::{Notifier, Selector},
};

/// Everything needed to display one data file.
#[derive(Debug, Clone)]
pub struct SeriesReport {
    pub file: PathBuf,
    pub series: MeasurementSeries,
    pub result: TrendResult,
    pub axis_label: String,
    pub chart_points: Vec<Sample>,
}

pub struct Session {
    coordinator: SyncCoordinator,
    selector: Arc<dyn Selector>,
    notifier: Arc<dyn Notifier>,
    reference: GeoPoint,
    trend_method: TrendMethod,
    station: Option<Station>,
    sensor: Option<Sensor>,
    file: Option<String>,
}

impl Session {
    pub fn new(
        coordinator: SyncCoordinator,
        selector: Arc<dyn Selector>,
        notifier: Arc<dyn Notifier>,
        config: &AppConfig,
    ) -> Self {
        Self {
            coordinator,
            selector,
            notifier,
            reference: config.location.reference_point(),
            trend_method: config.analytics.trend_method,
            station: None,
            sensor: None,
            file: None,
        }
    }

    pub fn station(&self) -> Option<&Station> {
        self.station.as_ref()
    }

    pub fn sensor(&self) -> Option<&Sensor> {
        self.sensor.as_ref()
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Offer all stations, nearest first.
    pub async fn choose_station(&mut self) -> Result<Option<Station>> {
        let stations = self
            .coordinator
            .ensure_station_list()
            .await
            .context("Failed to load station list")?;

        if stations.is_empty() {
            self.notifier.notify(
                "No Data",
                "No station data found. Please download station data first.",
            )?;
            return Ok(None);
        }

        Ok(self.pick_station(&stations))
    }

    /// Download every sensor of the chosen station, then offer them.
    ///
    /// Batch failures become one warning. If the chosen sensor was among
    /// them it is retried once; a second failure is returned as
    /// [`SyncError::Download`].
    pub async fn choose_sensor(&mut self) -> Result<Option<Sensor>> {
        let Some(station_id) = self.station.as_ref().map(|s| s.id) else {
            self.notifier
                .notify("No Station Selected", "Please select a station first.")?;
            return Ok(None);
        };

        let sensors = self
            .coordinator
            .ensure_sensor_list(station_id)
            .await
            .with_context(|| format!("Failed to load sensors for station {}", station_id))?;

        let sensor_ids: Vec<i64> = sensors.iter().map(|s| s.id).collect();
        let report = self
            .coordinator
            .sync_all_sensor_data(station_id, &sensor_ids)
            .await;

        if let Some(chosen) = self.selector.select_sensor(&sensors) {
            self.sensor = Some(chosen);
            self.file = None;
        }

        if let Some(warning) = report.warning_message() {
            self.notifier.notify("Download Warnings", &warning)?;
        }

        if let Some(sensor_id) = self.sensor.as_ref().map(|s| s.id) {
            if let Err(e) = self
                .coordinator
                .ensure_selected(station_id, sensor_id, &report.failed_ids)
                .await
            {
                self.notifier.notify(
                    "Download Error",
                    "Failed to download data for the selected sensor.",
                )?;
                return Err(e.into());
            }
        }

        Ok(self.sensor.clone())
    }

    /// Offer the cached files of the chosen sensor and analyse the pick.
    pub async fn show_data_files(&mut self) -> Result<Option<SeriesReport>> {
        let (Some(station_id), Some(sensor_id)) = (
            self.station.as_ref().map(|s| s.id),
            self.sensor.as_ref().map(|s| s.id),
        ) else {
            self.notifier
                .notify("No Sensor Selected", "Please select a sensor first.")?;
            return Ok(None);
        };

        let cache = self.coordinator.cache();
        let dir = cache.sensor_dir(station_id, sensor_id);
        let files = cache.list_files(&dir, "json")?;
        if files.is_empty() {
            self.notifier.notify(
                "No Data",
                "No data files found for this sensor. Please collect data first.",
            )?;
            return Ok(None);
        }

        let Some(file) = self.selector.select_file(&files) else {
            return Ok(None);
        };

        let path = dir.join(&file);
        let series = match load_series(cache, &path) {
            Ok(series) => series,
            Err(SyncError::Validation(reason)) => {
                tracing::warn!("{}: {}", path.display(), reason);
                self.notifier
                    .notify("Warning", "No values found in the data file.")?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        self.file = Some(file);

        let Some(result) = analyze(&series, self.trend_method) else {
            return Ok(None);
        };

        Ok(Some(SeriesReport {
            file: path,
            axis_label: series.axis_label(),
            chart_points: series.chart_points(),
            series,
            result,
        }))
    }

    /// Browse only what is already on disk: stations and sensors with a
    /// cache directory, then their files.
    pub async fn view_stored_data(&mut self) -> Result<Option<SeriesReport>> {
        let cache = self.coordinator.cache();
        if !cache.exists(cache.root()) {
            self.notifier.notify(
                "No Data",
                "No downloaded data found. Please download data first.",
            )?;
            return Ok(None);
        }

        let station_ids = cache.numeric_dirs(cache.root())?;
        if station_ids.is_empty() {
            self.notifier.notify(
                "No Data",
                "No station data found. Please download station data first.",
            )?;
            return Ok(None);
        }

        let listing = cache
            .read_json(&cache.stations_path())
            .context("Could not open or parse stations file")?;
        let stations = filter_by_ids(parse_stations(&listing)?, &station_ids, |s| s.id);
        let Some(station) = self.pick_station(&stations) else {
            return Ok(None);
        };

        let cache = self.coordinator.cache();
        let sensor_ids = cache.numeric_dirs(&cache.station_dir(station.id))?;
        if sensor_ids.is_empty() {
            self.notifier.notify(
                "No Data",
                "No sensor data found for this station. Please download sensor data first.",
            )?;
            return Ok(None);
        }

        let listing = cache
            .read_json(&cache.sensors_path(station.id))
            .context("Could not open or parse sensors file")?;
        let sensors = filter_by_ids(parse_sensors(&listing, station.id)?, &sensor_ids, |s| s.id);
        let Some(sensor) = self.selector.select_sensor(&sensors) else {
            return Ok(None);
        };
        self.sensor = Some(sensor);
        self.file = None;

        self.show_data_files().await
    }

    /// Rank, offer, and on a pick reset the sensor and file selection.
    fn pick_station(&mut self, stations: &[Station]) -> Option<Station> {
        let ranked = rank_stations(self.reference, stations);
        let chosen = self.selector.select_station(&ranked)?;

        tracing::debug!("Selected station {} ({})", chosen.name, chosen.id);
        self.station = Some(chosen.clone());
        self.sensor = None;
        self.file = None;
        Some(chosen)
    }
}
