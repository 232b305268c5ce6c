//! Seams between the core and its collaborators.
//!
//! This module provides traits for:
//! - `JsonFetcher`: remote JSON retrieval, so sync logic can run against fakes
//! - `Notifier`: user-visible messages (warnings, hard errors)
//! - `Selector`: the user's choice among stations, sensors and files

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::SyncError,
    geo::RankedStation,
    model::{Sensor, Station},
};

// ==================== JsonFetcher Trait ====================

/// Fetches a JSON document with HTTP GET semantics.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, SyncError>;
}

/// Scripted fetcher for tests.
///
/// Each URL has a queue of responses. Responses are consumed in order and the
/// last one repeats. URLs without a script fail with a network error.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, VecDeque<Result<Value, SyncError>>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`.
    pub fn respond(&self, url: impl Into<String>, response: Result<Value, SyncError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .push_back(response);
    }

    /// All URLs requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl JsonFetcher for MockFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, SyncError> {
        self.calls.lock().unwrap().push(url.to_string());

        let unscripted = || Err(SyncError::Network(format!("no response for {}", url)));

        let mut responses = self.responses.lock().unwrap();
        let Some(queue) = responses.get_mut(url) else {
            return unscripted();
        };
        if queue.len() > 1 {
            return queue.pop_front().unwrap_or_else(unscripted);
        }
        queue.front().cloned().unwrap_or_else(unscripted)
    }
}

// ==================== Notifier Trait ====================

/// Trait for user-visible messages.
///
/// This allows testing reporting logic without a terminal or dialog.
pub trait Notifier: Send + Sync {
    /// Show a message with the given title and body.
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Notifier that writes to stderr.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        eprintln!("[{}] {}", title, body);
        Ok(())
    }
}

/// Mock notifier for testing that records all notifications.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    notifications: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockNotifier {
    /// Create a new mock notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all notifications that have been sent.
    pub fn get_notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    /// Get the count of notifications sent.
    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    /// Check if a notification with this title was sent.
    pub fn has_title(&self, title: &str) -> bool {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .any(|(t, _)| t == title)
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

// ==================== Selector Trait ====================

/// The user's side of a selection. `None` means the choice was cancelled.
pub trait Selector: Send + Sync {
    fn select_station(&self, candidates: &[RankedStation]) -> Option<Station>;
    fn select_sensor(&self, candidates: &[Sensor]) -> Option<Sensor>;
    fn select_file(&self, candidates: &[String]) -> Option<String>;
}

/// Selector that picks preconfigured ids and records what it was offered.
#[derive(Debug, Clone, Default)]
pub struct MockSelector {
    station_id: Option<i64>,
    sensor_id: Option<i64>,
    file_name: Option<String>,
    offered_stations: Arc<Mutex<Vec<i64>>>,
    offered_sensors: Arc<Mutex<Vec<i64>>>,
    offered_files: Arc<Mutex<Vec<String>>>,
}

impl MockSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_station(mut self, id: i64) -> Self {
        self.station_id = Some(id);
        self
    }

    pub fn with_sensor(mut self, id: i64) -> Self {
        self.sensor_id = Some(id);
        self
    }

    pub fn with_file(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Station ids in the order they were last offered.
    pub fn offered_stations(&self) -> Vec<i64> {
        self.offered_stations.lock().unwrap().clone()
    }

    pub fn offered_sensors(&self) -> Vec<i64> {
        self.offered_sensors.lock().unwrap().clone()
    }

    pub fn offered_files(&self) -> Vec<String> {
        self.offered_files.lock().unwrap().clone()
    }
}

impl Selector for MockSelector {
    fn select_station(&self, candidates: &[RankedStation]) -> Option<Station> {
        *self.offered_stations.lock().unwrap() =
            candidates.iter().map(|c| c.station.id).collect();
        let id = self.station_id?;
        candidates
            .iter()
            .find(|c| c.station.id == id)
            .map(|c| c.station.clone())
    }

    fn select_sensor(&self, candidates: &[Sensor]) -> Option<Sensor> {
        *self.offered_sensors.lock().unwrap() = candidates.iter().map(|s| s.id).collect();
        let id = self.sensor_id?;
        candidates.iter().find(|s| s.id == id).cloned()
    }

    fn select_file(&self, candidates: &[String]) -> Option<String> {
        *self.offered_files.lock().unwrap() = candidates.to_vec();
        let name = self.file_name.as_ref()?;
        candidates.iter().find(|f| *f == name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_mock_fetcher_consumes_then_repeats_last() {
        let fetcher = MockFetcher::new();
        fetcher.respond("u", Err(SyncError::Network("down".into())));
        fetcher.respond("u", Ok(json!([1])));

        assert!(fetcher.fetch_json("u").await.is_err());
        assert_eq!(fetcher.fetch_json("u").await.unwrap(), json!([1]));
        assert_eq!(fetcher.fetch_json("u").await.unwrap(), json!([1]));
        assert_eq!(fetcher.calls_to("u"), 3);
    }

    #[tokio::test]
    async fn test_mock_fetcher_unknown_url_fails() {
        let fetcher = MockFetcher::new();
        let err = fetcher.fetch_json("missing").await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[test]
    fn test_mock_notifier_records_notifications() {
        let notifier = MockNotifier::new();
        assert_eq!(notifier.notification_count(), 0);

        notifier.notify("Title 1", "Body 1").unwrap();
        notifier.notify("Title 2", "Body 2").unwrap();

        assert_eq!(notifier.notification_count(), 2);
        assert!(notifier.has_title("Title 2"));
        assert_eq!(
            notifier.get_notifications()[0],
            ("Title 1".to_string(), "Body 1".to_string())
        );
    }

    #[test]
    fn test_mock_selector_picks_by_id() {
        let ranked = vec![
            RankedStation {
                station: Station {
                    id: 1,
                    name: "A".into(),
                    latitude: 0.0,
                    longitude: 0.0,
                },
                distance_km: 1.0,
            },
            RankedStation {
                station: Station {
                    id: 2,
                    name: "B".into(),
                    latitude: 0.0,
                    longitude: 0.0,
                },
                distance_km: 2.0,
            },
        ];
        let selector = MockSelector::new().with_station(2);

        let chosen = selector.select_station(&ranked).unwrap();
        assert_eq!(chosen.name, "B");
        assert_eq!(selector.offered_stations(), vec![1, 2]);
    }

    #[test]
    fn test_mock_selector_cancels_without_choice() {
        let selector = MockSelector::new();
        assert!(selector.select_file(&["a.json".to_string()]).is_none());
        assert_eq!(selector.offered_files(), vec!["a.json".to_string()]);
    }
}
