//! Air Quality Monitor Library
//!
//! This module exposes the core components of the air quality monitor:
//! station ranking, series analysis and the cache synchronisation workflow.

pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod session;
pub mod sync;
pub mod traits;

// Re-export commonly used types
pub use analytics::{
    SeriesStats, TrendLabel, TrendMethod, TrendResult, analyze, calculate_stats,
    determine_trend, percent_change,
};
pub use api::{Endpoints, HttpFetcher};
pub use cache::{CacheStore, filter_by_ids};
pub use config::AppConfig;
pub use error::SyncError;
pub use geo::{GeoPoint, RankedStation, haversine_km, rank_stations};
pub use model::{MeasurementSeries, Sample, Sensor, Station};
pub use session::{SeriesReport, Session};
pub use sync::{SyncCoordinator, SyncReport, load_series};
pub use traits::{
    ConsoleNotifier, JsonFetcher, MockFetcher, MockNotifier, MockSelector, Notifier, Selector,
};
