use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{analytics::TrendMethod, geo::GeoPoint};

pub const DEFAULT_BASE_URL: &str = "http://api.gios.gov.pl/pjp-api/rest";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub network: NetworkConfig,
    pub location: LocationConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Root of the on-disk measurement cache
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("cache"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
        }
    }
}

/// Reference point for ranking stations by distance.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for LocationConfig {
    /// Geometric centre of Poland.
    fn default() -> Self {
        Self {
            latitude: 52.11433,
            longitude: 19.42367,
        }
    }
}

impl LocationConfig {
    pub fn reference_point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AnalyticsConfig {
    pub trend_method: TrendMethod,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("air-quality-monitor");

        let builder = Config::builder()
            // 1. Defaults
            .set_default("api.base_url", DEFAULT_BASE_URL)?
            .set_default("cache.root", "cache")?
            .set_default("network.request_timeout_secs", 10)?
            .set_default("network.connect_timeout_secs", 5)?
            .set_default("location.latitude", 52.11433)?
            .set_default("location.longitude", 19.42367)?
            .set_default("analytics.trend_method", "regression")?

            // 2. Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Environment variables (AIRQ__LOCATION__LATITUDE=...)
            .add_source(Environment::with_prefix("AIRQ").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Default Value Tests ====================

    #[test]
    fn test_api_config_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, "http://api.gios.gov.pl/pjp-api/rest");
    }

    #[test]
    fn test_cache_config_defaults() {
        assert_eq!(CacheConfig::default().root, PathBuf::from("cache"));
    }

    #[test]
    fn test_network_config_defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[test]
    fn test_location_config_defaults() {
        let point = LocationConfig::default().reference_point();
        assert_eq!(point.latitude, 52.11433);
        assert_eq!(point.longitude, 19.42367);
    }

    #[test]
    fn test_analytics_config_defaults() {
        assert_eq!(
            AnalyticsConfig::default().trend_method,
            TrendMethod::Regression
        );
    }

    // ==================== Config Loading Tests ====================

    #[test]
    fn test_config_load_with_defaults() {
        let result = AppConfig::load();
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn test_loaded_config_has_expected_structure() {
        let config = AppConfig::load().expect("Config should load");

        assert!(!config.api.base_url.is_empty());
        assert!(config.network.request_timeout_secs > 0);
        assert!(config.network.request_timeout_secs >= config.network.connect_timeout_secs);
        assert!((-90.0..=90.0).contains(&config.location.latitude));
        assert!((-180.0..=180.0).contains(&config.location.longitude));
    }

    // ==================== Environment Variable Override Tests ====================

    /// Helper to set and remove environment variables in tests.
    fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        // SAFETY: Test environment, keys are unique to each test
        for (key, value) in vars {
            unsafe {
                std::env::set_var(key, value);
            }
        }
        let result = f();
        for (key, _) in vars {
            unsafe {
                std::env::remove_var(key);
            }
        }
        result
    }

    #[test]
    fn test_env_var_overrides_location() {
        let vars = [
            ("AIRQ__LOCATION__LATITUDE", "50.06"),
            ("AIRQ__LOCATION__LONGITUDE", "19.95"),
        ];

        let config = with_env_vars(&vars, || AppConfig::load().expect("Config should load"));

        assert_eq!(config.location.latitude, 50.06);
        assert_eq!(config.location.longitude, 19.95);
    }

    #[test]
    fn test_env_var_overrides_trend_method() {
        let vars = [("AIRQ__ANALYTICS__TREND_METHOD", "thirds")];

        let config = with_env_vars(&vars, || AppConfig::load().expect("Config should load"));

        assert_eq!(config.analytics.trend_method, TrendMethod::Thirds);
    }

    #[test]
    fn test_env_var_overrides_base_url() {
        let vars = [("AIRQ__API__BASE_URL", "http://localhost:9999/rest")];

        let config = with_env_vars(&vars, || AppConfig::load().expect("Config should load"));

        assert_eq!(config.api.base_url, "http://localhost:9999/rest");
    }
}
