use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::{config::NetworkConfig, error::SyncError, traits::JsonFetcher};

/// URL builder for the air-quality REST API.
#[derive(Clone, Debug)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn stations(&self) -> String {
        format!("{}/station/findAll", self.base_url)
    }

    pub fn sensors(&self, station_id: i64) -> String {
        format!("{}/station/sensors/{}", self.base_url, station_id)
    }

    pub fn measurements(&self, sensor_id: i64) -> String {
        format!("{}/data/getData/{}", self.base_url, sensor_id)
    }
}

/// HTTP client for fetching JSON documents.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a new client with configurable timeouts.
    pub fn new(network_config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl JsonFetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, SyncError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Network(format!(
                "{} returned error status: {}",
                url, status
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                SyncError::Parse(format!("invalid JSON from {}: {}", url, e))
            } else {
                SyncError::Network(format!("reading body from {} failed: {}", url, e))
            }
        })
    }
}
