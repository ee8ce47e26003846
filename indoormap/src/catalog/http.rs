//! HTTP catalog client.

use std::time::Duration;

use geojson::GeoJson;

use super::{CatalogClient, CatalogEntry, CatalogError};
use crate::geo::GeoBounds;

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Catalog client over HTTP using reqwest.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    server_url: String,
}

impl HttpCatalogClient {
    /// Creates a client for `server_url` with the default timeout.
    pub fn new(server_url: impl Into<String>) -> Result<Self, CatalogError> {
        Self::with_timeout(server_url, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client for `server_url` with a custom timeout.
    pub fn with_timeout(server_url: impl Into<String>, timeout_secs: u64) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CatalogError::Client(e.to_string()))?;

        let server_url = server_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, server_url })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Listing URL for `bounds`, edges in west, south, east, north order.
    pub fn maps_in_bounds_url(&self, bounds: &GeoBounds) -> String {
        format!(
            "{}/maps-in-bounds/{},{},{},{}",
            self.server_url,
            bounds.west(),
            bounds.south(),
            bounds.east(),
            bounds.north()
        )
    }

    /// Payload URL of a listed map: the server URL followed by its path.
    pub fn map_url(&self, entry: &CatalogEntry) -> String {
        format!("{}{}", self.server_url, entry.path)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let response = self.client.get(url).send().await.map_err(|e| CatalogError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| CatalogError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

fn parse_error(url: &str, e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

impl CatalogClient for HttpCatalogClient {
    async fn maps_in_bounds(&self, bounds: &GeoBounds) -> Result<Vec<CatalogEntry>, CatalogError> {
        let url = self.maps_in_bounds_url(bounds);
        tracing::debug!(url = %url, "Listing catalog maps");

        let body = self.get(&url).await?;
        serde_json::from_slice(&body).map_err(|e| parse_error(&url, e))
    }

    async fn fetch_map(&self, entry: &CatalogEntry) -> Result<GeoJson, CatalogError> {
        let url = self.map_url(entry);
        tracing::debug!(url = %url, "Downloading indoor map");

        let body = self.get(&url).await?;
        let value: serde_json::Value = serde_json::from_slice(&body).map_err(|e| parse_error(&url, e))?;
        GeoJson::from_json_value(value).map_err(|e| parse_error(&url, e))
    }
}
