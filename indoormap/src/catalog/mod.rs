//! Remote map catalog streaming.
//!
//! A catalog server lists the indoor maps intersecting a region and serves
//! each map's GeoJSON:
//!
//! ```text
//! GET {server}/maps-in-bounds/{west},{south},{east},{north}  ->  [{ "path": "/maps/a.geojson", ... }]
//! GET {server}{path}                                         ->  GeoJSON FeatureCollection
//! ```
//!
//! [`MapServerHandler`] watches the viewport and keeps the selector's pool in
//! step with the catalog: it downloads a square region somewhat larger than
//! the screen, diffs the listing against what it already holds (by `path`),
//! registers new maps and unregisters maps that left the region. It refetches
//! only once the viewport leaves the last downloaded region.
//!
//! # Example
//!
//! ```ignore
//! let client = HttpCatalogClient::new("https://maps.example.org")?;
//! let handler = MapServerHandler::new(client, selector, IndoorMapOptions::default(), StreamerConfig::default());
//! let worker = handler.spawn(cancellation.clone());
//! ```

mod error;
mod http;
mod region;
mod streamer;

pub use error::CatalogError;
pub use http::{HttpCatalogClient, DEFAULT_TIMEOUT_SECS};
pub use region::{covers, download_region, DEFAULT_MIN_AREA_M};
pub use streamer::{
    MapServerHandler, RemoteMap, StreamerConfig, SyncOutcome, SyncReport,
    DEFAULT_MIN_ZOOM_TO_DOWNLOAD,
};

use std::future::Future;

use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geo::GeoBounds;

/// One listing entry of the catalog.
///
/// `path` identifies the map across listings; any other fields the server
/// sends are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            extra: Map::new(),
        }
    }
}

/// Access to a map catalog.
///
/// This abstraction allows the streamer to be driven by a mock catalog in
/// tests.
pub trait CatalogClient: Send + Sync {
    /// List the maps intersecting `bounds`.
    fn maps_in_bounds(
        &self,
        bounds: &GeoBounds,
    ) -> impl Future<Output = Result<Vec<CatalogEntry>, CatalogError>> + Send;

    /// Download the GeoJSON payload of a listed map.
    fn fetch_map(
        &self,
        entry: &CatalogEntry,
    ) -> impl Future<Output = Result<GeoJson, CatalogError>> + Send;
}
