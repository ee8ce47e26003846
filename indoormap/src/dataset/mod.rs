//! Indoor map datasets.
//!
//! An [`IndoorMap`] is one building's GeoJSON together with what the selector
//! needs to put it on stage: its level range and bounds (derived once at
//! construction), the layers to install, the external layers to hide and the
//! level to open on.
//!
//! Datasets are immutable once built and shared as `Arc<IndoorMap>` between
//! the catalog streamer, the selector and event subscribers.
//!
//! # Example
//!
//! ```
//! use indoormap::dataset::{IndoorMap, IndoorMapOptions};
//!
//! let json = br#"{
//!     "type": "FeatureCollection",
//!     "features": [{
//!         "type": "Feature",
//!         "properties": { "level": "0;2", "indoor": "room" },
//!         "geometry": { "type": "Point", "coordinates": [2.35, 48.85] }
//!     }]
//! }"#;
//!
//! let map = IndoorMap::from_slice(json, &IndoorMapOptions::default()).unwrap();
//! assert_eq!(map.level_range().max, 2.0);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::GeoBounds;
use crate::level::{extract_level_range_and_bounds, ExtractError, LevelRange};
use crate::style::{default_layers, LayerSpec, StyleError};

/// Level opened on first activation when none is configured.
pub const DEFAULT_LEVEL: f64 = 0.0;

// =============================================================================
// Map Identity
// =============================================================================

static MAP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a constructed dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(u64);

impl MapId {
    fn next() -> Self {
        MapId(MAP_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "map-{}", self.0)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while building a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Style(#[from] StyleError),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid GeoJSON payload: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Options
// =============================================================================

/// Render configuration applied when a dataset is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndoorMapOptions {
    /// Layers to install; `None` uses the bundled indoor style.
    pub layers: Option<Vec<LayerSpec>>,
    /// External layers hidden while the dataset is active.
    pub layers_to_hide: Vec<String>,
    /// External layer the dataset's layers are inserted beneath.
    pub before_layer_id: Option<String>,
    pub default_level: f64,
    pub show_features_with_empty_level: bool,
}

impl Default for IndoorMapOptions {
    fn default() -> Self {
        Self {
            layers: None,
            layers_to_hide: Vec::new(),
            before_layer_id: None,
            default_level: DEFAULT_LEVEL,
            show_features_with_empty_level: false,
        }
    }
}

impl IndoorMapOptions {
    pub fn with_layers(mut self, layers: Vec<LayerSpec>) -> Self {
        self.layers = Some(layers);
        self
    }

    pub fn with_layers_to_hide<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layers_to_hide = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_before_layer_id(mut self, id: impl Into<String>) -> Self {
        self.before_layer_id = Some(id.into());
        self
    }

    pub fn with_default_level(mut self, level: f64) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_show_features_with_empty_level(mut self, show: bool) -> Self {
        self.show_features_with_empty_level = show;
        self
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// One building's indoor dataset.
///
/// Two handles are the same dataset exactly when their [`MapId`]s match.
#[derive(Debug, Clone)]
pub struct IndoorMap {
    id: MapId,
    geojson: Arc<GeoJson>,
    bounds: GeoBounds,
    level_range: LevelRange,
    layers: Vec<LayerSpec>,
    layers_to_hide: Vec<String>,
    before_layer_id: Option<String>,
    default_level: f64,
    show_features_with_empty_level: bool,
}

impl IndoorMap {
    /// Build a dataset from parsed GeoJSON.
    ///
    /// # Errors
    ///
    /// Fails when no feature carries a parseable level tag, when the data has
    /// no coordinates, or when the bundled style cannot be loaded.
    pub fn from_geojson(geojson: GeoJson, options: &IndoorMapOptions) -> Result<Self, DatasetError> {
        let (level_range, bounds) = extract_level_range_and_bounds(&geojson)?;

        let layers = match &options.layers {
            Some(layers) => layers.clone(),
            None => default_layers()?,
        };

        Ok(Self {
            id: MapId::next(),
            geojson: Arc::new(geojson),
            bounds,
            level_range,
            layers,
            layers_to_hide: options.layers_to_hide.clone(),
            before_layer_id: options.before_layer_id.clone(),
            default_level: options.default_level,
            show_features_with_empty_level: options.show_features_with_empty_level,
        })
    }

    /// Build a dataset from raw GeoJSON bytes.
    pub fn from_slice(bytes: &[u8], options: &IndoorMapOptions) -> Result<Self, DatasetError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let geojson = GeoJson::from_json_value(value)?;
        Self::from_geojson(geojson, options)
    }

    /// Build a dataset from a GeoJSON file.
    pub fn from_path(path: &Path, options: &IndoorMapOptions) -> Result<Self, DatasetError> {
        let bytes = std::fs::read(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes, options)
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    /// Shared geometry, installed as the indoor source when active.
    pub fn geojson(&self) -> &Arc<GeoJson> {
        &self.geojson
    }

    pub fn bounds(&self) -> &GeoBounds {
        &self.bounds
    }

    pub fn level_range(&self) -> LevelRange {
        self.level_range
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn layers_to_hide(&self) -> &[String] {
        &self.layers_to_hide
    }

    pub fn before_layer_id(&self) -> Option<&str> {
        self.before_layer_id.as_deref()
    }

    pub fn default_level(&self) -> f64 {
        self.default_level
    }

    pub fn show_features_with_empty_level(&self) -> bool {
        self.show_features_with_empty_level
    }

    /// Level opened on first activation: the default level clamped into range.
    pub fn initial_level(&self) -> f64 {
        self.level_range.clamp(self.default_level)
    }
}

impl PartialEq for IndoorMap {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for IndoorMap {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::style::LayerType;
    use serde_json::json;

    /// Square building at (`lat`, `lon`) with one room per level in `levels`.
    pub(crate) fn building(lat: f64, lon: f64, levels: &[&str]) -> GeoJson {
        let d = 0.0005;
        let features: Vec<_> = levels
            .iter()
            .map(|level| {
                json!({
                    "type": "Feature",
                    "properties": { "indoor": "room", "level": level },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [lon - d, lat - d], [lon + d, lat - d],
                            [lon + d, lat + d], [lon - d, lat + d],
                            [lon - d, lat - d]
                        ]]
                    }
                })
            })
            .collect();
        GeoJson::from_json_value(json!({ "type": "FeatureCollection", "features": features }))
            .unwrap()
    }

    #[test]
    fn test_from_geojson_derives_metadata() {
        let map = IndoorMap::from_geojson(building(48.0, 2.0, &["0", "1;3"]), &IndoorMapOptions::default())
            .unwrap();

        assert_eq!(map.level_range(), LevelRange::new(0.0, 3.0));
        assert!((map.bounds().center().lat - 48.0).abs() < 1e-9);
        assert!((map.bounds().center().lon - 2.0).abs() < 1e-9);
        assert!(!map.layers().is_empty());
        assert!(map.layers_to_hide().is_empty());
        assert_eq!(map.before_layer_id(), None);
    }

    #[test]
    fn test_options_are_applied() {
        let options = IndoorMapOptions::default()
            .with_layers(vec![LayerSpec::new("rooms", LayerType::Fill)])
            .with_layers_to_hide(["poi-label", "building"])
            .with_before_layer_id("road-label")
            .with_default_level(2.0)
            .with_show_features_with_empty_level(true);

        let map = IndoorMap::from_geojson(building(0.0, 0.0, &["0", "1"]), &options).unwrap();
        assert_eq!(map.layers().len(), 1);
        assert_eq!(map.layers_to_hide(), ["poi-label", "building"]);
        assert_eq!(map.before_layer_id(), Some("road-label"));
        assert_eq!(map.default_level(), 2.0);
        assert!(map.show_features_with_empty_level());
    }

    #[test]
    fn test_initial_level_is_clamped() {
        let options = IndoorMapOptions::default().with_default_level(5.0);
        let map = IndoorMap::from_geojson(building(0.0, 0.0, &["-1", "2"]), &options).unwrap();
        assert_eq!(map.initial_level(), 2.0);

        let options = IndoorMapOptions::default().with_default_level(-4.0);
        let map = IndoorMap::from_geojson(building(0.0, 0.0, &["-1", "2"]), &options).unwrap();
        assert_eq!(map.initial_level(), -1.0);

        let map = IndoorMap::from_geojson(building(0.0, 0.0, &["1"]), &IndoorMapOptions::default())
            .unwrap();
        assert_eq!(map.initial_level(), 1.0);
    }

    #[test]
    fn test_ids_are_unique() {
        let options = IndoorMapOptions::default();
        let a = IndoorMap::from_geojson(building(0.0, 0.0, &["0"]), &options).unwrap();
        let b = IndoorMap::from_geojson(building(0.0, 0.0, &["0"]), &options).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_construction_errors() {
        let options = IndoorMapOptions::default();

        let result = IndoorMap::from_geojson(building(0.0, 0.0, &["lobby"]), &options);
        assert!(matches!(result, Err(DatasetError::Extract(ExtractError::NoLevelFound))));

        let result = IndoorMap::from_slice(b"not json", &options);
        assert!(matches!(result, Err(DatasetError::Json(_))));

        let result = IndoorMap::from_slice(br#"{ "type": "Circle" }"#, &options);
        assert!(matches!(result, Err(DatasetError::GeoJson(_))));

        let result = IndoorMap::from_path(Path::new("/nonexistent/building.geojson"), &options);
        assert!(matches!(result, Err(DatasetError::Io { .. })));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: IndoorMapOptions =
            serde_json::from_value(json!({ "default_level": 3.0 })).unwrap();
        assert_eq!(options.default_level, 3.0);
        assert_eq!(options.layers, None);
        assert!(!options.show_features_with_empty_level);
    }
}
