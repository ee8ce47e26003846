//! Render layer descriptors and the bundled indoor style.
//!
//! A dataset installs one [`LayerSpec`] per entry of its layer list when it
//! becomes active. Layers read from the shared GeoJSON source [`SOURCE_ID`];
//! their `filter` is the base filter later composed with the active level.
//!
//! The bundled style (`assets/default_layers.json`) contains a `poi-indoor`
//! meta layer that is not rendered as-is: [`expand_poi_layers`] replaces it
//! with one symbol layer per POI category.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::Filter;

/// Identifier of the GeoJSON source the active dataset is installed under.
pub const SOURCE_ID: &str = "indoor";

/// Identifier of the meta layer expanded into per-category POI layers.
pub const POI_META_LAYER_ID: &str = "poi-indoor";

const BUNDLED_LAYERS: &str = include_str!("../../assets/default_layers.json");

/// Errors raised while loading layer descriptors.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("Invalid layer list: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read layer file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate layer id: {0}")]
    DuplicateId(String),
}

/// Render layer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerType {
    Fill,
    Line,
    Symbol,
    Circle,
    FillExtrusion,
    Heatmap,
    Raster,
    Hillshade,
    Background,
}

/// A style layer, as installed on the render surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minzoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxzoom: Option<f64>,
    /// Base filter; `None` means every feature of the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub layout: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub paint: Map<String, Value>,
}

fn default_source() -> String {
    SOURCE_ID.to_string()
}

impl LayerSpec {
    /// Create a bare layer on the indoor source.
    pub fn new(id: impl Into<String>, layer_type: LayerType) -> Self {
        Self {
            id: id.into(),
            layer_type,
            source: default_source(),
            minzoom: None,
            maxzoom: None,
            filter: None,
            layout: Map::new(),
            paint: Map::new(),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// POI category rendered by an expanded `poi-indoor-<icon>` layer.
#[derive(Debug, Clone, Copy)]
struct PoiCategory {
    key: &'static str,
    /// `None` matches any feature carrying `key`.
    value: Option<&'static str>,
    icon: &'static str,
}

impl PoiCategory {
    const fn tag(key: &'static str, value: &'static str, icon: &'static str) -> Self {
        Self {
            key,
            value: Some(value),
            icon,
        }
    }

    fn filter(&self) -> Filter {
        match self.value {
            Some(value) => Filter::eq(self.key, value),
            None => Filter::has(self.key),
        }
    }
}

const POI_CATEGORIES: &[PoiCategory] = &[
    PoiCategory::tag("amenity", "fast_food", "fast-food"),
    PoiCategory::tag("amenity", "restaurant", "restaurant"),
    PoiCategory::tag("amenity", "cafe", "cafe"),
    PoiCategory::tag("amenity", "bank", "bank"),
    PoiCategory::tag("amenity", "toilets", "toilet"),
    PoiCategory::tag("shop", "travel_agency", "suitcase"),
    PoiCategory::tag("shop", "convenience", "grocery"),
    PoiCategory::tag("shop", "bakery", "bakery"),
    PoiCategory::tag("shop", "chemist", "pharmacy"),
    PoiCategory::tag("shop", "clothes", "clothing-store"),
    PoiCategory::tag("highway", "steps", "entrance"),
    PoiCategory {
        key: "shop",
        value: None,
        icon: "shop",
    },
];

/// Replace the `poi-indoor` meta layer with one layer per POI category.
///
/// Each expanded layer copies the meta layer, takes the id
/// `poi-indoor-<icon>`, the category filter and `icon-image = "<icon>-15"`.
/// Expanded layers are appended after the remaining layers. Lists without a
/// meta layer are returned unchanged.
pub fn expand_poi_layers(mut layers: Vec<LayerSpec>) -> Vec<LayerSpec> {
    let Some(index) = layers.iter().position(|l| l.id == POI_META_LAYER_ID) else {
        return layers;
    };
    let meta = layers.remove(index);

    layers.extend(POI_CATEGORIES.iter().map(|poi| {
        let mut layer = meta.clone();
        layer.id = format!("{}-{}", meta.id, poi.icon);
        layer.filter = Some(poi.filter());
        layer
            .layout
            .insert("icon-image".to_string(), Value::String(format!("{}-15", poi.icon)));
        layer
    }));

    layers
}

/// Parse a JSON array of layer descriptors.
///
/// Layer ids must be unique within the list. The POI meta layer is expanded.
pub fn parse_layers(json: &str) -> Result<Vec<LayerSpec>, StyleError> {
    let layers: Vec<LayerSpec> = serde_json::from_str(json)?;
    let layers = expand_poi_layers(layers);

    let duplicate = {
        let mut seen = std::collections::HashSet::new();
        layers
            .iter()
            .find(|l| !seen.insert(l.id.as_str()))
            .map(|l| l.id.clone())
    };
    match duplicate {
        Some(id) => Err(StyleError::DuplicateId(id)),
        None => Ok(layers),
    }
}

/// Read a layer list from a JSON file.
pub fn load_layers_file(path: &Path) -> Result<Vec<LayerSpec>, StyleError> {
    let json = std::fs::read_to_string(path).map_err(|source| StyleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_layers(&json)
}

/// The bundled indoor style, POI layers expanded.
pub fn default_layers() -> Result<Vec<LayerSpec>, StyleError> {
    parse_layers(BUNDLED_LAYERS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_layers_expand_poi() {
        let layers = default_layers().unwrap();
        let ids: Vec<&str> = layers.iter().map(|l| l.id.as_str()).collect();

        assert_eq!(layers.len(), 20 + POI_CATEGORIES.len());
        assert_eq!(ids[0], "buildings-background");
        assert!(!ids.contains(&POI_META_LAYER_ID));
        assert_eq!(ids.last(), Some(&"poi-indoor-shop"));
        assert!(ids.contains(&"poi-indoor-text-ref"));
        assert!(layers.iter().all(|l| l.source == SOURCE_ID));
    }

    #[test]
    fn test_expanded_layer_shape() {
        let layers = default_layers().unwrap();
        let cafe = layers.iter().find(|l| l.id == "poi-indoor-cafe").unwrap();

        assert_eq!(cafe.layer_type, LayerType::Symbol);
        assert_eq!(cafe.filter, Some(Filter::eq("amenity", "cafe")));
        assert_eq!(cafe.layout["icon-image"], json!("cafe-15"));
        // Other layout keys are inherited from the meta layer
        assert_eq!(cafe.layout["text-field"], json!("{name}"));
        assert_eq!(cafe.minzoom, Some(17.0));
    }

    #[test]
    fn test_bundled_filters_decode() {
        let layers = default_layers().unwrap();
        let rooms = layers.iter().find(|l| l.id == "indoor-rooms").unwrap();
        assert_eq!(rooms.filter, Some(Filter::eq("indoor", "room")));

        let furniture = layers.iter().find(|l| l.id == "indoor-furniture").unwrap();
        assert!(matches!(furniture.filter, Some(Filter::Any(ref c)) if c.len() == 3));
    }

    #[test]
    fn test_list_without_meta_layer_unchanged() {
        let layers = vec![LayerSpec::new("rooms", LayerType::Fill)];
        assert_eq!(expand_poi_layers(layers.clone()), layers);
    }

    #[test]
    fn test_parse_layers_defaults() {
        let layers = parse_layers(r#"[{ "id": "walls", "type": "line" }]"#).unwrap();
        assert_eq!(layers[0].source, SOURCE_ID);
        assert_eq!(layers[0].filter, None);
        assert!(layers[0].paint.is_empty());
    }

    #[test]
    fn test_parse_layers_errors() {
        assert!(matches!(
            parse_layers(r#"[{ "id": "a", "type": "fill" }, { "id": "a", "type": "line" }]"#),
            Err(StyleError::DuplicateId(id)) if id == "a"
        ));
        assert!(matches!(
            parse_layers(r#"[{ "id": "a", "type": "fill", "filter": ["nope"] }]"#),
            Err(StyleError::Parse(_))
        ));
        assert!(matches!(
            parse_layers(r#"[{ "id": "a", "type": "sphere" }]"#),
            Err(StyleError::Parse(_))
        ));
    }

    #[test]
    fn test_load_layers_file_missing() {
        let result = load_layers_file(Path::new("/nonexistent/layers.json"));
        assert!(matches!(result, Err(StyleError::Io { .. })));
    }

    #[test]
    fn test_serialized_layer_omits_empty_fields() {
        let layer = LayerSpec::new("rooms", LayerType::FillExtrusion)
            .with_filter(Filter::eq("indoor", "room"));
        let value = serde_json::to_value(&layer).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "rooms",
                "type": "fill-extrusion",
                "source": "indoor",
                "filter": ["==", ["get", "indoor"], "room"]
            })
        );
    }
}
