//! Render surface boundary.
//!
//! The selector never draws anything itself. It drives a [`RenderSurface`],
//! the minimal set of map primitives it needs: named GeoJSON sources, named
//! layers with declarative filters and visibility, and the current viewport.
//!
//! [`MemorySurface`] is a headless implementation that keeps the style in
//! memory and evaluates filters on demand. It backs the CLI and the tests.

mod memory;

pub use memory::MemorySurface;

use std::sync::Arc;

use geojson::GeoJson;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::Filter;
use crate::geo::{destination_point, GeoBounds, GeoPoint};
use crate::style::LayerSpec;

/// Errors reported by a render surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("Source already exists: {0}")]
    DuplicateSource(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Layer already exists: {0}")]
    DuplicateLayer(String),

    #[error("Unknown layer: {0}")]
    UnknownLayer(String),
}

/// Layer visibility, as in the style-spec `visibility` layout property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    None,
}

/// Camera state: what is on screen and at which zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bounds: GeoBounds,
    pub zoom: f64,
    pub center: GeoPoint,
}

impl Viewport {
    /// Viewport over `bounds`, centered on their midpoint.
    pub fn new(bounds: GeoBounds, zoom: f64) -> Self {
        Self {
            bounds,
            zoom,
            center: bounds.center(),
        }
    }

    /// Square viewport extending `half_span_m` meters from `center` towards
    /// each cardinal direction.
    pub fn around(center: GeoPoint, zoom: f64, half_span_m: f64) -> Self {
        use std::f64::consts::PI;

        let north = destination_point(&center, half_span_m, 0.0);
        let south = destination_point(&center, half_span_m, PI);
        let east = destination_point(&center, half_span_m, PI / 2.0);
        let west = destination_point(&center, half_span_m, -PI / 2.0);

        Self {
            bounds: GeoBounds::new(south.lat, north.lat, west.lon, east.lon),
            zoom,
            center,
        }
    }
}

/// Map primitives consumed by the selector.
///
/// Implementations use interior mutability; every method takes `&self` so a
/// surface can be shared between the selector and its owner.
pub trait RenderSurface: Send + Sync {
    /// Whether the surface has finished loading and accepts style changes.
    fn is_loaded(&self) -> bool;

    fn viewport(&self) -> Viewport;

    fn add_source(&self, id: &str, data: Arc<GeoJson>) -> Result<(), SurfaceError>;

    fn set_source_data(&self, id: &str, data: Arc<GeoJson>) -> Result<(), SurfaceError>;

    fn remove_source(&self, id: &str) -> Result<(), SurfaceError>;

    /// Add a layer, inserted beneath `before` when that layer exists,
    /// otherwise on top.
    fn add_layer(&self, layer: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError>;

    fn remove_layer(&self, id: &str) -> Result<(), SurfaceError>;

    fn has_layer(&self, id: &str) -> bool;

    /// Current filter of a layer; `None` for unknown or unfiltered layers.
    fn filter(&self, layer_id: &str) -> Option<Filter>;

    fn set_filter(&self, layer_id: &str, filter: Filter) -> Result<(), SurfaceError>;

    fn set_visibility(&self, layer_id: &str, visibility: Visibility) -> Result<(), SurfaceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance;

    #[test]
    fn test_viewport_new_centers_on_bounds() {
        let viewport = Viewport::new(GeoBounds::new(48.0, 49.0, 2.0, 3.0), 18.0);
        assert_eq!(viewport.center, GeoPoint::new(48.5, 2.5));
        assert_eq!(viewport.zoom, 18.0);
    }

    #[test]
    fn test_viewport_around() {
        let center = GeoPoint::new(48.85, 2.35);
        let viewport = Viewport::around(center, 18.0, 100.0);

        assert!(viewport.bounds.contains(&center));
        let ns = distance(&viewport.bounds.north_east(), &viewport.bounds.south_east());
        assert!((ns - 200.0).abs() < 0.5, "got {}", ns);
    }

    #[test]
    fn test_visibility_serde() {
        assert_eq!(serde_json::to_value(Visibility::None).unwrap(), "none");
        assert_eq!(serde_json::to_value(Visibility::Visible).unwrap(), "visible");
    }
}
