//! Headless in-memory render surface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use geojson::{Feature, GeoJson};
use parking_lot::Mutex;

use super::{RenderSurface, SurfaceError, Viewport, Visibility};
use crate::events::{EventBus, MapEvent};
use crate::filter::Filter;
use crate::style::LayerSpec;

#[derive(Debug, Clone)]
struct SurfaceLayer {
    spec: LayerSpec,
    filter: Option<Filter>,
    visibility: Visibility,
}

#[derive(Debug)]
struct SurfaceState {
    loaded: bool,
    viewport: Viewport,
    sources: HashMap<String, Arc<GeoJson>>,
    /// Bottom to top.
    layers: Vec<SurfaceLayer>,
}

/// Render surface that keeps its style in memory.
///
/// Camera changes go through [`move_to`](Self::move_to), which emits `move`
/// then `moveend` on the attached event bus, mirroring an interactive map.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use indoormap::events::EventBus;
/// use indoormap::geo::GeoBounds;
/// use indoormap::surface::{MemorySurface, RenderSurface, Viewport};
///
/// let bus = Arc::new(EventBus::new());
/// let surface = MemorySurface::new(Viewport::new(GeoBounds::new(0.0, 0.001, 0.0, 0.001), 18.0))
///     .with_events(Arc::clone(&bus));
/// surface.mark_loaded();
/// assert!(surface.is_loaded());
/// ```
#[derive(Debug)]
pub struct MemorySurface {
    state: Mutex<SurfaceState>,
    events: Option<Arc<EventBus>>,
    rejections: AtomicUsize,
}

impl MemorySurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            state: Mutex::new(SurfaceState {
                loaded: false,
                viewport,
                sources: HashMap::new(),
                layers: Vec::new(),
            }),
            events: None,
            rejections: AtomicUsize::new(0),
        }
    }

    /// Attach the bus surface events are emitted on.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Mark the style loaded and emit `load`.
    pub fn mark_loaded(&self) {
        self.state.lock().loaded = true;
        self.emit(MapEvent::Load);
    }

    /// Move the camera and emit `move` then `moveend`.
    pub fn move_to(&self, viewport: Viewport) {
        self.state.lock().viewport = viewport;
        self.emit(MapEvent::Move);
        self.emit(MapEvent::MoveEnd);
    }

    /// Add a layer owned by the host application (base map roads, labels...).
    ///
    /// Unlike [`RenderSurface::add_layer`], the layer's source need not exist.
    pub fn add_external_layer(&self, layer: LayerSpec) -> Result<(), SurfaceError> {
        let mut state = self.state.lock();
        if state.layers.iter().any(|l| l.spec.id == layer.id) {
            drop(state);
            return Err(self.reject(SurfaceError::DuplicateLayer(layer.id)));
        }
        state.layers.push(SurfaceLayer {
            filter: layer.filter.clone(),
            spec: layer,
            visibility: Visibility::Visible,
        });
        Ok(())
    }

    /// Layer ids, bottom to top.
    pub fn layer_ids(&self) -> Vec<String> {
        self.state.lock().layers.iter().map(|l| l.spec.id.clone()).collect()
    }

    pub fn visibility(&self, layer_id: &str) -> Option<Visibility> {
        self.state
            .lock()
            .layers
            .iter()
            .find(|l| l.spec.id == layer_id)
            .map(|l| l.visibility)
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.state.lock().sources.contains_key(id)
    }

    pub fn source(&self, id: &str) -> Option<Arc<GeoJson>> {
        self.state.lock().sources.get(id).cloned()
    }

    /// Features a layer would draw: its source's features passing its filter.
    ///
    /// Hidden layers and layers whose source is missing draw nothing.
    pub fn rendered_features(&self, layer_id: &str) -> Vec<Feature> {
        let state = self.state.lock();
        let Some(layer) = state.layers.iter().find(|l| l.spec.id == layer_id) else {
            return Vec::new();
        };
        if layer.visibility == Visibility::None {
            return Vec::new();
        }
        let Some(source) = state.sources.get(&layer.spec.source) else {
            return Vec::new();
        };

        let features: Vec<&Feature> = match source.as_ref() {
            GeoJson::FeatureCollection(fc) => fc.features.iter().collect(),
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(_) => Vec::new(),
        };
        features
            .into_iter()
            .filter(|f| layer.filter.as_ref().map_or(true, |filter| filter.matches(f)))
            .cloned()
            .collect()
    }

    /// Number of operations the surface refused so far.
    pub fn rejections(&self) -> usize {
        self.rejections.load(Ordering::Relaxed)
    }

    fn emit(&self, event: MapEvent) {
        if let Some(events) = &self.events {
            events.emit_map(event);
        }
    }

    fn reject(&self, error: SurfaceError) -> SurfaceError {
        self.rejections.fetch_add(1, Ordering::Relaxed);
        error
    }

    fn with_layer<T>(
        &self,
        layer_id: &str,
        f: impl FnOnce(&mut SurfaceLayer) -> T,
    ) -> Result<T, SurfaceError> {
        let mut state = self.state.lock();
        match state.layers.iter_mut().find(|l| l.spec.id == layer_id) {
            Some(layer) => Ok(f(layer)),
            None => Err(self.reject(SurfaceError::UnknownLayer(layer_id.to_string()))),
        }
    }
}

impl RenderSurface for MemorySurface {
    fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    fn viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    fn add_source(&self, id: &str, data: Arc<GeoJson>) -> Result<(), SurfaceError> {
        let mut state = self.state.lock();
        if state.sources.contains_key(id) {
            drop(state);
            return Err(self.reject(SurfaceError::DuplicateSource(id.to_string())));
        }
        state.sources.insert(id.to_string(), data);
        Ok(())
    }

    fn set_source_data(&self, id: &str, data: Arc<GeoJson>) -> Result<(), SurfaceError> {
        let mut state = self.state.lock();
        match state.sources.get_mut(id) {
            Some(slot) => {
                *slot = data;
                Ok(())
            }
            None => Err(self.reject(SurfaceError::UnknownSource(id.to_string()))),
        }
    }

    fn remove_source(&self, id: &str) -> Result<(), SurfaceError> {
        let removed = self.state.lock().sources.remove(id);
        match removed {
            Some(_) => Ok(()),
            None => Err(self.reject(SurfaceError::UnknownSource(id.to_string()))),
        }
    }

    fn add_layer(&self, layer: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError> {
        let mut state = self.state.lock();
        let error = if state.layers.iter().any(|l| l.spec.id == layer.id) {
            Some(SurfaceError::DuplicateLayer(layer.id.clone()))
        } else if !state.sources.contains_key(&layer.source) {
            Some(SurfaceError::UnknownSource(layer.source.clone()))
        } else {
            None
        };
        if let Some(error) = error {
            drop(state);
            return Err(self.reject(error));
        }

        let entry = SurfaceLayer {
            spec: layer.clone(),
            filter: layer.filter.clone(),
            visibility: Visibility::Visible,
        };
        let position = before.and_then(|id| state.layers.iter().position(|l| l.spec.id == id));
        match position {
            Some(index) => state.layers.insert(index, entry),
            None => state.layers.push(entry),
        }
        Ok(())
    }

    fn remove_layer(&self, id: &str) -> Result<(), SurfaceError> {
        let mut state = self.state.lock();
        match state.layers.iter().position(|l| l.spec.id == id) {
            Some(index) => {
                state.layers.remove(index);
                Ok(())
            }
            None => {
                drop(state);
                Err(self.reject(SurfaceError::UnknownLayer(id.to_string())))
            }
        }
    }

    fn has_layer(&self, id: &str) -> bool {
        self.state.lock().layers.iter().any(|l| l.spec.id == id)
    }

    fn filter(&self, layer_id: &str) -> Option<Filter> {
        self.state
            .lock()
            .layers
            .iter()
            .find(|l| l.spec.id == layer_id)
            .and_then(|l| l.filter.clone())
    }

    fn set_filter(&self, layer_id: &str, filter: Filter) -> Result<(), SurfaceError> {
        self.with_layer(layer_id, |layer| layer.filter = Some(filter))
    }

    fn set_visibility(&self, layer_id: &str, visibility: Visibility) -> Result<(), SurfaceError> {
        self.with_layer(layer_id, |layer| layer.visibility = visibility)
    }
}
