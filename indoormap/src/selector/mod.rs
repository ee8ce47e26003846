//! Active map and level selection.
//!
//! The [`IndoorSelector`] owns the pool of candidate datasets and decides
//! which one is on stage for the current viewport. It installs the active
//! dataset's source and layers on the render surface, keeps every installed
//! layer's filter in sync with the active level, and publishes
//! `indoor.map.loaded`, `indoor.map.unloaded` and `indoor.level.changed`.
//!
//! # Architecture
//!
//! ```text
//! RenderSurface ──load/moveend──► run loop ──► refresh()
//!                                   ▲            │ closest_map()
//! register()/unregister() ──wakeup──┘            ▼
//!                                        swap: deactivate old, activate new
//!                                                │
//!                                   EventBus ◄───┘ loaded/unloaded/level
//! ```
//!
//! All state lives behind one mutex that a recompute pass holds from reading
//! the pool and viewport until its swap is applied, so two passes can never
//! interleave their layer operations. Update requests made while a pass is
//! running collapse into a single follow-up pass that reads the latest state.

mod closest;
mod error;

pub use closest::closest_map;
pub use error::SelectionError;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dataset::{IndoorMap, MapId};
use crate::events::{EventBus, IndoorEvent, MapEvent};
use crate::filter::{filter_with_level, Filter};
use crate::level::format_level;
use crate::style::SOURCE_ID;
use crate::surface::{RenderSurface, SurfaceError, Visibility};

/// Zoom below which no indoor map is shown.
pub const DEFAULT_MIN_ZOOM: f64 = 17.0;

/// Selector configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    pub min_zoom: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM,
        }
    }
}

impl SelectorConfig {
    pub fn with_min_zoom(mut self, min_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self
    }
}

#[derive(Debug, Default)]
struct SelectionState {
    maps: Vec<Arc<IndoorMap>>,
    selected: Option<Arc<IndoorMap>>,
    level: Option<f64>,
    /// Base filter of every installed layer, in installation order.
    installed_filters: Vec<(String, Filter)>,
    /// Level each map was left at when it last went off stage.
    last_levels: HashMap<MapId, f64>,
}

/// Chooses the indoor map on stage and drives its layers.
pub struct IndoorSelector<S> {
    surface: Arc<S>,
    events: Arc<EventBus>,
    config: SelectorConfig,
    state: Mutex<SelectionState>,
    wakeup: Notify,
    requested: AtomicU64,
    completed: watch::Sender<u64>,
}

impl<S: RenderSurface + 'static> IndoorSelector<S> {
    pub fn new(surface: Arc<S>, events: Arc<EventBus>, config: SelectorConfig) -> Arc<Self> {
        let (completed, _) = watch::channel(0);
        Arc::new(Self {
            surface,
            events,
            config,
            state: Mutex::new(SelectionState::default()),
            wakeup: Notify::new(),
            requested: AtomicU64::new(0),
            completed,
        })
    }

    pub fn surface(&self) -> &Arc<S> {
        &self.surface
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────
    // Pool
    // ─────────────────────────────────────────────────────────────────────

    /// Add a map to the pool and request a recompute.
    ///
    /// Returns `false` if the map was already registered.
    pub fn register(&self, map: Arc<IndoorMap>) -> bool {
        {
            let mut state = self.state.lock();
            if state.maps.iter().any(|m| m.id() == map.id()) {
                return false;
            }
            tracing::debug!(map = %map.id(), levels = %map.level_range(), "Indoor map registered");
            state.maps.push(map);
        }
        self.request_update();
        true
    }

    /// Remove a map from the pool.
    ///
    /// If it is on stage it is swapped out before returning, for the closest
    /// remaining map or for nothing. Returns `false` for unknown maps.
    pub fn unregister(&self, id: MapId) -> bool {
        let mut pending = Vec::new();
        {
            let mut state = self.state.lock();
            let before = state.maps.len();
            state.maps.retain(|m| m.id() != id);
            if state.maps.len() == before {
                return false;
            }

            if state.selected.as_ref().is_some_and(|m| m.id() == id) {
                let target = self.target(&state.maps);
                self.swap(&mut state, target, &mut pending);
            }
            state.last_levels.remove(&id);
            tracing::debug!(map = %id, "Indoor map unregistered");
        }
        self.publish(pending);
        self.request_update();
        true
    }

    pub fn maps(&self) -> Vec<Arc<IndoorMap>> {
        self.state.lock().maps.clone()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────

    pub fn selected_map(&self) -> Option<Arc<IndoorMap>> {
        self.state.lock().selected.clone()
    }

    pub fn level(&self) -> Option<f64> {
        self.state.lock().level
    }

    /// Change the active level and publish `indoor.level.changed`.
    ///
    /// # Errors
    ///
    /// - [`SelectionError::NoMapSelected`] when no map is on stage
    /// - [`SelectionError::LevelOutOfRange`] when the active map has no such level
    ///
    /// Layer filters are untouched on error.
    pub fn set_level(&self, level: f64) -> Result<(), SelectionError> {
        self.change_level(level, true)
    }

    /// Change the active level without publishing an event.
    pub fn set_level_without_event(&self, level: f64) -> Result<(), SelectionError> {
        self.change_level(level, false)
    }

    fn change_level(&self, level: f64, notify: bool) -> Result<(), SelectionError> {
        {
            let mut state = self.state.lock();
            let Some(map) = state.selected.clone() else {
                return Err(SelectionError::NoMapSelected);
            };
            let range = map.level_range();
            if !range.contains(level) {
                return Err(SelectionError::LevelOutOfRange { level, range });
            }
            self.apply_level(&mut state, &map, level);
        }
        tracing::debug!(level = %format_level(level), "Indoor level changed");
        if notify {
            self.events.emit_indoor(IndoorEvent::LevelChanged(level));
        }
        Ok(())
    }

    /// Recompute the map on stage from the current viewport and pool.
    ///
    /// Does nothing until the surface has loaded.
    pub fn refresh(&self) {
        if !self.surface.is_loaded() {
            tracing::trace!("Surface not loaded, skipping selection");
            return;
        }

        let mut pending = Vec::new();
        {
            let mut state = self.state.lock();
            let target = self.target(&state.maps);

            let unchanged = match (&state.selected, &target) {
                (Some(current), Some(next)) => current.id() == next.id(),
                (None, None) => true,
                _ => false,
            };
            if !unchanged {
                self.swap(&mut state, target, &mut pending);
            }
        }
        self.publish(pending);
    }

    fn target(&self, maps: &[Arc<IndoorMap>]) -> Option<Arc<IndoorMap>> {
        if !self.surface.is_loaded() {
            return None;
        }
        closest_map(maps, &self.surface.viewport(), self.config.min_zoom)
    }

    /// Take the current map off stage and put `target` on.
    fn swap(
        &self,
        state: &mut SelectionState,
        target: Option<Arc<IndoorMap>>,
        pending: &mut Vec<IndoorEvent>,
    ) {
        if let Some(previous) = state.selected.take() {
            self.deactivate(state, &previous);
            pending.push(IndoorEvent::MapUnloaded(previous));
        }

        if let Some(map) = target {
            self.activate(state, &map);
            pending.push(IndoorEvent::MapLoaded(map));
        }
    }

    fn deactivate(&self, state: &mut SelectionState, map: &IndoorMap) {
        for id in map.layers_to_hide() {
            self.surface_op("set_visibility", id, self.surface.set_visibility(id, Visibility::Visible));
        }
        for (id, _) in std::mem::take(&mut state.installed_filters) {
            self.surface_op("remove_layer", &id, self.surface.remove_layer(&id));
        }
        self.surface_op("remove_source", SOURCE_ID, self.surface.remove_source(SOURCE_ID));

        if let Some(level) = state.level.take() {
            state.last_levels.insert(map.id(), level);
        }
        tracing::info!(map = %map.id(), "Indoor map unloaded");
    }

    fn activate(&self, state: &mut SelectionState, map: &Arc<IndoorMap>) {
        let data = Arc::clone(map.geojson());
        if self.surface.add_source(SOURCE_ID, Arc::clone(&data)).is_err() {
            self.surface_op("set_source_data", SOURCE_ID, self.surface.set_source_data(SOURCE_ID, data));
        }

        for layer in map.layers() {
            match self.surface.add_layer(layer, map.before_layer_id()) {
                Ok(()) => {
                    let base = self.surface.filter(&layer.id).unwrap_or_else(Filter::always);
                    state.installed_filters.push((layer.id.clone(), base));
                }
                Err(e) => {
                    tracing::warn!(map = %map.id(), layer = %layer.id, error = %e, "Layer not installed");
                }
            }
        }

        for id in map.layers_to_hide() {
            self.surface_op("set_visibility", id, self.surface.set_visibility(id, Visibility::None));
        }

        let level = state
            .last_levels
            .get(&map.id())
            .copied()
            .unwrap_or_else(|| map.initial_level());
        state.selected = Some(Arc::clone(map));
        self.apply_level(state, map, level);

        tracing::info!(
            map = %map.id(),
            level = %format_level(level),
            layers = state.installed_filters.len(),
            "Indoor map loaded"
        );
    }

    fn apply_level(&self, state: &mut SelectionState, map: &IndoorMap, level: f64) {
        state.level = Some(level);
        let show_empty = map.show_features_with_empty_level();
        for (id, base) in &state.installed_filters {
            let live = filter_with_level(base, level, show_empty);
            self.surface_op("set_filter", id, self.surface.set_filter(id, live));
        }
    }

    fn surface_op(&self, op: &str, id: &str, result: Result<(), SurfaceError>) {
        if let Err(e) = result {
            tracing::warn!(op, id, error = %e, "Render surface rejected operation");
        }
    }

    fn publish(&self, pending: Vec<IndoorEvent>) {
        for event in pending {
            self.events.emit_indoor(event);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Worker
    // ─────────────────────────────────────────────────────────────────────

    /// Ask the run loop for a recompute pass.
    pub fn request_update(&self) {
        self.requested.fetch_add(1, Ordering::SeqCst);
        self.wakeup.notify_one();
    }

    /// Wait until every update requested so far has been processed.
    ///
    /// Only resolves while a run loop is active.
    pub async fn settled(&self) {
        let target = self.requested.load(Ordering::SeqCst);
        let mut completed = self.completed.subscribe();
        // Sender lives as long as self
        let _ = completed.wait_for(|done| *done >= target).await;
    }

    /// Spawn the run loop on the current runtime.
    ///
    /// The event subscription is taken before this returns, so no viewport
    /// change emitted afterwards is missed.
    pub fn spawn(self: &Arc<Self>, cancellation: CancellationToken) -> JoinHandle<()> {
        let events = self.events.subscribe_map();
        self.request_update();
        let selector = Arc::clone(self);
        tokio::spawn(async move { selector.run_with(events, cancellation).await })
    }

    /// Run the recompute loop until cancelled or the event bus closes.
    pub async fn run(self: Arc<Self>, cancellation: CancellationToken) {
        let events = self.events.subscribe_map();
        self.request_update();
        self.run_with(events, cancellation).await;
    }

    async fn run_with(
        self: Arc<Self>,
        mut events: broadcast::Receiver<MapEvent>,
        cancellation: CancellationToken,
    ) {
        tracing::info!(min_zoom = self.config.min_zoom, "Indoor selector started");

        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                _ = self.wakeup.notified() => {
                    let generation = self.requested.load(Ordering::SeqCst);
                    self.refresh();
                    self.completed.send_replace(generation);
                }

                event = events.recv() => match event {
                    Ok(MapEvent::Load) | Ok(MapEvent::MoveEnd) => self.request_update(),
                    Ok(MapEvent::Move) => {}
                    Err(RecvError::Lagged(n)) => {
                        tracing::trace!(skipped = n, "Selector lagged behind map events");
                        self.request_update();
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Map event channel closed");
                        break;
                    }
                },
            }
        }

        tracing::info!("Indoor selector stopped");
    }
}

impl<S> std::fmt::Debug for IndoorSelector<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("IndoorSelector")
            .field("maps", &state.maps.len())
            .field("selected", &state.selected.as_ref().map(|m| m.id()))
            .field("level", &state.level)
            .finish()
    }
}
