//! Notification bus shared by the render surface, the selector and the
//! catalog streamer.
//!
//! Two broadcast channels:
//!
//! - [`MapEvent`]: emitted by the render surface (`load`, `move`, `moveend`),
//!   consumed by the selector and the streamer run loops.
//! - [`IndoorEvent`]: emitted by the selector (`indoor.map.loaded`,
//!   `indoor.map.unloaded`, `indoor.level.changed`), consumed by UI
//!   collaborators such as a floor picker.
//!
//! Emitting never blocks and never fails; events sent while nobody is
//! subscribed are dropped. Slow subscribers observe
//! [`RecvError::Lagged`](tokio::sync::broadcast::error::RecvError::Lagged)
//! and should re-read current state.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::dataset::IndoorMap;

/// Default capacity of each broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Viewport lifecycle notifications from the render surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    /// The surface finished loading its style.
    Load,
    /// The camera moved (fired continuously while panning).
    Move,
    /// The camera came to rest.
    MoveEnd,
}

impl MapEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MapEvent::Load => "load",
            MapEvent::Move => "move",
            MapEvent::MoveEnd => "moveend",
        }
    }
}

/// Notifications published by the selector.
#[derive(Debug, Clone)]
pub enum IndoorEvent {
    /// A dataset was put on stage.
    MapLoaded(Arc<IndoorMap>),
    /// The active dataset was taken off stage.
    MapUnloaded(Arc<IndoorMap>),
    /// The active level changed through a user-facing level change.
    LevelChanged(f64),
}

impl IndoorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            IndoorEvent::MapLoaded(_) => "indoor.map.loaded",
            IndoorEvent::MapUnloaded(_) => "indoor.map.unloaded",
            IndoorEvent::LevelChanged(_) => "indoor.level.changed",
        }
    }
}

/// Broadcast hub for [`MapEvent`]s and [`IndoorEvent`]s.
#[derive(Debug)]
pub struct EventBus {
    map_tx: broadcast::Sender<MapEvent>,
    indoor_tx: broadcast::Sender<IndoorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (map_tx, _) = broadcast::channel(capacity);
        let (indoor_tx, _) = broadcast::channel(capacity);
        Self { map_tx, indoor_tx }
    }

    pub fn emit_map(&self, event: MapEvent) {
        tracing::trace!(event = event.name(), "map event");
        // No subscribers is not an error
        let _ = self.map_tx.send(event);
    }

    pub fn emit_indoor(&self, event: IndoorEvent) {
        tracing::trace!(event = event.name(), "indoor event");
        let _ = self.indoor_tx.send(event);
    }

    pub fn subscribe_map(&self) -> broadcast::Receiver<MapEvent> {
        self.map_tx.subscribe()
    }

    pub fn subscribe_indoor(&self) -> broadcast::Receiver<IndoorEvent> {
        self.indoor_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
