//! Integration tests for map selection and catalog streaming.
//!
//! These tests drive the complete flow over the headless surface:
//! - camera events → selector → layers, filters and source on the surface
//! - catalog listing → streamer → selector pool
//! - bursts of camera changes collapsing into a consistent end state
//!
//! Run with: `cargo test --test selection_integration`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use geojson::GeoJson;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use indoormap::catalog::{
    CatalogClient, CatalogEntry, CatalogError, MapServerHandler, StreamerConfig, SyncOutcome,
};
use indoormap::events::{EventBus, IndoorEvent};
use indoormap::geo::{GeoBounds, GeoPoint};
use indoormap::style::{LayerSpec, LayerType, SOURCE_ID};
use indoormap::{IndoorMap, IndoorMapOptions, IndoorSelector, MemorySurface, SelectorConfig, Viewport};

// ============================================================================
// Helper Functions
// ============================================================================

/// Gare de Lyon, Paris.
const A: GeoPoint = GeoPoint { lat: 48.8443, lon: 2.3744 };

/// About 450 m north of A.
const B: GeoPoint = GeoPoint { lat: 48.8483, lon: 2.3744 };

const ROOMS: &str = "rooms";

/// A square building around `center` with one room per level tag.
fn building(center: GeoPoint, levels: &[&str]) -> GeoJson {
    let d = 0.0005;
    let (lat, lon) = (center.lat, center.lon);
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
    GeoJson::from_json_value(json!({ "type": "FeatureCollection", "features": features })).unwrap()
}

fn options() -> IndoorMapOptions {
    IndoorMapOptions::default()
        .with_layers(vec![LayerSpec::new(ROOMS, LayerType::Fill)])
        .with_layers_to_hide(["building"])
}

fn dataset(center: GeoPoint, levels: &[&str]) -> Arc<IndoorMap> {
    Arc::new(IndoorMap::from_geojson(building(center, levels), &options()).unwrap())
}

fn view(center: GeoPoint, zoom: f64) -> Viewport {
    Viewport::around(center, zoom, 80.0)
}

struct Harness {
    events: Arc<EventBus>,
    surface: Arc<MemorySurface>,
    selector: Arc<IndoorSelector<MemorySurface>>,
    cancellation: CancellationToken,
}

impl Harness {
    fn new(start: Viewport) -> Self {
        let events = Arc::new(EventBus::new());
        let surface = Arc::new(MemorySurface::new(start).with_events(Arc::clone(&events)));
        surface
            .add_external_layer(LayerSpec::new("building", LayerType::Fill).with_source("base"))
            .unwrap();
        surface
            .add_external_layer(LayerSpec::new("road-label", LayerType::Symbol).with_source("base"))
            .unwrap();
        let selector = IndoorSelector::new(
            Arc::clone(&surface),
            Arc::clone(&events),
            SelectorConfig::default(),
        );
        Self {
            events,
            surface,
            selector,
            cancellation: CancellationToken::new(),
        }
    }

    /// Move the camera and wait for the selector to catch up.
    async fn move_to(&self, viewport: Viewport) {
        self.surface.move_to(viewport);
        self.settle().await;
    }

    async fn settle(&self) {
        self.selector.request_update();
        tokio::time::timeout(Duration::from_secs(5), self.selector.settled())
            .await
            .expect("selector did not settle");
    }

    fn room_levels(&self) -> Vec<String> {
        self.surface
            .rendered_features(ROOMS)
            .iter()
            .filter_map(|f| f.property("level").and_then(|v| v.as_str()).map(String::from))
            .collect()
    }

    fn count_layer(&self, id: &str) -> usize {
        self.surface.layer_ids().iter().filter(|l| l.as_str() == id).count()
    }
}

fn drain(rx: &mut broadcast::Receiver<IndoorEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    names
}

// ============================================================================
// Selection
// ============================================================================

/// The map under the camera goes on stage once the surface loads.
#[tokio::test]
async fn test_load_gate_then_selection() {
    let harness = Harness::new(view(A, 18.0));
    let a = dataset(A, &["0", "1", "2"]);
    harness.selector.register(Arc::clone(&a));
    let worker = harness.selector.spawn(harness.cancellation.clone());

    harness.settle().await;
    assert!(harness.selector.selected_map().is_none(), "nothing before load");

    harness.surface.mark_loaded();
    harness.settle().await;

    assert_eq!(harness.selector.selected_map().map(|m| m.id()), Some(a.id()));
    assert_eq!(harness.selector.level(), Some(0.0));
    assert!(harness.surface.has_source(SOURCE_ID));
    assert_eq!(harness.room_levels(), vec!["0"]);
    assert_eq!(
        harness.surface.visibility("building"),
        Some(indoormap::surface::Visibility::None)
    );

    harness.cancellation.cancel();
    worker.await.unwrap();
}

/// Changing level re-filters the installed layers and notifies listeners.
#[tokio::test]
async fn test_level_change_refilters_layers() {
    let harness = Harness::new(view(A, 18.0));
    harness.surface.mark_loaded();
    harness.selector.register(dataset(A, &["0", "1;2", "3"]));
    let worker = harness.selector.spawn(harness.cancellation.clone());
    harness.settle().await;

    let mut rx = harness.events.subscribe_indoor();
    harness.selector.set_level(2.0).unwrap();

    assert_eq!(harness.room_levels(), vec!["1;2"]);
    assert_eq!(drain(&mut rx), vec!["indoor.level.changed"]);

    assert!(harness.selector.set_level(7.0).is_err());
    assert_eq!(harness.selector.level(), Some(2.0));

    harness.selector.set_level_without_event(3.0).unwrap();
    assert_eq!(harness.room_levels(), vec!["3"]);
    assert!(drain(&mut rx).is_empty());

    harness.cancellation.cancel();
    worker.await.unwrap();
}

/// Panning from one building to the next unloads the first before loading
/// the second, and each map comes back at the level it was left at.
#[tokio::test]
async fn test_pan_between_buildings() {
    let harness = Harness::new(view(A, 18.0));
    harness.surface.mark_loaded();
    let a = dataset(A, &["0", "1", "2", "3"]);
    let b = dataset(B, &["0", "1"]);
    harness.selector.register(Arc::clone(&a));
    harness.selector.register(Arc::clone(&b));
    let worker = harness.selector.spawn(harness.cancellation.clone());
    harness.settle().await;
    harness.selector.set_level(3.0).unwrap();

    let mut rx = harness.events.subscribe_indoor();
    harness.move_to(view(B, 18.0)).await;

    assert_eq!(harness.selector.selected_map().map(|m| m.id()), Some(b.id()));
    assert_eq!(harness.selector.level(), Some(0.0));
    assert_eq!(drain(&mut rx), vec!["indoor.map.unloaded", "indoor.map.loaded"]);
    assert_eq!(harness.count_layer(ROOMS), 1);

    harness.move_to(view(A, 18.0)).await;
    assert_eq!(harness.selector.selected_map().map(|m| m.id()), Some(a.id()));
    assert_eq!(harness.selector.level(), Some(3.0));
    assert_eq!(harness.room_levels(), vec!["3"]);

    harness.cancellation.cancel();
    worker.await.unwrap();
}

/// Zooming out takes everything off the surface and restores hidden layers.
#[tokio::test]
async fn test_zoom_out_goes_idle() {
    let harness = Harness::new(view(A, 18.0));
    harness.surface.mark_loaded();
    harness.selector.register(dataset(A, &["0"]));
    let worker = harness.selector.spawn(harness.cancellation.clone());
    harness.settle().await;
    assert!(harness.selector.selected_map().is_some());

    harness.move_to(view(A, 15.0)).await;

    assert!(harness.selector.selected_map().is_none());
    assert_eq!(harness.selector.level(), None);
    assert!(!harness.surface.has_source(SOURCE_ID));
    assert_eq!(harness.count_layer(ROOMS), 0);
    assert_eq!(
        harness.surface.visibility("building"),
        Some(indoormap::surface::Visibility::Visible)
    );
    assert_eq!(harness.surface.layer_ids(), vec!["building", "road-label"]);

    harness.cancellation.cancel();
    worker.await.unwrap();
}

/// A burst of camera changes never leaves duplicate layers behind and ends
/// on the map under the final camera position.
#[tokio::test]
async fn test_camera_burst_is_consistent() {
    let harness = Harness::new(view(A, 18.0));
    harness.surface.mark_loaded();
    let a = dataset(A, &["0", "1"]);
    let b = dataset(B, &["0", "1"]);
    harness.selector.register(Arc::clone(&a));
    harness.selector.register(Arc::clone(&b));
    let worker = harness.selector.spawn(harness.cancellation.clone());

    for i in 0..200 {
        let center = if i % 2 == 0 { A } else { B };
        let zoom = if i % 7 == 0 { 16.0 } else { 18.0 };
        harness.surface.move_to(view(center, zoom));
        if i % 10 == 0 {
            tokio::task::yield_now().await;
        }
    }
    harness.surface.move_to(view(B, 18.0));
    harness.settle().await;

    assert_eq!(harness.selector.selected_map().map(|m| m.id()), Some(b.id()));
    assert_eq!(harness.count_layer(ROOMS), 1);
    assert!(harness.surface.has_source(SOURCE_ID));
    assert_eq!(harness.room_levels(), vec!["0"]);

    harness.cancellation.cancel();
    worker.await.unwrap();
}

/// Removing the map on stage swaps to the next closest map immediately.
#[tokio::test]
async fn test_unregister_active_map() {
    let harness = Harness::new(view(A, 18.0));
    harness.surface.mark_loaded();
    let a = dataset(A, &["0"]);
    let nearby = dataset(GeoPoint::new(A.lat + 0.0006, A.lon), &["4"]);
    harness.selector.register(Arc::clone(&a));
    harness.selector.register(Arc::clone(&nearby));
    let worker = harness.selector.spawn(harness.cancellation.clone());
    harness.settle().await;
    assert_eq!(harness.selector.selected_map().map(|m| m.id()), Some(a.id()));

    assert!(harness.selector.unregister(a.id()));

    assert_eq!(harness.selector.selected_map().map(|m| m.id()), Some(nearby.id()));
    assert_eq!(harness.selector.level(), Some(4.0));
    assert_eq!(harness.room_levels(), vec!["4"]);
    assert_eq!(harness.count_layer(ROOMS), 1);

    harness.cancellation.cancel();
    worker.await.unwrap();
}

// ============================================================================
// Streaming
// ============================================================================

/// Catalog serving fixed buildings around A and B.
struct FixtureCatalog {
    payloads: HashMap<String, GeoJson>,
    listing: Mutex<Vec<String>>,
    fetches: Mutex<usize>,
}

impl FixtureCatalog {
    fn new() -> Self {
        let mut payloads = HashMap::new();
        payloads.insert("/a.geojson".to_string(), building(A, &["0", "1"]));
        payloads.insert("/b.geojson".to_string(), building(B, &["-1", "0"]));
        Self {
            payloads,
            listing: Mutex::new(vec!["/a.geojson".to_string(), "/b.geojson".to_string()]),
            fetches: Mutex::new(0),
        }
    }
}

impl CatalogClient for FixtureCatalog {
    async fn maps_in_bounds(&self, _bounds: &GeoBounds) -> Result<Vec<CatalogEntry>, CatalogError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(self.listing.lock().iter().map(CatalogEntry::new).collect())
    }

    async fn fetch_map(&self, entry: &CatalogEntry) -> Result<GeoJson, CatalogError> {
        *self.fetches.lock() += 1;
        self.payloads.get(&entry.path).cloned().ok_or_else(|| CatalogError::Status {
            url: entry.path.clone(),
            status: 404,
        })
    }
}

/// The streamer fills the pool and the selector picks the map on screen.
#[tokio::test]
async fn test_streamed_maps_reach_the_surface() {
    let harness = Harness::new(view(A, 18.0));
    harness.surface.mark_loaded();
    let handler = MapServerHandler::new(
        FixtureCatalog::new(),
        Arc::clone(&harness.selector),
        options(),
        StreamerConfig::default(),
    );
    let selector_worker = harness.selector.spawn(harness.cancellation.clone());

    let outcome = handler.load_maps_if_necessary().await.unwrap();
    let SyncOutcome::Synced(report) = outcome else {
        panic!("expected a sync, got {:?}", outcome);
    };
    assert_eq!(report.added.len(), 2);
    harness.settle().await;

    let selected = harness.selector.selected_map().unwrap();
    assert!((selected.bounds().center().lat - A.lat).abs() < 1e-9);
    assert_eq!(harness.room_levels(), vec!["0"]);

    // B is inside the downloaded region
    harness.move_to(view(B, 18.0)).await;
    assert_eq!(
        handler.load_maps_if_necessary().await.unwrap(),
        SyncOutcome::AlreadyCovered
    );
    assert_eq!(handler.listing_count(), 1);
    assert_eq!(harness.selector.level(), Some(0.0));

    harness.cancellation.cancel();
    selector_worker.await.unwrap();
}

/// Checks racing on one viewport result in a single catalog listing.
#[tokio::test]
async fn test_concurrent_checks_share_one_listing() {
    let harness = Harness::new(view(A, 18.0));
    harness.surface.mark_loaded();
    let handler = MapServerHandler::new(
        FixtureCatalog::new(),
        Arc::clone(&harness.selector),
        options(),
        StreamerConfig::default(),
    );

    let checks = (0..8).map(|_| handler.load_maps_if_necessary());
    let outcomes = futures::future::join_all(checks).await;

    let synced = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(SyncOutcome::Synced(_))))
        .count();
    assert_eq!(synced, 1);
    assert_eq!(handler.listing_count(), 1);
    assert_eq!(harness.selector.maps().len(), 2);
    assert_eq!(*handler.client().fetches.lock(), 2);
}

/// The streamer's run loop reacts to camera moves out of the region.
#[tokio::test]
async fn test_streamer_follows_camera() {
    let harness = Harness::new(view(A, 18.0));
    harness.surface.mark_loaded();
    let catalog = FixtureCatalog::new();
    *catalog.listing.lock() = vec!["/a.geojson".to_string()];
    let handler = MapServerHandler::new(
        catalog,
        Arc::clone(&harness.selector),
        options(),
        StreamerConfig::default(),
    );
    let selector_worker = harness.selector.spawn(harness.cancellation.clone());
    let streamer_worker = handler.spawn(harness.cancellation.clone());

    tokio::time::timeout(Duration::from_secs(5), async {
        while handler.listing_count() < 1 || harness.selector.maps().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // 20 km away: the next listing no longer has A
    *handler.client().listing.lock() = Vec::new();
    harness.surface.move_to(view(GeoPoint::new(A.lat + 0.18, A.lon), 18.0));

    tokio::time::timeout(Duration::from_secs(5), async {
        while !harness.selector.maps().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    harness.settle().await;
    assert!(harness.selector.selected_map().is_none());
    assert!(handler.downloaded().is_empty());
    assert_eq!(handler.listing_count(), 2);

    harness.cancellation.cancel();
    selector_worker.await.unwrap();
    streamer_worker.await.unwrap();
}
