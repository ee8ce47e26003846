//! Viewport-driven catalog synchronization.

use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::region::{covers, download_region, DEFAULT_MIN_AREA_M};
use super::{CatalogClient, CatalogEntry, CatalogError};
use crate::dataset::{IndoorMap, IndoorMapOptions};
use crate::events::MapEvent;
use crate::geo::GeoBounds;
use crate::selector::IndoorSelector;
use crate::surface::RenderSurface;

/// Zoom below which the catalog is not queried.
pub const DEFAULT_MIN_ZOOM_TO_DOWNLOAD: f64 = 17.0;

/// Streamer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamerConfig {
    pub min_zoom: f64,
    /// Minimum half-side of the download region in meters.
    pub min_area_m: f64,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM_TO_DOWNLOAD,
            min_area_m: DEFAULT_MIN_AREA_M,
        }
    }
}

impl StreamerConfig {
    pub fn with_min_zoom(mut self, min_zoom: f64) -> Self {
        self.min_zoom = min_zoom;
        self
    }

    pub fn with_min_area_m(mut self, min_area_m: f64) -> Self {
        self.min_area_m = min_area_m;
        self
    }
}

/// A catalog entry and the dataset built from its payload.
#[derive(Debug, Clone)]
pub struct RemoteMap {
    pub entry: CatalogEntry,
    pub map: Arc<IndoorMap>,
}

/// What one synchronization cycle changed.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Region the listing was requested for.
    pub bounds: GeoBounds,
    /// Paths registered with the selector.
    pub added: Vec<String>,
    /// Paths unregistered from the selector.
    pub removed: Vec<String>,
    /// Paths whose payload could not be turned into a dataset.
    pub rejected: Vec<String>,
}

/// Result of [`MapServerHandler::load_maps_if_necessary`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The camera is zoomed out too far for indoor maps.
    BelowMinZoom,
    /// The last downloaded region still covers the viewport.
    AlreadyCovered,
    Synced(SyncReport),
}

#[derive(Debug, Default)]
struct StreamState {
    downloaded: Vec<RemoteMap>,
    downloaded_bounds: Option<GeoBounds>,
    listings: u64,
}

/// Keeps the selector's pool in step with a remote catalog.
///
/// Cycles are chained: a check waits for the cycle in flight to finish
/// before deciding whether it needs one of its own. A failed cycle changes
/// nothing; the next camera move tries again.
pub struct MapServerHandler<C, S> {
    client: C,
    selector: Arc<IndoorSelector<S>>,
    options: IndoorMapOptions,
    config: StreamerConfig,
    chain: tokio::sync::Mutex<()>,
    state: Mutex<StreamState>,
}

impl<C, S> MapServerHandler<C, S>
where
    C: CatalogClient + 'static,
    S: RenderSurface + 'static,
{
    pub fn new(
        client: C,
        selector: Arc<IndoorSelector<S>>,
        options: IndoorMapOptions,
        config: StreamerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            selector,
            options,
            config,
            chain: tokio::sync::Mutex::new(()),
            state: Mutex::new(StreamState::default()),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn selector(&self) -> &Arc<IndoorSelector<S>> {
        &self.selector
    }

    /// Region covered by the last successful cycle.
    pub fn downloaded_bounds(&self) -> Option<GeoBounds> {
        self.state.lock().downloaded_bounds
    }

    /// Maps currently held, in download order.
    pub fn downloaded(&self) -> Vec<RemoteMap> {
        self.state.lock().downloaded.clone()
    }

    /// Number of catalog listings requested so far.
    pub fn listing_count(&self) -> u64 {
        self.state.lock().listings
    }

    /// Run a synchronization cycle unless the viewport is zoomed out or
    /// still inside the last downloaded region.
    ///
    /// # Errors
    ///
    /// Returns the catalog error that aborted the cycle. Nothing is
    /// registered, unregistered or recorded in that case.
    pub async fn load_maps_if_necessary(&self) -> Result<SyncOutcome, CatalogError> {
        let surface = self.selector.surface();
        if surface.viewport().zoom < self.config.min_zoom {
            return Ok(SyncOutcome::BelowMinZoom);
        }

        let _chain = self.chain.lock().await;

        // The camera may have moved while waiting for the previous cycle
        let viewport = surface.viewport();
        if viewport.zoom < self.config.min_zoom {
            return Ok(SyncOutcome::BelowMinZoom);
        }
        let covered = self.state.lock().downloaded_bounds;
        if covered.is_some_and(|region| covers(&region, &viewport.bounds)) {
            return Ok(SyncOutcome::AlreadyCovered);
        }

        let region = download_region(&viewport, self.config.min_area_m);
        self.sync_region(region).await.map(SyncOutcome::Synced)
    }

    async fn sync_region(&self, region: GeoBounds) -> Result<SyncReport, CatalogError> {
        self.state.lock().listings += 1;
        let listing = self.client.maps_in_bounds(&region).await?;

        let (to_add, to_remove) = {
            let state = self.state.lock();
            let to_remove: Vec<RemoteMap> = state
                .downloaded
                .iter()
                .filter(|held| !listing.iter().any(|e| e.path == held.entry.path))
                .cloned()
                .collect();
            let mut to_add: Vec<CatalogEntry> = Vec::new();
            for entry in listing {
                let held = state.downloaded.iter().any(|d| d.entry.path == entry.path);
                if !held && !to_add.iter().any(|e| e.path == entry.path) {
                    to_add.push(entry);
                }
            }
            (to_add, to_remove)
        };

        let payloads = try_join_all(to_add.iter().map(|entry| self.client.fetch_map(entry))).await?;

        let mut added = Vec::new();
        let mut rejected = Vec::new();
        for (entry, geojson) in to_add.into_iter().zip(payloads) {
            match IndoorMap::from_geojson(geojson, &self.options) {
                Ok(map) => added.push(RemoteMap {
                    entry,
                    map: Arc::new(map),
                }),
                Err(e) => {
                    tracing::warn!(path = %entry.path, error = %e, "Catalog map rejected");
                    rejected.push(entry.path);
                }
            }
        }

        for remote in &added {
            self.selector.register(Arc::clone(&remote.map));
        }
        for remote in &to_remove {
            self.selector.unregister(remote.map.id());
        }

        let removed: Vec<String> = to_remove.into_iter().map(|r| r.entry.path).collect();
        let added_paths: Vec<String> = added.iter().map(|r| r.entry.path.clone()).collect();
        {
            let mut state = self.state.lock();
            state.downloaded.retain(|d| !removed.contains(&d.entry.path));
            state.downloaded.extend(added);
            state.downloaded_bounds = Some(region);
        }

        tracing::debug!(
            region = %region,
            added = added_paths.len(),
            removed = removed.len(),
            rejected = rejected.len(),
            "Catalog synchronized"
        );

        Ok(SyncReport {
            bounds: region,
            added: added_paths,
            removed,
            rejected,
        })
    }

    async fn check(&self) {
        if let Err(e) = self.load_maps_if_necessary().await {
            tracing::warn!(error = %e, "Catalog synchronization failed");
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Worker
    // ─────────────────────────────────────────────────────────────────────

    /// Spawn the streaming loop on the current runtime.
    pub fn spawn(self: &Arc<Self>, cancellation: CancellationToken) -> JoinHandle<()> {
        let events = self.selector.events().subscribe_map();
        let handler = Arc::clone(self);
        tokio::spawn(async move { handler.run_with(events, cancellation).await })
    }

    /// Check on every `load` and `move` until cancelled.
    ///
    /// Also checks once on start when the surface has already loaded.
    pub async fn run(self: Arc<Self>, cancellation: CancellationToken) {
        let events = self.selector.events().subscribe_map();
        self.run_with(events, cancellation).await;
    }

    async fn run_with(
        self: Arc<Self>,
        mut events: broadcast::Receiver<MapEvent>,
        cancellation: CancellationToken,
    ) {
        tracing::info!(
            min_zoom = self.config.min_zoom,
            min_area_m = self.config.min_area_m,
            "Catalog streamer started"
        );

        if self.selector.surface().is_loaded() {
            self.check().await;
        }

        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                event = events.recv() => match event {
                    Ok(MapEvent::Load) | Ok(MapEvent::Move) => self.check().await,
                    Ok(MapEvent::MoveEnd) => {}
                    Err(RecvError::Lagged(n)) => {
                        tracing::trace!(skipped = n, "Streamer lagged behind map events");
                        self.check().await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Map event channel closed");
                        break;
                    }
                },
            }
        }

        tracing::info!("Catalog streamer stopped");
    }
}

impl<C, S> std::fmt::Debug for MapServerHandler<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MapServerHandler")
            .field("downloaded", &state.downloaded.len())
            .field("downloaded_bounds", &state.downloaded_bounds)
            .field("listings", &state.listings)
            .finish()
    }
}
