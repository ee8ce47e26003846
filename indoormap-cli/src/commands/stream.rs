//! Stream command - run one catalog cycle against a headless map.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use indoormap::catalog::{HttpCatalogClient, MapServerHandler, SyncOutcome};
use indoormap::geo::GeoPoint;
use indoormap::level::format_level;
use indoormap::{EventBus, IndoorSelector, MemorySurface, Viewport};
use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Default half-span of the viewport in meters.
pub const DEFAULT_SPAN_M: f64 = 150.0;

/// How long to wait for the selector after the cycle.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Arguments for the stream command.
pub struct StreamArgs {
    pub lat: f64,
    pub lon: f64,
    pub zoom: f64,
    pub span_m: f64,
    pub server: Option<String>,
}

/// Run the stream command.
pub fn run(config_path: Option<&Path>, args: StreamArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("stream");
    let config = runner.config();

    // CLI takes precedence, then config
    let server = args
        .server
        .or_else(|| config.catalog.server_url.clone())
        .ok_or_else(|| {
            CliError::Config(
                "No catalog server. Set server_url in the [catalog] section or use --server"
                    .to_string(),
            )
        })?;
    let client = HttpCatalogClient::with_timeout(&server, config.catalog.timeout_secs)?;
    let options = config.dataset.to_options()?;

    let viewport = Viewport::around(GeoPoint::new(args.lat, args.lon), args.zoom, args.span_m);
    println!("Viewport: {} at zoom {}", viewport.bounds, args.zoom);
    println!("Catalog:  {}", client.server_url());
    println!();

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    runtime.block_on(async {
        let events = Arc::new(EventBus::new());
        let surface = Arc::new(MemorySurface::new(viewport).with_events(Arc::clone(&events)));
        surface.mark_loaded();
        let selector = IndoorSelector::new(surface, events, config.selector.clone());
        let handler = MapServerHandler::new(
            client,
            Arc::clone(&selector),
            options,
            config.catalog.streamer.clone(),
        );

        let cancellation = CancellationToken::new();
        let worker = selector.spawn(cancellation.clone());
        let outcome = handler.load_maps_if_necessary().await;

        if tokio::time::timeout(SETTLE_TIMEOUT, selector.settled()).await.is_err() {
            tracing::warn!("Selector did not settle in time");
        }
        cancellation.cancel();
        let _ = worker.await;

        match outcome? {
            SyncOutcome::BelowMinZoom => {
                println!(
                    "Zoom {} is below the download threshold ({})",
                    args.zoom, config.catalog.streamer.min_zoom
                );
            }
            SyncOutcome::AlreadyCovered => println!("Viewport already covered"),
            SyncOutcome::Synced(report) => {
                println!("Downloaded region: {}", report.bounds);
                println!("  Added:    {}", report.added.len());
                for path in &report.added {
                    println!("    {}", path);
                }
                if !report.rejected.is_empty() {
                    println!("  Rejected: {}", report.rejected.len());
                    for path in &report.rejected {
                        println!("    {}", path);
                    }
                }
            }
        }
        println!();

        let held = handler.downloaded();
        match (selector.selected_map(), selector.level()) {
            (Some(map), Some(level)) => {
                let path = held
                    .iter()
                    .find(|remote| remote.map.id() == map.id())
                    .map(|remote| remote.entry.path.as_str())
                    .unwrap_or("?");
                let range = map.level_range();
                println!("Selected: {} ({})", path, map.id());
                println!(
                    "  Level {} of {} to {}",
                    format_level(level),
                    format_level(range.min),
                    format_level(range.max)
                );
            }
            _ => println!("Selected: none"),
        }

        Ok::<(), CliError>(())
    })
}
