//! Indoormap - Indoor map selection and level filtering
//!
//! Given a pool of building datasets (GeoJSON with `level` tags), this library
//! decides which one belongs on screen for the current viewport, installs its
//! layers on a render surface with filters that show a single floor, and keeps
//! the pool in step with a remote catalog as the camera moves.
//!
//! # Architecture
//!
//! ```text
//!   camera events ──► EventBus ──► IndoorSelector ──► RenderSurface
//!                        │              ▲  (sources, layers, filters)
//!                        ▼              │
//!                 MapServerHandler ─────┘ register / unregister
//!                        │
//!                        ▼
//!                  CatalogClient (HTTP)
//! ```
//!
//! - [`level`] derives a dataset's level range and bounds from its features.
//! - [`filter`] builds the per-level layer filters.
//! - [`selector`] owns the active map and level and swaps maps atomically.
//! - [`catalog`] downloads datasets around the viewport.

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod events;
pub mod filter;
pub mod geo;
pub mod level;
pub mod logging;
pub mod selector;
pub mod style;
pub mod surface;

pub use dataset::{IndoorMap, IndoorMapOptions, MapId};
pub use events::{EventBus, IndoorEvent, MapEvent};
pub use selector::{IndoorSelector, SelectionError, SelectorConfig};
pub use surface::{MemorySurface, RenderSurface, Viewport};
