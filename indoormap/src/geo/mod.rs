//! Spherical geometry helpers.
//!
//! Provides great-circle distance, forward geodesic projection and
//! axis-aligned bounding-box tests on geographic coordinates. Used by the
//! selector (nearest-map choice) and by the catalog streamer (download region
//! sizing).
//!
//! # Limitations
//!
//! Bounds never wrap around the antimeridian. A box is always `min_lon..=max_lon`
//! with `min_lon <= max_lon`, so datasets straddling ±180° are not handled.

mod bounds;

pub use bounds::{bounds_overlap, GeoBounds};

use std::f64::consts::PI;

/// Mean Earth radius in meters (authalic radius).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees (positive north)
    pub lat: f64,
    /// Longitude in degrees (positive east)
    pub lon: f64,
}

impl GeoPoint {
    /// Create a new point from latitude and longitude in degrees.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

#[inline]
fn to_radians(degrees: f64) -> f64 {
    degrees / 180.0 * PI
}

#[inline]
fn to_degrees(radians: f64) -> f64 {
    radians * 180.0 / PI
}

/// Great-circle distance between two points in meters.
///
/// Uses the haversine formulation with `atan2` on the half-angle terms, which
/// stays accurate for both tiny and near-antipodal separations.
#[inline]
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = to_radians(a.lat);
    let lon1 = to_radians(a.lon);
    let lat2 = to_radians(b.lat);
    let lon2 = to_radians(b.lon);

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h marginally outside [0, 1]
    let h = h.clamp(0.0, 1.0);
    let angle = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * angle
}

/// Point reached by travelling `distance_m` meters from `start` along the
/// initial bearing `bearing_rad` (radians, clockwise from north).
#[inline]
pub fn destination_point(start: &GeoPoint, distance_m: f64, bearing_rad: f64) -> GeoPoint {
    let angular = distance_m / EARTH_RADIUS_M;
    let cos_d = angular.cos();
    let sin_d = angular.sin();

    let lat1 = to_radians(start.lat);
    let lon1 = to_radians(start.lon);

    let lat2 = (lat1.sin() * cos_d + lat1.cos() * sin_d * bearing_rad.cos()).asin();
    let lon2 = lon1
        + (bearing_rad.sin() * sin_d * lat1.cos()).atan2(cos_d - lat1.sin() * lat2.sin());

    GeoPoint::new(to_degrees(lat2), to_degrees(lon2))
}
