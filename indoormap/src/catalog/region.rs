//! Download region sizing.

use std::f64::consts::{PI, SQRT_2};

use crate::geo::{destination_point, distance, GeoBounds};
use crate::surface::Viewport;

/// Minimum half-side of a download region, in meters.
pub const DEFAULT_MIN_AREA_M: f64 = 1000.0;

/// Square region to download around `viewport`.
///
/// The half-side is twice the larger on-screen extent, floored at
/// `min_extent_m`. Corners are projected from the viewport center at
/// 45° and -135°, so the region keeps covering the screen while the camera
/// drifts.
///
/// At indoor zooms the screen is small enough for the north edge to stand in
/// for the east-west extent.
pub fn download_region(viewport: &Viewport, min_extent_m: f64) -> GeoBounds {
    let bounds = &viewport.bounds;
    let east_west = distance(&bounds.north_east(), &bounds.north_west());
    let north_south = distance(&bounds.north_east(), &bounds.south_east());

    let half_side = (east_west.max(north_south) * 2.0).max(min_extent_m);
    let half_diagonal = half_side * SQRT_2;

    let north_east = destination_point(&viewport.center, half_diagonal, PI / 4.0);
    let south_west = destination_point(&viewport.center, half_diagonal, -3.0 * PI / 4.0);
    GeoBounds::from_corners(south_west, north_east)
}

/// Whether `region` holds both the north-east and south-west corners of
/// `viewport`.
pub fn covers(region: &GeoBounds, viewport: &GeoBounds) -> bool {
    region.contains(&viewport.north_east()) && region.contains(&viewport.south_west())
}
