//! Nearest-map choice.

use std::sync::Arc;

use crate::dataset::IndoorMap;
use crate::geo::{bounds_overlap, distance};
use crate::surface::Viewport;

/// Pick the map that should be on stage for `viewport`.
///
/// Below `min_zoom` nothing is selected. Otherwise the candidates are the
/// maps whose bounds overlap the viewport; among several, the one whose
/// bounds center is nearest to the viewport center wins, the first in pool
/// order on ties.
pub fn closest_map(
    maps: &[Arc<IndoorMap>],
    viewport: &Viewport,
    min_zoom: f64,
) -> Option<Arc<IndoorMap>> {
    if viewport.zoom < min_zoom {
        return None;
    }

    let camera_center = viewport.bounds.center();
    let mut closest: Option<(&Arc<IndoorMap>, f64)> = None;

    for map in maps.iter().filter(|m| bounds_overlap(m.bounds(), &viewport.bounds)) {
        let d = distance(&map.bounds().center(), &camera_center);
        match closest {
            Some((_, best)) if d >= best => {}
            _ => closest = Some((map, d)),
        }
    }

    closest.map(|(map, _)| Arc::clone(map))
}
