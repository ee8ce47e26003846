//! Axis-aligned geographic bounding boxes.

use super::GeoPoint;

/// Geographic bounding box in degrees.
///
/// Represents the minimum rectangle enclosing a dataset, a viewport or a
/// download region. Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    /// Minimum (southernmost) latitude
    pub min_lat: f64,
    /// Maximum (northernmost) latitude
    pub max_lat: f64,
    /// Minimum (westernmost) longitude
    pub min_lon: f64,
    /// Maximum (easternmost) longitude
    pub max_lon: f64,
}

impl GeoBounds {
    /// Create a new bounding box.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Create a bounding box from a single point.
    pub fn from_point(point: GeoPoint) -> Self {
        Self::new(point.lat, point.lat, point.lon, point.lon)
    }

    /// Create a bounding box from its south-west and north-east corners.
    pub fn from_corners(south_west: GeoPoint, north_east: GeoPoint) -> Self {
        let mut bounds = Self::from_point(south_west);
        bounds.expand(north_east);
        bounds
    }

    /// Expand this bounding box to include a point.
    pub fn expand(&mut self, point: GeoPoint) {
        self.min_lat = self.min_lat.min(point.lat);
        self.max_lat = self.max_lat.max(point.lat);
        self.min_lon = self.min_lon.min(point.lon);
        self.max_lon = self.max_lon.max(point.lon);
    }

    pub fn west(&self) -> f64 {
        self.min_lon
    }

    pub fn east(&self) -> f64 {
        self.max_lon
    }

    pub fn south(&self) -> f64 {
        self.min_lat
    }

    pub fn north(&self) -> f64 {
        self.max_lat
    }

    pub fn north_east(&self) -> GeoPoint {
        GeoPoint::new(self.max_lat, self.max_lon)
    }

    pub fn north_west(&self) -> GeoPoint {
        GeoPoint::new(self.max_lat, self.min_lon)
    }

    pub fn south_east(&self) -> GeoPoint {
        GeoPoint::new(self.min_lat, self.max_lon)
    }

    pub fn south_west(&self) -> GeoPoint {
        GeoPoint::new(self.min_lat, self.min_lon)
    }

    /// Get the center point of the bounds.
    ///
    /// This is the plain midpoint in degrees, used as the centroid for
    /// nearest-map selection.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Get the width of the bounds in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Get the height of the bounds in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Whether the point lies inside or on the edge of the bounds.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }

    /// Whether `other` lies entirely inside these bounds.
    pub fn contains_bounds(&self, other: &GeoBounds) -> bool {
        self.contains(&other.north_east()) && self.contains(&other.south_west())
    }

    /// Whether the two boxes share at least one point.
    pub fn overlaps(&self, other: &GeoBounds) -> bool {
        bounds_overlap(self, other)
    }
}

impl std::fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.6},{:.6},{:.6},{:.6}]",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Two rectangles overlap unless one lies strictly west/east or strictly
/// north/south of the other. Touching edges count as overlapping.
pub fn bounds_overlap(a: &GeoBounds, b: &GeoBounds) -> bool {
    if a.west() > b.east() || b.west() > a.east() {
        return false;
    }
    if a.north() < b.south() || b.north() < a.south() {
        return false;
    }
    true
}
