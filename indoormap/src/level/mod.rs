//! Level tag parsing and dataset extent extraction.
//!
//! Indoor features carry an optional string `level` property. It is either a
//! single number (`"2"`, `"-1"`, `"0.5"`) or a span of two numbers separated
//! by a semicolon (`"0;3"`), meaning the feature belongs to every level in the
//! inclusive range. Anything else is treated as untagged.
//!
//! This tag format is the one piece of wire compatibility the crate must keep
//! exactly: it is read both here and by the level filter in [`crate::filter`].

use geojson::{Feature, GeoJson, Geometry, Value};
use thiserror::Error;

use crate::geo::{GeoBounds, GeoPoint};

/// Name of the per-feature level property.
pub const LEVEL_PROPERTY: &str = "level";

/// Separator between the two ends of a level span.
pub const LEVEL_SEPARATOR: char = ';';

/// Errors raised while deriving a dataset's extent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// Not a single feature carries a parseable level tag.
    #[error("No level found")]
    NoLevelFound,

    /// The dataset has no coordinates to compute bounds from.
    #[error("Dataset has no coordinates")]
    EmptyGeometry,
}

/// Inclusive range of levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelRange {
    pub min: f64,
    pub max: f64,
}

impl LevelRange {
    /// Create a range from two ends given in any order.
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Whether `level` lies in the range, ends included.
    pub fn contains(&self, level: f64) -> bool {
        (self.min..=self.max).contains(&level)
    }

    /// Clamp `level` into the range.
    pub fn clamp(&self, level: f64) -> f64 {
        level.min(self.max).max(self.min)
    }

    /// Levels in the range, stepping by one from `min`.
    ///
    /// Used by floor pickers to lay out one entry per level.
    pub fn levels(&self) -> impl Iterator<Item = f64> {
        let min = self.min;
        let count = (self.max - self.min).floor() as usize + 1;
        (0..count).map(move |i| min + i as f64)
    }
}

impl std::fmt::Display for LevelRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", format_level(self.min), format_level(self.max))
    }
}

/// Level carried by a single feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureLevel {
    /// Feature sits on one level.
    Single(f64),
    /// Feature spans several levels (stairs, elevators, atriums).
    Range(LevelRange),
}

impl FeatureLevel {
    pub fn min(&self) -> f64 {
        match self {
            FeatureLevel::Single(level) => *level,
            FeatureLevel::Range(range) => range.min,
        }
    }

    pub fn max(&self) -> f64 {
        match self {
            FeatureLevel::Single(level) => *level,
            FeatureLevel::Range(range) => range.max,
        }
    }

    /// Whether the feature should be visible when `level` is active.
    pub fn includes(&self, level: f64) -> bool {
        match self {
            FeatureLevel::Single(value) => *value == level,
            FeatureLevel::Range(range) => range.contains(level),
        }
    }
}

/// Parse a raw level tag.
///
/// Returns `None` for malformed tags, for non-finite values and for tags with
/// more than one separator.
pub fn parse_level_tag(tag: &str) -> Option<FeatureLevel> {
    let mut parts = tag.split(LEVEL_SEPARATOR);
    let first = parts.next()?;

    match (parts.next(), parts.next()) {
        (None, _) => parse_leading_number(first).map(FeatureLevel::Single),
        (Some(second), None) => {
            let a = parse_leading_number(first)?;
            let b = parse_leading_number(second)?;
            Some(FeatureLevel::Range(LevelRange::new(a, b)))
        }
        (Some(_), Some(_)) => None,
    }
}

/// Read and parse the level tag of a feature.
///
/// Only string-valued tags are considered; a numeric or missing `level`
/// property yields `None`.
pub fn parse_feature_level(feature: &Feature) -> Option<FeatureLevel> {
    feature
        .property(LEVEL_PROPERTY)
        .and_then(|value| value.as_str())
        .and_then(parse_level_tag)
}

/// Format a level the way it appears in tags (`2.0` -> `"2"`, `0.5` -> `"0.5"`).
pub fn format_level(level: f64) -> String {
    if level.fract() == 0.0 && level.abs() < 1e15 {
        format!("{}", level as i64)
    } else {
        format!("{}", level)
    }
}

/// Fold the level range and bounding box of a dataset.
///
/// Bounds cover every coordinate of the dataset, leveled or not. Features
/// with malformed tags are skipped for the level fold only.
///
/// # Errors
///
/// - [`ExtractError::NoLevelFound`] when no feature has a parseable level
/// - [`ExtractError::EmptyGeometry`] when there is nothing to bound
pub fn extract_level_range_and_bounds(
    geojson: &GeoJson,
) -> Result<(LevelRange, GeoBounds), ExtractError> {
    let features: &[Feature] = match geojson {
        GeoJson::FeatureCollection(collection) => &collection.features,
        GeoJson::Feature(feature) => std::slice::from_ref(feature),
        GeoJson::Geometry(_) => &[],
    };

    let mut range: Option<LevelRange> = None;
    for level in features.iter().filter_map(parse_feature_level) {
        range = Some(match range {
            None => LevelRange::new(level.min(), level.max()),
            Some(r) => LevelRange {
                min: r.min.min(level.min()),
                max: r.max.max(level.max()),
            },
        });
    }
    let range = range.ok_or(ExtractError::NoLevelFound)?;

    let mut bounds: Option<GeoBounds> = None;
    match geojson {
        GeoJson::Geometry(geometry) => fold_geometry(geometry, &mut bounds),
        _ => {
            for geometry in features.iter().filter_map(|f| f.geometry.as_ref()) {
                fold_geometry(geometry, &mut bounds);
            }
        }
    }
    let bounds = bounds.ok_or(ExtractError::EmptyGeometry)?;

    Ok((range, bounds))
}

fn fold_geometry(geometry: &Geometry, bounds: &mut Option<GeoBounds>) {
    let mut visit = |position: &Vec<f64>| {
        if position.len() < 2 {
            return;
        }
        let point = GeoPoint::new(position[1], position[0]);
        match bounds {
            Some(b) => b.expand(point),
            None => *bounds = Some(GeoBounds::from_point(point)),
        }
    };

    match &geometry.value {
        Value::Point(p) => visit(p),
        Value::MultiPoint(points) | Value::LineString(points) => points.iter().for_each(visit),
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            lines.iter().flatten().for_each(visit)
        }
        Value::MultiPolygon(polygons) => polygons.iter().flatten().flatten().for_each(visit),
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                fold_geometry(g, bounds);
            }
        }
    }
}

/// Parse the longest numeric prefix of `s` after leading whitespace.
///
/// `"2"` -> 2, `" -1.5"` -> -1.5, `"3rd"` -> 3, `"1e2x"` -> 100,
/// `"abc"` / `""` -> `None`. Non-finite results are rejected.
fn parse_leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    // Exponent only counts when followed by at least one digit
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}
