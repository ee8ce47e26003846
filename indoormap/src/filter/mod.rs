//! Declarative layer filters.
//!
//! Render layers select the features they draw with a small boolean
//! expression tree. This module provides that tree as a tagged union, a pure
//! evaluator against GeoJSON features, the level-predicate composition used
//! whenever the active level changes, and conversion to and from the
//! style-spec JSON array form understood by MapLibre-compatible surfaces.
//!
//! # Example
//!
//! ```
//! use indoormap::filter::{filter_with_level, Filter};
//!
//! let rooms = Filter::eq("indoor", "room");
//! let live = filter_with_level(&rooms, 2.0, false);
//! assert!(matches!(live, Filter::All(_)));
//! ```

mod json;

pub use json::FilterError;

use geojson::Feature;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::level::{format_level, LEVEL_PROPERTY, LEVEL_SEPARATOR};

/// Pseudo-property resolving to the feature's geometry type.
pub const GEOMETRY_TYPE_KEY: &str = "$type";

/// Boolean expression over feature properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Filter {
    /// Constant result.
    Literal(bool),
    /// Every child matches (an empty list always matches).
    All(Vec<Filter>),
    /// At least one child matches (an empty list never matches).
    Any(Vec<Filter>),
    Not(Box<Filter>),
    /// The property is present.
    Has(String),
    /// The property equals the value.
    Eq { key: String, value: Value },
    /// The property equals one of the values.
    In { key: String, values: Vec<Value> },
    /// The string level tag equals the formatted level.
    LevelEquals { key: String, level: f64 },
    /// The level tag is an `a;b` span containing the level.
    LevelSpans { key: String, level: f64 },
}

impl Filter {
    /// Filter accepting every feature.
    pub fn always() -> Self {
        Filter::All(Vec::new())
    }

    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn has(key: impl Into<String>) -> Self {
        Filter::Has(key.into())
    }

    pub fn is_in<V: Into<Value>>(key: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Evaluate the filter against a feature.
    pub fn matches(&self, feature: &Feature) -> bool {
        match self {
            Filter::Literal(value) => *value,
            Filter::All(children) => children.iter().all(|f| f.matches(feature)),
            Filter::Any(children) => children.iter().any(|f| f.matches(feature)),
            Filter::Not(inner) => !inner.matches(feature),
            Filter::Has(key) => lookup(feature, key).is_some(),
            Filter::Eq { key, value } => {
                lookup(feature, key).is_some_and(|actual| values_equal(&actual, value))
            }
            Filter::In { key, values } => lookup(feature, key)
                .is_some_and(|actual| values.iter().any(|v| values_equal(&actual, v))),
            Filter::LevelEquals { key, level } => string_property(feature, key)
                .is_some_and(|tag| tag == format_level(*level)),
            Filter::LevelSpans { key, level } => string_property(feature, key)
                .and_then(parse_span)
                .is_some_and(|(a, b)| a.min(b) <= *level && *level <= a.max(b)),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::always()
    }
}

/// Compose a layer's base filter with the predicate for `level`.
///
/// A feature passes when it passes `base` and either carries no level tag
/// (only when `show_empty` is set), or its tag equals `level`, or its tag is a
/// span that includes `level`.
pub fn filter_with_level(base: &Filter, level: f64, show_empty: bool) -> Filter {
    let untagged = if show_empty {
        Filter::not(Filter::has(LEVEL_PROPERTY))
    } else {
        Filter::Literal(false)
    };

    Filter::All(vec![
        base.clone(),
        Filter::Any(vec![
            untagged,
            Filter::All(vec![
                Filter::has(LEVEL_PROPERTY),
                Filter::Any(vec![
                    Filter::LevelEquals {
                        key: LEVEL_PROPERTY.to_string(),
                        level,
                    },
                    Filter::LevelSpans {
                        key: LEVEL_PROPERTY.to_string(),
                        level,
                    },
                ]),
            ]),
        ]),
    ])
}

fn lookup(feature: &Feature, key: &str) -> Option<Value> {
    if key == GEOMETRY_TYPE_KEY {
        return geometry_type(feature).map(|t| Value::String(t.to_string()));
    }
    feature.property(key).filter(|v| !v.is_null()).cloned()
}

fn string_property<'a>(feature: &'a Feature, key: &str) -> Option<&'a str> {
    feature.property(key).and_then(Value::as_str)
}

/// Geometry type as seen by filters; multi-geometries fold into their base type.
fn geometry_type(feature: &Feature) -> Option<&'static str> {
    use geojson::Value as G;

    let geometry = feature.geometry.as_ref()?;
    match geometry.value {
        G::Point(_) | G::MultiPoint(_) => Some("Point"),
        G::LineString(_) | G::MultiLineString(_) => Some("LineString"),
        G::Polygon(_) | G::MultiPolygon(_) => Some("Polygon"),
        G::GeometryCollection(_) => None,
    }
}

fn parse_span(tag: &str) -> Option<(f64, f64)> {
    let (a, b) = tag.split_once(LEVEL_SEPARATOR)?;
    let a = a.trim().parse::<f64>().ok()?;
    let b = b.trim().parse::<f64>().ok()?;
    Some((a, b))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
