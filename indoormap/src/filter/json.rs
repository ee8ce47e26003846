//! Style-spec JSON encoding of [`Filter`].
//!
//! Encoding always produces the expression form. Decoding additionally
//! accepts the legacy filter syntax (`["==", "key", value]`, `["in", key, ...]`)
//! and the `filter-*` operators older style sheets were compiled into.

use serde_json::{json, Value};
use thiserror::Error;

use super::{Filter, GEOMETRY_TYPE_KEY};
use crate::level::format_level;

/// Errors raised while decoding a filter from JSON.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("Unsupported filter operator: {0}")]
    UnsupportedOperator(String),

    #[error("Malformed filter {expression}: {reason}")]
    Malformed { expression: String, reason: String },
}

impl FilterError {
    fn malformed(expression: &Value, reason: impl Into<String>) -> Self {
        FilterError::Malformed {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<Filter> for Value {
    fn from(filter: Filter) -> Self {
        filter.to_json()
    }
}

impl TryFrom<Value> for Filter {
    type Error = FilterError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Filter::from_json(&value)
    }
}

impl Filter {
    /// Encode as a style-spec expression.
    pub fn to_json(&self) -> Value {
        match self {
            Filter::Literal(value) => Value::Bool(*value),
            Filter::All(children) => combinator("all", children),
            Filter::Any(children) => combinator("any", children),
            Filter::Not(inner) => json!(["!", inner.to_json()]),
            Filter::Has(key) => json!(["has", key]),
            Filter::Eq { key, value } => json!(["==", getter(key), value]),
            Filter::In { key, values } => json!(["match", getter(key), values, true, false]),
            Filter::LevelEquals { key, level } => {
                json!(["==", getter(key), format_level(*level)])
            }
            Filter::LevelSpans { key, level } => {
                let separator = json!(["index-of", ";", getter(key)]);
                let lower = json!(["to-number", ["slice", getter(key), 0, separator]]);
                let upper = json!(["to-number", ["slice", getter(key), ["+", separator, 1]]]);
                json!([
                    "all",
                    ["!=", separator, -1],
                    [">=", level, ["min", lower, upper]],
                    ["<=", level, ["max", lower, upper]]
                ])
            }
        }
    }

    /// Decode a filter in expression, legacy or `filter-*` form.
    pub fn from_json(value: &Value) -> Result<Filter, FilterError> {
        let items = match value {
            Value::Bool(b) => return Ok(Filter::Literal(*b)),
            Value::Array(items) => items,
            other => return Err(FilterError::malformed(other, "expected a boolean or an array")),
        };

        let Some((op, args)) = items.split_first() else {
            return Err(FilterError::malformed(value, "empty expression"));
        };
        let op = op
            .as_str()
            .ok_or_else(|| FilterError::malformed(value, "operator must be a string"))?;

        match op {
            "all" => Ok(Filter::All(decode_children(args)?)),
            "any" => Ok(Filter::Any(decode_children(args)?)),
            "none" => Ok(Filter::not(Filter::Any(decode_children(args)?))),
            "!" => match args {
                [inner] => Ok(Filter::not(Filter::from_json(inner)?)),
                _ => Err(FilterError::malformed(value, "`!` takes one operand")),
            },
            "has" | "filter-has" => Ok(Filter::Has(single_key(value, args)?)),
            "!has" | "filter-has-not" => Ok(Filter::not(Filter::Has(single_key(value, args)?))),
            "==" | "filter-==" => decode_eq(value, args),
            "!=" | "filter-!=" => Ok(Filter::not(decode_eq(value, args)?)),
            "in" => decode_in(value, args),
            "!in" => Ok(Filter::not(decode_in(value, args)?)),
            "filter-in-small" | "filter-in-large" => match args {
                [key, list] => Ok(Filter::In {
                    key: property_key(value, key)?,
                    values: literal_list(value, list)?,
                }),
                _ => Err(FilterError::malformed(value, "expected a key and a value list")),
            },
            "match" => decode_match(value, args),
            "boolean" => match args.first() {
                Some(Value::Bool(b)) => Ok(Filter::Literal(*b)),
                _ => Err(FilterError::malformed(value, "`boolean` expects a constant")),
            },
            other => Err(FilterError::UnsupportedOperator(other.to_string())),
        }
    }
}

fn combinator(op: &str, children: &[Filter]) -> Value {
    let mut items = Vec::with_capacity(children.len() + 1);
    items.push(Value::String(op.to_string()));
    items.extend(children.iter().map(Filter::to_json));
    Value::Array(items)
}

fn getter(key: &str) -> Value {
    if key == GEOMETRY_TYPE_KEY {
        json!(["geometry-type"])
    } else {
        json!(["get", key])
    }
}

fn decode_children(args: &[Value]) -> Result<Vec<Filter>, FilterError> {
    args.iter().map(Filter::from_json).collect()
}

fn single_key(expression: &Value, args: &[Value]) -> Result<String, FilterError> {
    match args {
        [key] => property_key(expression, key),
        _ => Err(FilterError::malformed(expression, "expected exactly one key")),
    }
}

/// Resolve an operand naming a property: a bare key, `["get", key]` or
/// `["geometry-type"]`.
fn property_key(expression: &Value, operand: &Value) -> Result<String, FilterError> {
    match operand {
        Value::String(key) => Ok(key.clone()),
        Value::Array(items) => match items.as_slice() {
            [op] if op == "geometry-type" => Ok(GEOMETRY_TYPE_KEY.to_string()),
            [op, Value::String(key)] if op == "get" => Ok(key.clone()),
            _ => Err(FilterError::malformed(expression, "unsupported property operand")),
        },
        _ => Err(FilterError::malformed(expression, "property key must be a string")),
    }
}

/// Unwrap `["literal", x]`; reject nested expressions.
fn literal_value(expression: &Value, operand: &Value) -> Result<Value, FilterError> {
    match operand {
        Value::Array(items) => match items.as_slice() {
            [op, inner] if op == "literal" => Ok(inner.clone()),
            _ => Err(FilterError::malformed(expression, "expected a literal value")),
        },
        other => Ok(other.clone()),
    }
}

fn literal_list(expression: &Value, operand: &Value) -> Result<Vec<Value>, FilterError> {
    match literal_value(expression, operand) {
        Ok(Value::Array(values)) => Ok(values),
        // A bare array is not a valid literal; accept it as a plain list
        Err(_) if operand.is_array() => Ok(operand.as_array().cloned().unwrap_or_default()),
        Ok(_) | Err(_) => Err(FilterError::malformed(expression, "expected a value list")),
    }
}

fn decode_eq(expression: &Value, args: &[Value]) -> Result<Filter, FilterError> {
    match args {
        [key, value] => Ok(Filter::Eq {
            key: property_key(expression, key)?,
            value: literal_value(expression, value)?,
        }),
        _ => Err(FilterError::malformed(expression, "expected a key and a value")),
    }
}

/// Legacy `["in", key, v1, v2, ...]` or expression
/// `["in", ["get", key], ["literal", [v1, v2, ...]]]`.
fn decode_in(expression: &Value, args: &[Value]) -> Result<Filter, FilterError> {
    let Some((key, rest)) = args.split_first() else {
        return Err(FilterError::malformed(expression, "missing key"));
    };

    match key {
        Value::String(key) => Ok(Filter::In {
            key: key.clone(),
            values: rest.to_vec(),
        }),
        getter => match rest {
            [list] => Ok(Filter::In {
                key: property_key(expression, getter)?,
                values: literal_list(expression, list)?,
            }),
            _ => Err(FilterError::malformed(expression, "expected a single value list")),
        },
    }
}

/// `["match", ["get", key], labels, true, false]`, the membership form
/// produced by [`Filter::to_json`].
fn decode_match(expression: &Value, args: &[Value]) -> Result<Filter, FilterError> {
    match args {
        [input, labels, Value::Bool(true), Value::Bool(false)] => {
            let values = match labels {
                Value::Array(values) => values.clone(),
                single => vec![single.clone()],
            };
            Ok(Filter::In {
                key: property_key(expression, input)?,
                values,
            })
        }
        _ => Err(FilterError::malformed(
            expression,
            "only boolean membership `match` is supported",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_with_level;
    use geojson::Feature;

    fn decode(value: Value) -> Filter {
        Filter::from_json(&value).unwrap()
    }

    mod decoding {
        use super::*;

        #[test]
        fn test_legacy_forms() {
            assert_eq!(decode(json!(["==", "indoor", "room"])), Filter::eq("indoor", "room"));
            assert_eq!(
                decode(json!(["!=", "indoor", "room"])),
                Filter::not(Filter::eq("indoor", "room"))
            );
            assert_eq!(
                decode(json!(["in", "indoor", "room", "area"])),
                Filter::is_in("indoor", ["room", "area"])
            );
            assert_eq!(decode(json!(["has", "shop"])), Filter::has("shop"));
            assert_eq!(decode(json!(["!has", "shop"])), Filter::not(Filter::has("shop")));
            assert_eq!(
                decode(json!(["none", ["has", "a"]])),
                Filter::not(Filter::Any(vec![Filter::has("a")]))
            );
        }

        #[test]
        fn test_compiled_filter_forms() {
            assert_eq!(
                decode(json!(["filter-==", "amenity", "cafe"])),
                Filter::eq("amenity", "cafe")
            );
            assert_eq!(
                decode(json!(["filter-in-small", "indoor", ["literal", ["room", "area"]]])),
                Filter::is_in("indoor", ["room", "area"])
            );
            assert_eq!(decode(json!(["filter-has", "shop"])), Filter::has("shop"));
        }

        #[test]
        fn test_expression_forms() {
            assert_eq!(
                decode(json!(["==", ["get", "indoor"], "room"])),
                Filter::eq("indoor", "room")
            );
            assert_eq!(
                decode(json!(["==", ["geometry-type"], "Polygon"])),
                Filter::eq(GEOMETRY_TYPE_KEY, "Polygon")
            );
            assert_eq!(
                decode(json!(["==", "$type", "Polygon"])),
                Filter::eq(GEOMETRY_TYPE_KEY, "Polygon")
            );
            assert_eq!(
                decode(json!(["in", ["get", "indoor"], ["literal", ["room"]]])),
                Filter::is_in("indoor", ["room"])
            );
            assert_eq!(decode(json!(true)), Filter::Literal(true));
            assert_eq!(decode(json!(["boolean", false])), Filter::Literal(false));
            assert_eq!(decode(json!(["all"])), Filter::always());
        }

        #[test]
        fn test_errors() {
            assert_eq!(
                Filter::from_json(&json!(["within", {}])),
                Err(FilterError::UnsupportedOperator("within".to_string()))
            );
            assert!(matches!(
                Filter::from_json(&json!([])),
                Err(FilterError::Malformed { .. })
            ));
            assert!(matches!(
                Filter::from_json(&json!("room")),
                Err(FilterError::Malformed { .. })
            ));
            assert!(matches!(
                Filter::from_json(&json!(["!", true, false])),
                Err(FilterError::Malformed { .. })
            ));
            assert!(matches!(
                Filter::from_json(&json!(["==", ["get", "a"], ["get", "b"]])),
                Err(FilterError::Malformed { .. })
            ));
        }

        #[test]
        fn test_serde_uses_json_form() {
            let filter: Filter = serde_json::from_value(json!(["has", "ref"])).unwrap();
            assert_eq!(filter, Filter::has("ref"));
            assert!(serde_json::from_value::<Filter>(json!(["nope"])).is_err());
        }
    }

    mod encoding {
        use super::*;

        #[test]
        fn test_level_filter_shape() {
            let encoded = filter_with_level(&Filter::always(), 2.0, true).to_json();

            assert_eq!(encoded[0], "all");
            assert_eq!(encoded[1], json!(["all"]));
            assert_eq!(encoded[2][0], "any");
            assert_eq!(encoded[2][1], json!(["!", ["has", "level"]]));
            assert_eq!(encoded[2][2][1], json!(["has", "level"]));
            assert_eq!(encoded[2][2][2][1], json!(["==", ["get", "level"], "2"]));
        }

        #[test]
        fn test_hidden_empty_level_encodes_false() {
            let encoded = filter_with_level(&Filter::always(), 0.0, false).to_json();
            assert_eq!(encoded[2][1], json!(false));
        }

        #[test]
        fn test_membership_reencodes() {
            let filter = Filter::is_in("indoor", ["room", "area"]);
            assert_eq!(decode(filter.to_json()), filter);

            let typed = Filter::eq(GEOMETRY_TYPE_KEY, "Point");
            assert_eq!(typed.to_json(), json!(["==", ["geometry-type"], "Point"]));
        }

        #[test]
        fn test_decoded_legacy_filter_evaluates() {
            let filter = decode(json!(["all", ["==", "$type", "Polygon"], ["filter-==", "indoor", "room"]]));
            let feature: Feature = serde_json::from_value(json!({
                "type": "Feature",
                "properties": { "indoor": "room" },
                "geometry": { "type": "MultiPolygon", "coordinates": [] }
            }))
            .unwrap();
            assert!(filter.matches(&feature));
        }
    }
}
