// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Dynamic value type shared by the condition evaluator, request contexts,
//! and entity attribute storage.
//!
//! `properties` on an [`Entity`](crate::model::Entity) and the per-request
//! `context` map are both untyped JSON at the wire boundary. Rather than
//! threading `serde_json::Value` through the evaluator directly, the engine
//! normalizes into [`Value`] at the boundary so that comparison and
//! coercion rules live in one place.

use std::collections::BTreeMap;

use serde_json::Value as Json;

/// A dynamically typed value.
///
/// Mirrors JSON's value space so that attribute reads, context lookups, and
/// rule-argument evaluation all flow through the same representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value (JSON `null`, or a missing key treated as null).
    Null,
    /// Boolean.
    Bool(bool),
    /// Integral number, preserved without precision loss.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// String-keyed map of values. Ordered by key for deterministic
    /// rendering (e.g. in `/visualize-condition` output).
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Truthiness used by `Attribute` and `Context` expressions when they
    /// appear as a boolean operand: truthy if not null.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null)
    }

    /// Attempt to coerce this value to `f64`.
    ///
    /// Accepts integers, floats, and numeric strings: if both sides of a
    /// comparison coerce to float64, the comparison is numeric.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Borrow this value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Structural equality, used as the fallback for `==`/`!=` when neither
    /// the numeric nor the string comparison path applies: only EQ/NEQ are
    /// defined in that case.
    pub fn structurally_equal(&self, other: &Value) -> bool {
        self == other
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Json> for Value {
    fn from(json: &Json) -> Self {
        Value::from(json.clone())
    }
}

impl From<Value> for Json {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(b),
            Value::Int(i) => Json::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s),
            Value::Array(items) => Json::Array(items.into_iter().map(Json::from).collect()),
            Value::Object(map) => {
                Json::Object(map.into_iter().map(|(k, v)| (k, Json::from(v))).collect())
            }
        }
    }
}

/// Walk a dotted path (e.g. `["request", "amount"]`) through a JSON object,
/// returning the value at the final segment.
///
/// Used by the `Context{path}` expression variant. A
/// missing intermediate map is distinguished from a missing leaf: the
/// caller decides whether that is a hard error or an absent-value `None`.
pub fn walk_path<'a>(root: &'a Json, path: &[String]) -> PathLookup<'a> {
    let mut current = root;
    for (idx, segment) in path.iter().enumerate() {
        match current {
            Json::Object(map) => match map.get(segment) {
                Some(next) => current = next,
                None => {
                    return if idx + 1 == path.len() {
                        PathLookup::MissingLeaf
                    } else {
                        PathLookup::MissingIntermediate
                    };
                }
            },
            _ => return PathLookup::MissingIntermediate,
        }
    }
    PathLookup::Found(current)
}

/// Result of [`walk_path`].
pub enum PathLookup<'a> {
    /// The full path resolved to a value.
    Found(&'a Json),
    /// The final segment was absent on an otherwise-present object.
    MissingLeaf,
    /// An intermediate segment was absent or not an object.
    MissingIntermediate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_null_is_false() {
        assert!(!Value::Null.is_truthy());
        assert!(Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
    }

    #[test]
    fn numeric_string_coerces() {
        assert_eq!(Value::String("42".into()).to_number(), Some(42.0));
        assert_eq!(Value::String("3.5".into()).to_number(), Some(3.5));
        assert_eq!(Value::String("nope".into()).to_number(), None);
    }

    #[test]
    fn json_roundtrip_preserves_ints() {
        let json = serde_json::json!({"a": 1, "b": [1, 2.5, "x", null, true]});
        let value = Value::from(json.clone());
        let back: Json = value.into();
        assert_eq!(json, back);
    }

    #[test]
    fn walk_path_distinguishes_missing_kinds() {
        let root = serde_json::json!({"request": {"amount": 50}});
        match walk_path(&root, &["request".into(), "amount".into()]) {
            PathLookup::Found(v) => assert_eq!(v.as_i64(), Some(50)),
            _ => panic!("expected Found"),
        }
        assert!(matches!(
            walk_path(&root, &["request".into(), "missing".into()]),
            PathLookup::MissingLeaf
        ));
        assert!(matches!(
            walk_path(&root, &["nope".into(), "amount".into()]),
            PathLookup::MissingIntermediate
        ));
    }
}
