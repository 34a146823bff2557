//! Recursive JSON-shaped value type used for `CatalogObject::content`.
//!
//! Modeled as a tagged variant rather than relying on an untyped runtime map,
//! per the re-architecture notes for non-Go targets: `Null | Bool | Number |
//! String | Array<Value> | Object<Map<String, Value>>`. `Object` uses a
//! `BTreeMap` so key order is always sorted, which is what makes
//! [`crate::hash::canonical_json`] deterministic without a separate sort pass.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A JSON-shaped value.
///
/// `Number` is stored as `f64` (TMForum catalog bodies never carry integers
/// wide enough to lose precision in a double), which keeps the variant set
/// small and matches `serde_json::Number`'s common case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the nested value at a dotted path (`"category.name"`), or
    /// `None` if any segment is missing or not an object.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            match current {
                Value::Object(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Returns this value as a string slice, if it is a `Value::String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns this value as an object map, if it is a `Value::Object`.
    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns this value as an array slice, if it is a `Value::Array`.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Convenience constructor for an empty object.
    #[must_use]
    pub fn empty_object() -> Value {
        Value::Object(BTreeMap::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::to_string(self).unwrap_or_default())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_path_single_segment() {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Value::String("Acme".to_string()));
        let value = Value::Object(map);

        assert_eq!(value.get_path("name"), Some(&Value::String("Acme".to_string())));
        assert_eq!(value.get_path("missing"), None);
    }

    #[test]
    fn get_path_nested() {
        let mut inner = BTreeMap::new();
        inner.insert("name".to_string(), Value::String("Energy".to_string()));
        let mut outer = BTreeMap::new();
        outer.insert("category".to_string(), Value::Object(inner));
        let value = Value::Object(outer);

        assert_eq!(
            value.get_path("category.name"),
            Some(&Value::String("Energy".to_string()))
        );
        assert_eq!(value.get_path("category.missing"), None);
        assert_eq!(value.get_path("category.name.too.deep"), None);
    }

    #[test]
    fn json_roundtrip_preserves_shape() {
        let original = serde_json::json!({
            "id": "urn:ngsi-ld:product-offering:abc",
            "tags": ["a", "b"],
            "price": 12.5,
            "active": true,
            "extra": null,
        });
        let value: Value = original.clone().into();
        let back: serde_json::Value = value.into();
        assert_eq!(original, back);
    }

    #[test]
    fn display_matches_serde_json() {
        let value = Value::String("hello".to_string());
        assert_eq!(value.to_string(), "\"hello\"");
    }
}
