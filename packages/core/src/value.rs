//! The HostValue type - the dynamically-typed payload the host posts.
//!
//! Inbound commands arrive as a dictionary of these. The host boundary
//! decides how values are encoded on its side; the JSON conversion here is
//! what the CLI host uses, with `{"$resource": <id>}` standing in for a
//! resource reference.

use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a host-owned resource, such as a filesystem handed over by
/// reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key marking a JSON object as a resource reference.
pub const RESOURCE_KEY: &str = "$resource";

/// A value posted by the host.
///
/// Uses `BTreeMap` for dictionaries so iteration order is deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum HostValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<HostValue>),
    Dictionary(BTreeMap<String, HostValue>),
    /// Reference to a host-owned resource.
    Resource(ResourceId),
}

impl HostValue {
    /// Create an empty dictionary.
    pub fn dictionary() -> Self {
        HostValue::Dictionary(BTreeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    pub fn as_dictionary(&self) -> Option<&BTreeMap<String, HostValue>> {
        match self {
            HostValue::Dictionary(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<ResourceId> {
        match self {
            HostValue::Resource(id) => Some(*id),
            _ => None,
        }
    }

    /// Look up a key, `None` unless this is a dictionary holding it.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.as_dictionary()?.get(key)
    }

    /// Builder-style insert; turns a non-dictionary into an empty dictionary
    /// first.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<HostValue>) -> Self {
        if !matches!(self, HostValue::Dictionary(_)) {
            self = HostValue::dictionary();
        }
        if let HostValue::Dictionary(map) = &mut self {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Short name of the variant, for log lines.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Integer(_) => "integer",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "string",
            HostValue::Array(_) => "array",
            HostValue::Dictionary(_) => "dictionary",
            HostValue::Resource(_) => "resource",
        }
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => HostValue::Integer(i),
                None => HostValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => HostValue::String(s),
            serde_json::Value::Array(items) => {
                HostValue::Array(items.into_iter().map(HostValue::from).collect())
            }
            serde_json::Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(id) = map
                        .get(RESOURCE_KEY)
                        .and_then(serde_json::Value::as_u64)
                        .and_then(|id| u32::try_from(id).ok())
                    {
                        return HostValue::Resource(ResourceId(id));
                    }
                }
                HostValue::Dictionary(
                    map.into_iter()
                        .map(|(k, v)| (k, HostValue::from(v)))
                        .collect(),
                )
            }
        }
    }
}

// Conversion from common types

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Integer(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::String(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::String(v.to_string())
    }
}

impl From<ResourceId> for HostValue {
    fn from(v: ResourceId) -> Self {
        HostValue::Resource(v)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(v: Vec<T>) -> Self {
        HostValue::Array(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_objects_become_dictionaries() {
        let value = HostValue::from(json!({
            "cmd": "clone",
            "fullPath": "/grvfs/repo",
            "depth": 1,
        }));

        assert_eq!(value.get("cmd").and_then(HostValue::as_str), Some("clone"));
        assert_eq!(value.get("depth"), Some(&HostValue::Integer(1)));
        assert_eq!(value.get("missing"), None);
    }

    #[test]
    fn resource_marker_becomes_resource() {
        let value = HostValue::from(json!({"filesystem": {"$resource": 7}}));
        assert_eq!(
            value.get("filesystem").and_then(HostValue::as_resource),
            Some(ResourceId(7))
        );
    }

    #[test]
    fn resource_marker_needs_a_lone_u32() {
        let negative = HostValue::from(json!({"$resource": -1}));
        assert!(negative.as_dictionary().is_some());

        let extra = HostValue::from(json!({"$resource": 1, "other": true}));
        assert!(extra.as_dictionary().is_some());

        let too_big = HostValue::from(json!({"$resource": u64::from(u32::MAX) + 1}));
        assert!(too_big.as_dictionary().is_some());
    }

    #[test]
    fn scalars_and_arrays() {
        assert_eq!(HostValue::from(json!(null)), HostValue::Null);
        assert_eq!(HostValue::from(json!(1.5)), HostValue::Float(1.5));
        assert_eq!(
            HostValue::from(json!(["a", true])),
            HostValue::Array(vec![HostValue::from("a"), HostValue::from(true)])
        );
    }

    #[test]
    fn builder_inserts_into_dictionary() {
        let value = HostValue::Null
            .with("cmd", "clone")
            .with("filesystem", ResourceId(3));
        assert_eq!(value.type_name(), "dictionary");
        assert_eq!(value.get("filesystem"), Some(&HostValue::Resource(ResourceId(3))));
    }
}
