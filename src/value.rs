//! Attribute values
//!
//! Node data is modelled as a tagged sum type over the YAML scalar and
//! container kinds. Mappings preserve insertion order so that merged data
//! and round-trip writes keep the order of the source documents.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::Error;

/// Ordered mapping from attribute name to value
pub type Map = IndexMap<String, Value>;

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Map),
}

impl Value {
    /// Human readable name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// True in a boolean context: null, false, zero and empty containers
    /// count as false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(value) => *value,
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::String(value) => !value.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// String form used when matching filter patterns and rendering
    /// scalar output. Containers are rendered as compact JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => value.to_string(),
            Value::String(value) => value.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }

    /// Convert a parsed YAML value into the internal representation.
    ///
    /// Scalar mapping keys are converted to their string form; sequence
    /// or mapping keys are rejected.
    pub fn from_yaml(yaml: serde_yaml::Value) -> Result<Value, Error> {
        match yaml {
            serde_yaml::Value::Null => Ok(Value::Null),
            serde_yaml::Value::Bool(value) => Ok(Value::Bool(value)),
            serde_yaml::Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Ok(Value::Int(value))
                } else if let Some(value) = number.as_f64() {
                    Ok(Value::Float(value))
                } else {
                    Err(Error::General(format!("Unsupported number '{number}'.")))
                }
            }
            serde_yaml::Value::String(value) => Ok(Value::String(value)),
            serde_yaml::Value::Sequence(items) => Ok(Value::List(
                items
                    .into_iter()
                    .map(Value::from_yaml)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            serde_yaml::Value::Mapping(mapping) => {
                let mut map = Map::new();
                for (key, value) in mapping {
                    map.insert(yaml_key(key)?, Value::from_yaml(value)?);
                }
                Ok(Value::Map(map))
            }
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value),
        }
    }

    /// Deep lookup into nested mappings, `None` when any level is missing.
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let mut current = self;
        for key in path {
            current = current.as_map()?.get(*key)?;
        }
        Some(current)
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, Error> {
    match key {
        serde_yaml::Value::String(value) => Ok(value),
        serde_yaml::Value::Bool(value) => Ok(value.to_string()),
        serde_yaml::Value::Number(value) => Ok(value.to_string()),
        serde_yaml::Value::Null => Ok(String::from("null")),
        other => Err(Error::General(format!(
            "Mapping keys must be scalars, got a {:?}.",
            other
        ))),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Int(value) => serializer.serialize_i64(*value),
            Value::Float(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

/// Parse a YAML document into an ordered mapping.
///
/// An empty document yields an empty mapping; a non-mapping document root
/// is rejected by the caller which knows the file path.
pub fn parse_document(content: &str) -> Result<Option<Map>, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Some(Map::new()));
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    match yaml {
        serde_yaml::Value::Null => Ok(Some(Map::new())),
        serde_yaml::Value::Mapping(_) => match Value::from_yaml(yaml) {
            Ok(Value::Map(map)) => Ok(Some(map)),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Serialise an ordered mapping as a YAML document.
pub fn to_yaml(map: &Map) -> Result<String, Error> {
    serde_yaml::to_string(&Value::Map(map.clone()))
        .map_err(|error| Error::General(format!("Failed to serialise data: {error}")))
}
