//! Metadata file loader
//!
//! Parses a single metadata file into an ordered mapping. Duplicate keys
//! are rejected by the YAML parser and surface as parse errors carrying
//! the file path.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::Error;
use crate::value::{Map, Value};

/// Load one metadata file.
///
/// An empty file yields an empty mapping; a document whose root is not a
/// mapping is invalid.
pub fn load(path: &Path) -> Result<Map, Error> {
    debug!(path = %path.display(), "Loading metadata file");
    let content = fs::read_to_string(path).map_err(|error| Error::File {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|source| Error::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    match yaml {
        serde_yaml::Value::Null => Ok(Map::new()),
        serde_yaml::Value::Mapping(_) => match Value::from_yaml(yaml)? {
            Value::Map(map) => Ok(map),
            _ => unreachable!("a mapping converts to a map"),
        },
        _ => Err(Error::InvalidSyntax {
            path: path.to_path_buf(),
        }),
    }
}
