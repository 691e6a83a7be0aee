//! Helm values tree with dotted-path access

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// A Helm values document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Parse values from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(Self(value))
    }

    /// Serialize as a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.0).map_err(CoreError::from)
    }

    /// Set a value by dotted path (e.g., "image.tag"), creating intermediate
    /// mappings and replacing any scalar in the way
    pub fn set(&mut self, path: &str, value: JsonValue) {
        let parts: Vec<&str> = path.split('.').collect();
        set_nested(&mut self.0, &parts, value);
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }
}

/// Fail if one path equals or is a dotted prefix of another
///
/// Paths are compared segment-wise, so `a.b` conflicts with `a.b.c` but not
/// with `a.bc`.
pub fn check_path_conflicts<'a>(paths: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut split: Vec<(Vec<&str>, &str)> = paths
        .into_iter()
        .map(|p| (p.split('.').collect(), p))
        .collect();
    split.sort();

    // With segment ordering, any path sits right after the paths it extends
    for pair in split.windows(2) {
        let (shorter, first) = &pair[0];
        let (longer, second) = &pair[1];
        if longer.starts_with(shorter) {
            return Err(CoreError::ValuePathConflict {
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }
    Ok(())
}

/// Set a nested value by path
fn set_nested(value: &mut JsonValue, path: &[&str], new_value: JsonValue) {
    let Some((key, remaining)) = path.split_first() else {
        *value = new_value;
        return;
    };

    if !value.is_object() {
        *value = JsonValue::Object(serde_json::Map::new());
    }

    if let JsonValue::Object(map) = value {
        if remaining.is_empty() {
            map.insert(key.to_string(), new_value);
        } else {
            let entry = map
                .entry(key.to_string())
                .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
            set_nested(entry, remaining, new_value);
        }
    }
}

/// Get a nested value by path
fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let Some((key, remaining)) = path.split_first() else {
        return Some(value);
    };

    match value {
        JsonValue::Object(map) => map.get(*key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}
