//! Conversions from YAML metadata into template [`Value`]s, plus small
//! accessors for the handful of metadata keys the build itself interprets
//! (`layout`, `published`, `title`, `categories`, ...).

use gtmpl_value::Value;
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::HashMap;

/// Parses `text` as a YAML mapping. Empty documents and documents holding only
/// `null` yield an empty mapping; any other non-mapping document yields
/// `Ok(None)` so callers can report it in their own terms.
pub fn yaml_mapping(text: &str) -> Result<Option<Mapping>, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(Some(Mapping::new()));
    }
    match serde_yaml::from_str(text)? {
        Yaml::Mapping(mapping) => Ok(Some(mapping)),
        Yaml::Null => Ok(Some(Mapping::new())),
        _ => Ok(None),
    }
}

/// Converts an arbitrary YAML value into a template value.
pub fn from_yaml(value: &Yaml) -> Value {
    match value {
        Yaml::Null => Value::Nil,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => Value::from(n.as_f64().unwrap_or_default()),
        },
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(items) => Value::Array(items.iter().map(from_yaml).collect()),
        Yaml::Mapping(mapping) => Value::Object(from_mapping(mapping)),
    }
}

/// Converts a YAML mapping into the field map of a [`Value::Object`]. Scalar
/// keys are stringified; keys that are sequences or mappings are dropped since
/// templates can't address them.
pub fn from_mapping(mapping: &Mapping) -> HashMap<String, Value> {
    mapping
        .iter()
        .filter_map(|(k, v)| key_string(k).map(|k| (k, from_yaml(v))))
        .collect()
}

fn key_string(key: &Yaml) -> Option<String> {
    match key {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn get<'m>(mapping: &'m Mapping, key: &str) -> Option<&'m Yaml> {
    mapping.get(&Yaml::String(key.to_owned()))
}

/// Returns the string stored under `key`, if any.
pub fn get_str<'m>(mapping: &'m Mapping, key: &str) -> Option<&'m str> {
    match get(mapping, key) {
        Some(Yaml::String(s)) => Some(s),
        _ => None,
    }
}

/// Returns the boolean stored under `key`, if any.
pub fn get_bool(mapping: &Mapping, key: &str) -> Option<bool> {
    match get(mapping, key) {
        Some(Yaml::Bool(b)) => Some(*b),
        _ => None,
    }
}

/// Reads a list of names from `key`. Accepts either a YAML sequence of scalars
/// or a single whitespace-separated string.
pub fn get_list(mapping: &Mapping, key: &str) -> Vec<String> {
    match get(mapping, key) {
        Some(Yaml::Sequence(items)) => items.iter().filter_map(key_string).collect(),
        Some(Yaml::String(s)) => s.split_whitespace().map(str::to_owned).collect(),
        Some(other) => key_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Builds a [`Value::Object`] from `(key, value)` pairs.
pub fn object<I, K>(fields: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    Value::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

/// Converts a list of names into a [`Value::Array`] of strings.
pub fn strings(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

/// Appends `items` to `list`, skipping names already present.
pub fn extend_unique<I>(list: &mut Vec<String>, items: I)
where
    I: IntoIterator<Item = String>,
{
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
}
