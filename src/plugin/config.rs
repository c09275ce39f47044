//! Plugin configuration
//!
//! The manager passes a [`PluginConfig`] to a plugin verbatim. Each plugin
//! parses it into its own options struct with [`PluginConfig::parse`]. Mark
//! that struct `#[serde(default, deny_unknown_fields)]` so typos and
//! mistyped values are rejected rather than silently ignored.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::types::PluginError;

/// Named options for one plugin instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginConfig {
    options: Map<String, Value>,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value; anything but an object is rejected
    pub fn from_value(value: Value) -> Result<Self, PluginError> {
        match value {
            Value::Object(options) => Ok(Self { options }),
            Value::Null => Ok(Self::default()),
            other => Err(PluginError::config(format!(
                "plugin config must be an object, got {}",
                other
            ))),
        }
    }

    /// Build from key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        pairs.into_iter().collect()
    }

    /// Set one option
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Deserialize into a typed options struct
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, PluginError> {
        serde_json::from_value(Value::Object(self.options.clone()))
            .map_err(|e| PluginError::config(e.to_string()))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PluginConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            options: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
