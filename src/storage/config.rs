//! Storage configuration

use serde::Deserialize;

/// Which backend to open
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Volatile in-process maps
    Memory,
    /// Redis lists and sets
    Redis(RedisConfig),
}

/// Redis connection options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://:password@localhost:6379/0`
    pub url: String,

    /// Prepended to every key, e.g. `"myapp:"`
    pub prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            prefix: String::new(),
        }
    }
}

impl RedisConfig {
    /// Config for a `host:port` address or a full `redis://` URL
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let url = if addr.contains("://") {
            addr
        } else {
            format!("redis://{}", addr)
        };
        Self {
            url,
            ..Default::default()
        }
    }

    /// Set the key prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// Frame store configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection
    pub backend: BackendConfig,

    /// Buffered events per session channel before slow subscribers lag
    pub notify_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Memory,
            notify_capacity: 256,
        }
    }
}

impl StorageConfig {
    /// In-process backend
    pub fn memory() -> Self {
        Self::default()
    }

    /// Redis backend
    pub fn redis(config: RedisConfig) -> Self {
        Self {
            backend: BackendConfig::Redis(config),
            ..Default::default()
        }
    }

    /// Set the per-session notification buffer
    pub fn notify_capacity(mut self, capacity: usize) -> Self {
        self.notify_capacity = capacity;
        self
    }
}
