use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::storage::StoreError;

/// What a plugin does with the frame store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginRole {
    /// Writes frames from an external source
    Ingress,
    /// Reads frames and emits them externally
    Egress,
    /// Reads frames, derives new ones, writes them back
    Transform,
}

impl PluginRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginRole::Ingress => "ingress",
            PluginRole::Egress => "egress",
            PluginRole::Transform => "transform",
        }
    }
}

impl fmt::Display for PluginRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginRole {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingress" => Ok(PluginRole::Ingress),
            "egress" => Ok(PluginRole::Egress),
            "transform" => Ok(PluginRole::Transform),
            other => Err(PluginError::Config {
                message: format!("unknown plugin role: {}", other),
            }),
        }
    }
}

/// Lifecycle status of a plugin instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginStatus {
    pub running: bool,
    pub start_time: DateTime<Utc>,
    /// Fatal error from the last run, if it ended with one
    pub last_error: Option<String>,
}

type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Plugin errors with structured variants
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin already registered: {role}/{name}")]
    AlreadyRegistered { role: PluginRole, name: String },

    #[error("plugin not found: {role}/{name}")]
    NotFound { role: PluginRole, name: String },

    #[error("plugin {name} registered as {expected} but reports {actual}")]
    RoleMismatch {
        name: String,
        expected: PluginRole,
        actual: PluginRole,
    },

    #[error("plugin already running: {0}")]
    AlreadyRunning(String),

    #[error("plugin not running: {0}")]
    NotRunning(String),

    #[error("no status for plugin: {0}")]
    StatusNotFound(String),

    /// Creating or initializing a plugin failed
    #[error("failed to start plugin {role}/{name}: {source}")]
    Start {
        role: PluginRole,
        name: String,
        #[source]
        source: Box<PluginError>,
    },

    /// Options were missing, malformed or unknown
    #[error("plugin config error: {message}")]
    Config { message: String },

    #[error("plugin runtime error: {message}")]
    Runtime {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// The plugin's external side went away (sink closed, peer gone)
    #[error("plugin transport error: {message}")]
    Transport { message: String },

    #[error("plugin store error: {0}")]
    Store(#[from] StoreError),

    /// The run loop observed cancellation
    #[error("plugin cancelled")]
    Cancelled,
}

impl PluginError {
    pub fn config(message: impl Into<String>) -> Self {
        PluginError::Config {
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        PluginError::Runtime {
            message: message.into(),
            source: None,
        }
    }

    /// Category of this error; wrapped errors report their cause's kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginError::Config { .. } => ErrorKind::Validation,
            PluginError::Transport { .. } => ErrorKind::Network,
            PluginError::Cancelled => ErrorKind::Cancelled,
            PluginError::Store(err) => err.kind(),
            PluginError::Start { source, .. } => match source.kind() {
                ErrorKind::Validation => ErrorKind::Validation,
                _ => ErrorKind::Plugin,
            },
            _ => ErrorKind::Plugin,
        }
    }

    /// True if this error only reports cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            PluginError::Cancelled => true,
            PluginError::Store(StoreError::Cancelled) => true,
            _ => false,
        }
    }
}
