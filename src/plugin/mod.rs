//! Plugin system
//!
//! Plugins are the pipeline stages: ingress writes frames into the store,
//! transforms rewrite them, egress forwards them out. They never talk to each
//! other directly. The [`FrameStore`](crate::storage::FrameStore) is the only
//! channel between them.
//!
//! - [`PluginRegistry`] maps `(role, name)` to a factory.
//! - [`PluginManager`] creates instances, drives their lifecycle and records
//!   a [`PluginStatus`] per instance name.

pub mod config;
pub mod manager;
pub mod registry;
pub mod traits;
pub mod types;

pub use config::PluginConfig;
pub use manager::PluginManager;
pub use registry::{PluginFactory, PluginRegistry};
pub use traits::Plugin;
pub use types::{PluginError, PluginRole, PluginStatus};
