//! Plugin factory registry

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::traits::Plugin;
use super::types::{PluginError, PluginRole};

/// Produces a fresh, uninitialized plugin instance
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Maps `(role, name)` to a factory
///
/// Registration is write-once: a key cannot be replaced or removed.
#[derive(Default)]
pub struct PluginRegistry {
    factories: RwLock<HashMap<(PluginRole, String), PluginFactory>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `(role, name)`
    pub fn register<F>(
        &self,
        role: PluginRole,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), PluginError>
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut factories = self.factories.write();
        let key = (role, name);
        if factories.contains_key(&key) {
            let (role, name) = key;
            return Err(PluginError::AlreadyRegistered { role, name });
        }

        tracing::debug!(role = %role, name = %key.1, "Plugin registered");
        factories.insert(key, Arc::new(factory));
        Ok(())
    }

    /// Build a new instance of `(role, name)`
    ///
    /// The factory runs outside the registry lock.
    pub fn create(&self, role: PluginRole, name: &str) -> Result<Box<dyn Plugin>, PluginError> {
        let factory = self
            .factories
            .read()
            .get(&(role, name.to_string()))
            .cloned()
            .ok_or_else(|| PluginError::NotFound {
                role,
                name: name.to_string(),
            })?;

        let plugin = factory();
        if plugin.role() != role {
            return Err(PluginError::RoleMismatch {
                name: name.to_string(),
                expected: role,
                actual: plugin.role(),
            });
        }
        Ok(plugin)
    }

    pub fn contains(&self, role: PluginRole, name: &str) -> bool {
        self.factories
            .read()
            .contains_key(&(role, name.to_string()))
    }

    /// Registered keys, sorted by role then name
    pub fn registered(&self) -> Vec<(PluginRole, String)> {
        let mut keys: Vec<_> = self.factories.read().keys().cloned().collect();
        keys.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
        keys
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}
