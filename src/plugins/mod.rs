//! Built-in plugins
//!
//! | role      | name        | does                                          |
//! |-----------|-------------|-----------------------------------------------|
//! | ingress   | `synthetic` | writes a fixed payload at `fps` frames/second |
//! | transform | `marker`    | appends a marker byte to each new frame       |
//! | egress    | `channel`   | forwards new frames to an mpsc sink           |

pub mod channel;
pub mod marker;
mod scan;
pub mod synthetic;

use tokio::sync::mpsc;

use crate::plugin::{PluginError, PluginRegistry, PluginRole};
use crate::storage::Frame;

pub use channel::{ChannelEgress, ChannelOptions};
pub use marker::{MarkerOptions, MarkerTransform};
pub use synthetic::{SyntheticIngress, SyntheticOptions};

/// Register every built-in plugin
///
/// Each `channel` egress instance sends to a clone of `sink`.
pub fn register_builtin(
    registry: &PluginRegistry,
    sink: mpsc::Sender<Frame>,
) -> Result<(), PluginError> {
    registry.register(PluginRole::Ingress, synthetic::NAME, || {
        Box::new(SyntheticIngress::new())
    })?;
    registry.register(PluginRole::Transform, marker::NAME, || {
        Box::new(MarkerTransform::new())
    })?;
    registry.register(PluginRole::Egress, channel::NAME, move || {
        Box::new(ChannelEgress::new(sink.clone()))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtin() {
        let registry = PluginRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        register_builtin(&registry, tx.clone()).unwrap();

        assert_eq!(registry.len(), 3);
        assert!(registry.create(PluginRole::Ingress, "synthetic").is_ok());
        assert!(registry.create(PluginRole::Transform, "marker").is_ok());
        assert!(registry.create(PluginRole::Egress, "channel").is_ok());

        assert!(matches!(
            register_builtin(&registry, tx),
            Err(PluginError::AlreadyRegistered { .. })
        ));
    }
}
