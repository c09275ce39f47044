use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::config::PluginConfig;
use super::types::{PluginError, PluginRole};
use crate::storage::FrameStore;

/// A pipeline stage driven by the [`PluginManager`](super::PluginManager)
///
/// Lifecycle: `initialize()` → `run()` → `stop()`
///
/// `run` blocks until `cancel` fires or a fatal error occurs. On cancellation
/// it finishes any write in flight and returns [`PluginError::Cancelled`].
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Which kind of stage this is
    fn role(&self) -> PluginRole;

    /// Validate and apply configuration. Called once, before `run`.
    async fn initialize(&mut self, config: &PluginConfig) -> Result<(), PluginError>;

    /// Long-running poll loop
    async fn run(
        &mut self,
        cancel: CancellationToken,
        store: Arc<dyn FrameStore>,
    ) -> Result<(), PluginError>;

    /// Release resources after `run` has returned
    async fn stop(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}
