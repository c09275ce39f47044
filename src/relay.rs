//! Process-level facade
//!
//! [`Relay`] owns one frame store, one session registry (with its reaper) and
//! one plugin manager with the built-in plugins registered. It exposes the
//! control-plane operations an outer HTTP or CLI layer calls, all returning
//! [`crate::Result`].

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, ErrorKind, Result};
use crate::plugin::{PluginConfig, PluginManager, PluginRegistry, PluginRole, PluginStatus};
use crate::plugins::register_builtin;
use crate::session::{Metadata, SessionConfig, SessionInfo, SessionRegistry};
use crate::storage::{self, Frame, FrameStore, StorageConfig};

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Frame store backend
    pub storage: StorageConfig,

    /// Session expiry
    pub sessions: SessionConfig,

    /// Frames buffered toward the `channel` egress sink
    pub egress_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            sessions: SessionConfig::default(),
            egress_capacity: 1024,
        }
    }
}

impl RelayConfig {
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn sessions(mut self, sessions: SessionConfig) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn egress_capacity(mut self, capacity: usize) -> Self {
        self.egress_capacity = capacity.max(1);
        self
    }
}

/// Frame store, session registry and plugin manager wired together
pub struct Relay {
    store: Arc<dyn FrameStore>,
    sessions: Arc<SessionRegistry>,
    plugins: PluginManager,
    cancel: CancellationToken,
    reaper: Mutex<Option<JoinHandle<()>>>,
    egress: Mutex<Option<mpsc::Receiver<Frame>>>,
}

impl Relay {
    /// Open the store and start background tasks
    pub async fn start(config: RelayConfig) -> Result<Self> {
        let store = storage::open(&config.storage).await?;
        let cancel = CancellationToken::new();

        let sessions = Arc::new(SessionRegistry::with_config(config.sessions.clone()));
        let reaper = sessions.spawn_reaper(cancel.child_token());

        let (sink, egress) = mpsc::channel(config.egress_capacity.max(1));
        let registry = Arc::new(PluginRegistry::new());
        register_builtin(&registry, sink)?;

        let plugins =
            PluginManager::new(registry, Arc::clone(&store)).with_cancel(cancel.child_token());

        tracing::info!(backend = store.backend(), "Relay started");
        Ok(Self {
            store,
            sessions,
            plugins,
            cancel,
            reaper: Mutex::new(reaper),
            egress: Mutex::new(Some(egress)),
        })
    }

    pub fn store(&self) -> &Arc<dyn FrameStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    /// Receiver fed by `channel` egress instances; available once
    pub fn take_egress(&self) -> Option<mpsc::Receiver<Frame>> {
        self.egress.lock().take()
    }

    pub async fn create_session(
        &self,
        session_type: impl Into<String>,
        metadata: Metadata,
    ) -> SessionInfo {
        self.sessions.create_session(session_type, metadata).await
    }

    pub async fn get_session(&self, id: &str) -> Result<SessionInfo> {
        self.sessions.get_session(id).await.ok_or_else(|| {
            Error::new(ErrorKind::Validation, format!("session not found: {}", id))
        })
    }

    pub async fn cleanup_session(&self, id: &str) {
        self.sessions.cleanup_session(id).await
    }

    pub async fn active_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.get_active_sessions().await
    }

    pub async fn start_plugin(
        &self,
        role: PluginRole,
        name: &str,
        config: PluginConfig,
    ) -> Result<()> {
        Ok(self.plugins.start_plugin(role, name, config).await?)
    }

    pub fn stop_plugin(&self, name: &str) -> Result<()> {
        Ok(self.plugins.stop_plugin(name)?)
    }

    pub fn plugin_status(&self, name: &str) -> Result<PluginStatus> {
        Ok(self.plugins.get_plugin_status(name)?)
    }

    /// Stop every plugin, then the reaper, then close the store
    pub async fn shutdown(&self) -> Result<()> {
        self.plugins.shutdown().await;
        self.cancel.cancel();

        let reaper = self.reaper.lock().take();
        if let Some(reaper) = reaper {
            if let Err(e) = reaper.await {
                tracing::error!(error = %e, "Session reaper panicked");
            }
        }

        self.store.close().await?;
        tracing::info!("Relay stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_control_plane() {
        let relay = Relay::start(RelayConfig::default()).await.unwrap();

        let info = relay.create_session("rtsp", Metadata::new()).await;
        assert_eq!(relay.get_session(&info.id).await.unwrap(), info);
        assert_eq!(relay.active_sessions().await.len(), 1);

        relay.cleanup_session(&info.id).await;
        let err = relay.get_session(&info.id).await.unwrap_err();
        assert!(err.is(ErrorKind::Validation));

        relay.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_plugin_errors_carry_kind() {
        let relay = Relay::start(RelayConfig::default()).await.unwrap();

        let err = relay.stop_plugin("synthetic").unwrap_err();
        assert!(err.is(ErrorKind::Plugin));

        let err = relay
            .start_plugin(
                PluginRole::Ingress,
                "synthetic",
                PluginConfig::new().set("fps", 0),
            )
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Validation));
        assert!(relay.plugin_status("synthetic").is_err());

        relay.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_plugins() {
        let relay = Relay::start(RelayConfig::default()).await.unwrap();
        assert!(relay.take_egress().is_some());
        assert!(relay.take_egress().is_none());

        relay
            .start_plugin(PluginRole::Ingress, "synthetic", PluginConfig::new())
            .await
            .unwrap();
        assert!(relay.plugin_status("synthetic").unwrap().running);

        relay.shutdown().await.unwrap();
        assert!(!relay.plugin_status("synthetic").unwrap().running);
    }
}
