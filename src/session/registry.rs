//! Session registry implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::config::SessionConfig;
use super::info::{generate_session_id, Metadata, SessionInfo};

struct SessionEntry {
    info: SessionInfo,
    /// Monotonic creation time used for expiry
    created: Instant,
}

/// Registry of control-plane sessions
///
/// Thread-safe via `RwLock`. The reaper takes the write lock only for the
/// eviction scan, never across its sleep.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    config: SessionConfig,
    reaper_started: AtomicBool,
}

impl SessionRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            reaper_started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a session with a fresh unique ID
    pub async fn create_session(
        &self,
        session_type: impl Into<String>,
        metadata: Metadata,
    ) -> SessionInfo {
        let created_at = Utc::now();
        let info = SessionInfo {
            id: generate_session_id(created_at),
            created_at,
            session_type: session_type.into(),
            metadata,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            info.id.clone(),
            SessionEntry {
                info: info.clone(),
                created: Instant::now(),
            },
        );

        tracing::info!(
            session = %info.id,
            session_type = %info.session_type,
            "Session created"
        );
        info
    }

    /// Look up a session
    pub async fn get_session(&self, id: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions.get(id).map(|entry| entry.info.clone())
    }

    /// Remove a session; unknown IDs are ignored
    pub async fn cleanup_session(&self, id: &str) {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            tracing::info!(session = %id, "Session cleaned up");
        }
    }

    /// All current sessions, in no particular order
    pub async fn get_active_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions.values().map(|entry| entry.info.clone()).collect()
    }

    /// Number of current sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Evict every session older than `max_age`; returns how many were removed
    pub async fn reap_expired(&self) -> usize {
        let now = Instant::now();
        let max_age = self.config.max_age;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let expired = now.duration_since(entry.created) > max_age;
            if expired {
                tracing::info!(session = %id, "Session expired");
            }
            !expired
        });
        before - sessions.len()
    }

    /// Spawn the background reaper
    ///
    /// Only one reaper runs per registry: later calls return `None`. The task
    /// exits when `cancel` fires.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Option<tokio::task::JoinHandle<()>> {
        if self.reaper_started.swap(true, Ordering::AcqRel) {
            tracing::warn!("Session reaper already running");
            return None;
        }

        let registry = Arc::clone(self);
        let interval = registry.config.sweep_interval;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(
                interval_ms = interval.as_millis() as u64,
                max_age_secs = registry.config.max_age.as_secs(),
                "Session reaper started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = registry.reap_expired().await;
                        if removed > 0 {
                            tracing::debug!(removed, "Session reaper sweep");
                        }
                    }
                }
            }

            tracing::debug!("Session reaper stopped");
        }))
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
