//! Plugin lifecycle manager
//!
//! Each started plugin runs in its own tokio task with a child cancellation
//! token. The manager keeps one ledger entry per instance name:
//!
//! ```text
//!   start_plugin ──► create ─► initialize ─► spawn run ──► status { running: true }
//!   stop_plugin  ──► cancel token ───────────────────────► status { running: false }
//!   run returns  ──► stop() hook ────────────────────────► status { running: false, last_error }
//! ```
//!
//! A status is never removed. Every start bumps a generation counter so a
//! task from an earlier run cannot overwrite the status of a restart. A run
//! that is still winding down when its name restarts is kept as retired and
//! joined by [`PluginManager::shutdown`]. A panic in `run` ends the run as a
//! failure and is recorded as its `last_error`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::config::PluginConfig;
use super::registry::PluginRegistry;
use super::types::{PluginError, PluginRole, PluginStatus};
use crate::storage::FrameStore;

struct Instance {
    status: PluginStatus,
    role: PluginRole,
    generation: u64,
    /// Present while the current run has not been stopped
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
    /// Tasks of earlier runs under this name that may still be finishing
    retired: Vec<JoinHandle<()>>,
}

impl Instance {
    fn take_tasks(&mut self) -> Vec<JoinHandle<()>> {
        let mut tasks = std::mem::take(&mut self.retired);
        tasks.extend(self.handle.take());
        tasks
    }
}

type Ledger = Arc<Mutex<HashMap<String, Instance>>>;

/// Starts, stops and tracks plugin instances
pub struct PluginManager {
    registry: Arc<PluginRegistry>,
    store: Arc<dyn FrameStore>,
    instances: Ledger,
    generation: AtomicU64,
    cancel: CancellationToken,
}

impl PluginManager {
    pub fn new(registry: Arc<PluginRegistry>, store: Arc<dyn FrameStore>) -> Self {
        Self {
            registry,
            store,
            instances: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Derive every run token from `cancel`, so cancelling it stops all plugins
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Create, initialize and launch the plugin registered as `(role, name)`
    ///
    /// Status is only recorded once `initialize` succeeds. Starting a name that
    /// is already running returns [`PluginError::AlreadyRunning`].
    pub async fn start_plugin(
        &self,
        role: PluginRole,
        name: &str,
        config: PluginConfig,
    ) -> Result<(), PluginError> {
        if self.is_running(name) {
            return Err(PluginError::AlreadyRunning(name.to_string()));
        }

        let start_error = |source: PluginError| PluginError::Start {
            role,
            name: name.to_string(),
            source: Box::new(source),
        };

        let mut plugin = self.registry.create(role, name).map_err(start_error)?;
        if let Err(e) = plugin.initialize(&config).await {
            tracing::warn!(role = %role, plugin = %name, error = %e, "Plugin initialization failed");
            return Err(start_error(e));
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = self.cancel.child_token();

        {
            let mut instances = self.instances.lock();
            if instances.get(name).is_some_and(|i| i.status.running) {
                // Lost a race with a concurrent start of the same name
                return Err(PluginError::AlreadyRunning(name.to_string()));
            }
            let mut retired = instances
                .get_mut(name)
                .map(Instance::take_tasks)
                .unwrap_or_default();
            retired.retain(|task| !task.is_finished());

            instances.insert(
                name.to_string(),
                Instance {
                    status: PluginStatus {
                        running: true,
                        start_time: Utc::now(),
                        last_error: None,
                    },
                    role,
                    generation,
                    cancel: Some(cancel.clone()),
                    handle: None,
                    retired,
                },
            );
        }

        let instances = Arc::clone(&self.instances);
        let store = Arc::clone(&self.store);
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            let run_name = task_name.clone();
            let run = tokio::spawn(async move {
                let result = plugin.run(cancel, store).await;
                if let Err(e) = plugin.stop().await {
                    tracing::warn!(plugin = %run_name, error = %e, "Plugin stop hook failed");
                }
                result
            });
            let result = run.await.unwrap_or_else(|e| Err(run_panicked(e)));

            let last_error = match &result {
                Ok(()) => {
                    tracing::info!(plugin = %task_name, "Plugin finished");
                    None
                }
                Err(e) if e.is_cancelled() => {
                    tracing::info!(plugin = %task_name, "Plugin stopped");
                    None
                }
                Err(e) => {
                    tracing::error!(plugin = %task_name, error = %e, "Plugin failed");
                    Some(e.to_string())
                }
            };

            let mut instances = instances.lock();
            if let Some(instance) = instances.get_mut(&task_name) {
                if instance.generation == generation {
                    instance.status.running = false;
                    instance.cancel = None;
                    if last_error.is_some() {
                        instance.status.last_error = last_error;
                    }
                }
            }
        });

        if let Some(instance) = self.instances.lock().get_mut(name) {
            if instance.generation == generation {
                instance.handle = Some(handle);
            } else {
                // Stopped and restarted before the handle was recorded
                instance.retired.push(handle);
            }
        }

        tracing::info!(role = %role, plugin = %name, "Plugin started");
        Ok(())
    }

    /// Signal a running plugin to stop and mark it not running
    ///
    /// Returns once the signal is sent. The plugin finishes its in-flight write
    /// and its `stop` hook in the background.
    pub fn stop_plugin(&self, name: &str) -> Result<(), PluginError> {
        let mut instances = self.instances.lock();
        let instance = instances
            .get_mut(name)
            .filter(|i| i.status.running)
            .ok_or_else(|| PluginError::NotRunning(name.to_string()))?;

        instance.status.running = false;
        if let Some(cancel) = instance.cancel.take() {
            cancel.cancel();
        }

        tracing::info!(role = %instance.role, plugin = %name, "Plugin stop requested");
        Ok(())
    }

    /// Status of the named instance
    pub fn get_plugin_status(&self, name: &str) -> Result<PluginStatus, PluginError> {
        self.instances
            .lock()
            .get(name)
            .map(|i| i.status.clone())
            .ok_or_else(|| PluginError::StatusNotFound(name.to_string()))
    }

    /// Every recorded status, sorted by instance name
    pub fn statuses(&self) -> Vec<(String, PluginStatus)> {
        let mut statuses: Vec<_> = self
            .instances
            .lock()
            .iter()
            .map(|(name, i)| (name.clone(), i.status.clone()))
            .collect();
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        statuses
    }

    fn is_running(&self, name: &str) -> bool {
        self.instances
            .lock()
            .get(name)
            .is_some_and(|i| i.status.running)
    }

    /// Stop every plugin and wait for all run tasks, retired ones included,
    /// to finish
    pub async fn shutdown(&self) {
        let handles: Vec<(String, JoinHandle<()>)> = {
            let mut instances = self.instances.lock();
            instances
                .iter_mut()
                .flat_map(|(name, instance)| {
                    instance.status.running = false;
                    if let Some(cancel) = instance.cancel.take() {
                        cancel.cancel();
                    }
                    instance
                        .take_tasks()
                        .into_iter()
                        .map(|h| (name.clone(), h))
                        .collect::<Vec<_>>()
                })
                .collect()
        };

        for (name, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!(plugin = %name, error = %e, "Plugin task panicked");
            }
        }
        tracing::debug!("Plugin manager shut down");
    }
}

/// Turn a run task that did not complete into a fatal run error
fn run_panicked(err: JoinError) -> PluginError {
    if !err.is_panic() {
        return PluginError::runtime("plugin task aborted");
    }
    let payload: Box<dyn Any + Send> = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    PluginError::runtime(format!("plugin panicked: {}", detail))
}
