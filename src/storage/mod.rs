//! Frame storage
//!
//! The [`FrameStore`] trait is the only way runners exchange frames. It is an
//! ordered key/value store partitioned by session:
//!
//! ```text
//!   session "cam1" ──► index 0 ─► Frame
//!                      index 1 ─► Frame      list_frames("cam1") ──► [0, 1, 2] sorted
//!                      index 2 ─► Frame
//!   session "cam2" ──► ...                   list_sessions()     ──► ["cam1", "cam2"]
//! ```
//!
//! # Backends
//!
//! - [`MemoryStore`]: nested maps behind one `RwLock`. Volatile.
//! - [`PersistentStore`]: JSON frames in a per-session list plus a set of active
//!   sessions, on any [`KvBackend`]. [`RedisBackend`] is the networked one,
//!   [`MemoryKeyspace`] an embedded one.
//!
//! Both produce identical results for the same sequence of calls. The
//! `conformance` tests run one suite against each.
//!
//! # Guarantees
//!
//! - `list_frames` returns a sorted snapshot that includes every put that
//!   completed before the call started.
//! - A put to an existing `(session, index)` overwrites it (last writer wins).
//! - `delete_session` removes the frames and the active marker together. A
//!   racing reader sees the whole session or none of it. Deleting an unknown
//!   session returns [`StoreError::SessionNotFound`], including a second delete.

pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod keyspace;
pub mod memory;
pub mod notify;
pub mod persistent;
pub mod redis;

#[cfg(test)]
mod conformance;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

pub use config::{BackendConfig, RedisConfig, StorageConfig};
pub use context::OpContext;
pub use error::StoreError;
pub use frame::{CodecType, Frame, MediaType};
pub use keyspace::{KvBackend, MemoryKeyspace};
pub use memory::MemoryStore;
pub use notify::FrameEvent;
pub use persistent::{KeySchema, PersistentStore};
pub use self::redis::RedisBackend;

/// Session-partitioned, index-ordered frame storage
///
/// Implementations are shared between runners behind an `Arc` and must be safe
/// under arbitrary concurrent callers.
#[async_trait]
pub trait FrameStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// Upsert a frame by `(session_id, index)` and mark its session active
    async fn put_frame(&self, ctx: &OpContext, frame: Frame) -> Result<(), StoreError>;

    /// Point lookup
    async fn get_frame(
        &self,
        ctx: &OpContext,
        session_id: &str,
        index: i64,
    ) -> Result<Frame, StoreError>;

    /// Snapshot of a session's frames sorted by ascending index
    async fn list_frames(&self, ctx: &OpContext, session_id: &str)
        -> Result<Vec<Frame>, StoreError>;

    /// Active session IDs, sorted alphabetically
    async fn list_sessions(&self, ctx: &OpContext) -> Result<Vec<String>, StoreError>;

    /// Remove a session's frames and active marker as one unit
    async fn delete_session(&self, ctx: &OpContext, session_id: &str) -> Result<(), StoreError>;

    /// Receive [`FrameEvent`]s for one session
    ///
    /// Events are only published for changes made through this store instance.
    fn subscribe(&self, session_id: &str) -> broadcast::Receiver<FrameEvent>;

    /// Release backend resources; no other method may be called afterwards
    async fn close(&self) -> Result<(), StoreError>;
}

/// Open the backend selected by `config`
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn FrameStore>, StoreError> {
    let store: Arc<dyn FrameStore> = match &config.backend {
        BackendConfig::Memory => Arc::new(MemoryStore::with_capacity(config.notify_capacity)),
        BackendConfig::Redis(redis) => {
            let backend = RedisBackend::connect(redis).await?;
            Arc::new(PersistentStore::new(
                backend,
                KeySchema::new(redis.prefix.clone()),
                config.notify_capacity,
            ))
        }
    };

    tracing::info!(backend = store.backend(), "Frame store opened");
    Ok(store)
}

pub(crate) fn validate(frame: &Frame) -> Result<(), StoreError> {
    if frame.session_id.is_empty() {
        return Err(StoreError::InvalidFrame("empty session id".to_string()));
    }
    Ok(())
}
