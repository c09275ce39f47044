//! Persistent frame store layout
//!
//! # Key schema
//!
//! ```text
//!   <prefix>frames:<session_id>   list  JSON Frame records, append order
//!   <prefix>active_sessions       set   session IDs
//! ```
//!
//! This layout is the only persisted state and must stay stable.
//!
//! Puts append, so overwriting an index leaves the older record in the list.
//! Reads resolve duplicates by keeping the record appended last, which gives
//! the same last-writer-wins result as the in-memory backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::context::OpContext;
use super::error::StoreError;
use super::frame::Frame;
use super::keyspace::KvBackend;
use super::notify::{FrameEvent, Notifier};
use super::{validate, FrameStore};

/// Namespaced key names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySchema {
    prefix: String,
}

impl KeySchema {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// List holding a session's frames
    pub fn frames_key(&self, session_id: &str) -> String {
        format!("{}frames:{}", self.prefix, session_id)
    }

    /// Set holding active session IDs
    pub fn active_sessions_key(&self) -> String {
        format!("{}active_sessions", self.prefix)
    }
}

/// [`FrameStore`] over a list/set keyspace
pub struct PersistentStore<B> {
    backend: B,
    keys: KeySchema,
    notifier: Notifier,
}

impl<B: KvBackend> PersistentStore<B> {
    pub fn new(backend: B, keys: KeySchema, notify_capacity: usize) -> Self {
        Self {
            backend,
            keys,
            notifier: Notifier::new(notify_capacity),
        }
    }

    /// Underlying keyspace
    pub fn backend_ref(&self) -> &B {
        &self.backend
    }

    pub fn keys(&self) -> &KeySchema {
        &self.keys
    }

    async fn read_entries(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        self.backend
            .read_if_member(
                &self.keys.active_sessions_key(),
                session_id,
                &self.keys.frames_key(session_id),
            )
            .await?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))
    }
}

fn decode(session_id: &str, entry: &str) -> Result<Frame, StoreError> {
    serde_json::from_str(entry).map_err(|source| StoreError::Corrupt {
        session_id: session_id.to_string(),
        source,
    })
}

#[async_trait]
impl<B: KvBackend> FrameStore for PersistentStore<B> {
    fn backend(&self) -> &'static str {
        self.backend.name()
    }

    async fn put_frame(&self, ctx: &OpContext, frame: Frame) -> Result<(), StoreError> {
        validate(&frame)?;

        let encoded = serde_json::to_string(&frame).map_err(|e| StoreError::InvalidFrame(
            format!("failed to encode frame: {}", e),
        ))?;

        ctx.write(self.backend.push_and_mark(
            &self.keys.frames_key(&frame.session_id),
            encoded,
            &self.keys.active_sessions_key(),
            &frame.session_id,
        ))
        .await?;

        self.notifier.stored(&frame.session_id, frame.index);
        Ok(())
    }

    async fn get_frame(
        &self,
        ctx: &OpContext,
        session_id: &str,
        index: i64,
    ) -> Result<Frame, StoreError> {
        let entries = ctx.read(self.read_entries(session_id)).await?;

        // Newest record wins, so scan from the tail
        for entry in entries.iter().rev() {
            let frame = decode(session_id, entry)?;
            if frame.index == index {
                return Ok(frame);
            }
        }

        Err(StoreError::FrameNotFound {
            session_id: session_id.to_string(),
            index,
        })
    }

    async fn list_frames(
        &self,
        ctx: &OpContext,
        session_id: &str,
    ) -> Result<Vec<Frame>, StoreError> {
        let entries = ctx.read(self.read_entries(session_id)).await?;

        let mut by_index = BTreeMap::new();
        for entry in &entries {
            let frame = decode(session_id, entry)?;
            by_index.insert(frame.index, frame);
        }

        if by_index.len() < entries.len() {
            tracing::trace!(
                session = %session_id,
                records = entries.len(),
                frames = by_index.len(),
                "Collapsed overwritten frame records"
            );
        }

        Ok(by_index.into_values().collect())
    }

    async fn list_sessions(&self, ctx: &OpContext) -> Result<Vec<String>, StoreError> {
        let mut sessions = ctx
            .read(self.backend.members(&self.keys.active_sessions_key()))
            .await?;
        sessions.sort();
        Ok(sessions)
    }

    async fn delete_session(&self, ctx: &OpContext, session_id: &str) -> Result<(), StoreError> {
        let existed = ctx
            .write(self.backend.remove_and_unmark(
                &self.keys.active_sessions_key(),
                session_id,
                &self.keys.frames_key(session_id),
            ))
            .await?;

        if !existed {
            return Err(StoreError::SessionNotFound(session_id.to_string()));
        }

        tracing::debug!(session = %session_id, backend = self.backend.name(), "Session deleted");
        self.notifier.deleted(session_id);
        Ok(())
    }

    fn subscribe(&self, session_id: &str) -> broadcast::Receiver<FrameEvent> {
        self.notifier.subscribe(session_id)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.notifier.close();
        self.backend.close().await?;

        tracing::debug!(backend = self.backend.name(), "Persistent store closed");
        Ok(())
    }
}
