//! Volatile in-process frame store
//!
//! Frames live in a nested map `session -> index -> Frame` behind a single
//! `RwLock`. A session is active exactly while it has an entry in the outer
//! map, so the frames and the active marker can never disagree.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use super::context::OpContext;
use super::error::StoreError;
use super::frame::Frame;
use super::notify::{FrameEvent, Notifier};
use super::{validate, FrameStore};

#[derive(Default)]
struct MemoryState {
    /// `BTreeMap` keeps each session ordered by index
    sessions: HashMap<String, BTreeMap<i64, Frame>>,
    closed: bool,
}

impl MemoryState {
    fn open(&self) -> Result<&HashMap<String, BTreeMap<i64, Frame>>, StoreError> {
        if self.closed {
            return Err(StoreError::closed());
        }
        Ok(&self.sessions)
    }

    fn open_mut(&mut self) -> Result<&mut HashMap<String, BTreeMap<i64, Frame>>, StoreError> {
        if self.closed {
            return Err(StoreError::closed());
        }
        Ok(&mut self.sessions)
    }
}

/// In-memory [`FrameStore`]
///
/// Reads take the lock shared, writes take it exclusive. Nothing survives the
/// process; call [`delete_session`](FrameStore::delete_session) to bound memory.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    notifier: Notifier,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create an empty store with a custom per-session notification buffer
    pub fn with_capacity(notify_capacity: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            notifier: Notifier::new(notify_capacity),
        }
    }

    /// Number of frames held for a session (0 if unknown)
    pub async fn frame_count(&self, session_id: &str) -> usize {
        let state = self.state.read().await;
        state.sessions.get(session_id).map_or(0, BTreeMap::len)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put_frame(&self, ctx: &OpContext, frame: Frame) -> Result<(), StoreError> {
        validate(&frame)?;

        let (session_id, index) = ctx
            .write(async {
                let mut state = self.state.write().await;
                let sessions = state.open_mut()?;

                let session_id = frame.session_id.clone();
                let index = frame.index;
                let is_new = !sessions.contains_key(&session_id);
                sessions
                    .entry(session_id.clone())
                    .or_default()
                    .insert(index, frame);

                if is_new {
                    tracing::debug!(session = %session_id, "Session registered");
                }
                Ok((session_id, index))
            })
            .await?;

        self.notifier.stored(&session_id, index);
        Ok(())
    }

    async fn get_frame(
        &self,
        ctx: &OpContext,
        session_id: &str,
        index: i64,
    ) -> Result<Frame, StoreError> {
        ctx.read(async {
            let state = self.state.read().await;
            let frames = state
                .open()?
                .get(session_id)
                .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

            frames
                .get(&index)
                .cloned()
                .ok_or_else(|| StoreError::FrameNotFound {
                    session_id: session_id.to_string(),
                    index,
                })
        })
        .await
    }

    async fn list_frames(
        &self,
        ctx: &OpContext,
        session_id: &str,
    ) -> Result<Vec<Frame>, StoreError> {
        ctx.read(async {
            let state = self.state.read().await;
            let frames = state
                .open()?
                .get(session_id)
                .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

            Ok(frames.values().cloned().collect())
        })
        .await
    }

    async fn list_sessions(&self, ctx: &OpContext) -> Result<Vec<String>, StoreError> {
        ctx.read(async {
            let state = self.state.read().await;
            let mut sessions: Vec<String> = state.open()?.keys().cloned().collect();
            sessions.sort();
            Ok(sessions)
        })
        .await
    }

    async fn delete_session(&self, ctx: &OpContext, session_id: &str) -> Result<(), StoreError> {
        let removed = ctx
            .write(async {
                let mut state = self.state.write().await;
                state
                    .open_mut()?
                    .remove(session_id)
                    .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))
            })
            .await?;

        tracing::debug!(
            session = %session_id,
            frames = removed.len(),
            "Session deleted"
        );
        self.notifier.deleted(session_id);
        Ok(())
    }

    fn subscribe(&self, session_id: &str) -> broadcast::Receiver<FrameEvent> {
        self.notifier.subscribe(session_id)
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.sessions.clear();
        state.closed = true;
        self.notifier.close();

        tracing::debug!("Memory store closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::new();
        let ctx = OpContext::background();

        assert_ok!(
            store
                .put_frame(&ctx, Frame::video("s1", 0, Bytes::from_static(b"a")))
                .await
        );

        let frame = store.get_frame(&ctx, "s1", 0).await.unwrap();
        assert_eq!(frame.data, Bytes::from_static(b"a"));
        assert_eq!(store.frame_count("s1").await, 1);
    }

    #[tokio::test]
    async fn test_empty_session_id_rejected() {
        let store = MemoryStore::new();
        let result = store
            .put_frame(&OpContext::background(), Frame::video("", 0, Bytes::new()))
            .await;

        assert!(matches!(result, Err(StoreError::InvalidFrame(_))));
        assert!(store
            .list_sessions(&OpContext::background())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_closed_store_unavailable() {
        let store = MemoryStore::new();
        let ctx = OpContext::background();
        store
            .put_frame(&ctx, Frame::video("s1", 0, Bytes::new()))
            .await
            .unwrap();

        assert_ok!(store.close().await);

        let err = assert_err!(store.list_sessions(&ctx).await);
        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert_err!(store.put_frame(&ctx, Frame::video("s1", 1, Bytes::new())).await);
    }
}
