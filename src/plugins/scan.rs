//! Shared polling steps for the reading plugins

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::pipeline::{CursorSet, PollConfig, Poller, ReadCursor};
use crate::storage::{Frame, FrameStore, MediaType, OpContext};

/// Which sessions and frames a reading runner looks at
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    /// One session, or every active session when `None`
    pub session_id: Option<String>,
    pub media_type: Option<MediaType>,
}

impl Scope {
    pub(crate) fn matches(&self, frame: &Frame) -> bool {
        self.media_type
            .as_ref()
            .map_or(true, |m| &frame.media_type == m)
    }

    /// Poller for this scope; a single-session scope also wakes on its changes
    pub(crate) fn poller(
        &self,
        poll: &PollConfig,
        cancel: CancellationToken,
        store: &Arc<dyn FrameStore>,
    ) -> Poller {
        let poller = poll.poller(cancel);
        match &self.session_id {
            Some(session_id) => poller.watch(Arc::clone(store), session_id.clone()),
            None => poller,
        }
    }

    /// Sessions to visit on this wake
    ///
    /// A failed listing is logged and yields nothing; the next wake retries.
    pub(crate) async fn sessions(
        &self,
        store: &dyn FrameStore,
        ctx: &OpContext,
        cursors: &mut CursorSet,
        runner: &str,
    ) -> Vec<String> {
        if let Some(session_id) = &self.session_id {
            return vec![session_id.clone()];
        }

        match store.list_sessions(ctx).await {
            Ok(sessions) => {
                cursors.retain_sessions(&sessions);
                sessions
            }
            Err(e) => {
                if !ctx.is_cancelled() {
                    tracing::warn!(plugin = runner, error = %e, "Failed to list sessions");
                }
                Vec::new()
            }
        }
    }
}

/// Frames of `session_id` past `cursor`, in index order
///
/// An unknown session and a failed read both yield nothing. Read failures are
/// logged; the caller retries on its next wake.
pub(crate) async fn unseen_frames(
    store: &dyn FrameStore,
    ctx: &OpContext,
    session_id: &str,
    cursor: &ReadCursor,
    runner: &str,
) -> Vec<Frame> {
    match store.list_frames(ctx, session_id).await {
        Ok(frames) => cursor.unseen(&frames).to_vec(),
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => {
            if !ctx.is_cancelled() {
                tracing::warn!(
                    plugin = runner,
                    session = %session_id,
                    error = %e,
                    "Failed to list frames"
                );
            }
            Vec::new()
        }
    }
}
