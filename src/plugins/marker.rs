//! Marker transform
//!
//! Appends a marker byte to the payload of each new frame and writes it back
//! under the same index. Stands in for overlay-style transforms such as a
//! watermark: read, derive, overwrite.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::scan::{unseen_frames, Scope};
use crate::pipeline::{CursorSet, PollConfig, Wake};
use crate::plugin::{Plugin, PluginConfig, PluginError, PluginRole};
use crate::storage::{Frame, FrameEvent, FrameStore, MediaType};

/// Registered name
pub const NAME: &str = "marker";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkerOptions {
    /// Byte appended to every processed payload
    pub marker: u8,
    /// Restrict to one session; all active sessions otherwise
    pub session_id: Option<String>,
    /// Restrict to one media type; frames of other types are passed over
    pub media_type: Option<MediaType>,
    pub poll_interval_ms: u64,
    pub op_timeout_ms: u64,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            marker: 0xFF,
            session_id: None,
            media_type: None,
            poll_interval_ms: 100,
            op_timeout_ms: 5000,
        }
    }
}

impl MarkerOptions {
    fn validate(&self) -> Result<(), PluginError> {
        if self.poll_interval_ms == 0 {
            return Err(PluginError::config("poll_interval_ms must be positive"));
        }
        if self.session_id.as_deref() == Some("") {
            return Err(PluginError::config("session_id must not be empty"));
        }
        Ok(())
    }

    fn poll(&self) -> PollConfig {
        PollConfig::default()
            .interval(Duration::from_millis(self.poll_interval_ms))
            .op_timeout(Duration::from_millis(self.op_timeout_ms))
    }

    fn scope(&self) -> Scope {
        Scope {
            session_id: self.session_id.clone(),
            media_type: self.media_type.clone(),
        }
    }
}

/// Transform plugin marking each frame once
#[derive(Debug, Default)]
pub struct MarkerTransform {
    options: Option<MarkerOptions>,
}

impl MarkerTransform {
    pub fn new() -> Self {
        Self::default()
    }
}

fn mark(frame: &Frame, marker: u8) -> Frame {
    let mut data = BytesMut::with_capacity(frame.data.len() + 1);
    data.extend_from_slice(&frame.data);
    data.put_u8(marker);

    let mut marked = frame.clone();
    marked.data = data.freeze();
    marked
}

#[async_trait]
impl Plugin for MarkerTransform {
    fn role(&self) -> PluginRole {
        PluginRole::Transform
    }

    async fn initialize(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        let options: MarkerOptions = config.parse()?;
        options.validate()?;
        self.options = Some(options);
        Ok(())
    }

    async fn run(
        &mut self,
        cancel: CancellationToken,
        store: Arc<dyn FrameStore>,
    ) -> Result<(), PluginError> {
        let options = self
            .options
            .as_ref()
            .ok_or_else(|| PluginError::runtime("marker transform not initialized"))?;

        let poll = options.poll();
        let scope = options.scope();
        let mut poller = scope.poller(&poll, cancel.clone(), &store);
        let mut cursors = CursorSet::new();

        loop {
            match poller.next().await {
                Wake::Cancelled => return Err(PluginError::Cancelled),
                Wake::Changed(FrameEvent::SessionDeleted { session_id }) => {
                    cursors.remove(&session_id);
                    continue;
                }
                Wake::Tick | Wake::Changed(FrameEvent::Stored { .. }) => {}
            }

            let sessions = scope
                .sessions(store.as_ref(), &poll.op_context(&cancel), &mut cursors, NAME)
                .await;

            for session_id in &sessions {
                let cursor = cursors.get_mut(session_id);
                let unseen = unseen_frames(
                    store.as_ref(),
                    &poll.op_context(&cancel),
                    session_id,
                    cursor,
                    NAME,
                )
                .await;

                for frame in &unseen {
                    if cancel.is_cancelled() {
                        break;
                    }
                    if scope.matches(frame) {
                        let ctx = poll.op_context(&cancel);
                        if let Err(e) = store.put_frame(&ctx, mark(frame, options.marker)).await {
                            if cancel.is_cancelled() {
                                break;
                            }
                            // Best effort: the frame is passed over, not retried
                            tracing::warn!(
                                session = %session_id,
                                index = frame.index,
                                error = %e,
                                "Failed to write marked frame"
                            );
                        }
                    }
                    cursor.advance(frame.index);
                }
            }
        }
    }
}
