//! Channel egress
//!
//! Forwards new frames, in index order per session, to an in-process mpsc
//! sink. The receiving side plays the part of an outbound transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::scan::{unseen_frames, Scope};
use crate::pipeline::{CursorSet, PollConfig, Wake};
use crate::plugin::{Plugin, PluginConfig, PluginError, PluginRole};
use crate::storage::{Frame, FrameEvent, FrameStore, MediaType};

/// Registered name
pub const NAME: &str = "channel";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelOptions {
    pub session_id: Option<String>,
    pub media_type: Option<MediaType>,
    pub poll_interval_ms: u64,
    pub op_timeout_ms: u64,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            session_id: None,
            media_type: None,
            poll_interval_ms: 100,
            op_timeout_ms: 5000,
        }
    }
}

/// Egress plugin sending frames to a channel
pub struct ChannelEgress {
    sink: mpsc::Sender<Frame>,
    options: Option<ChannelOptions>,
}

impl ChannelEgress {
    pub fn new(sink: mpsc::Sender<Frame>) -> Self {
        Self {
            sink,
            options: None,
        }
    }
}

#[async_trait]
impl Plugin for ChannelEgress {
    fn role(&self) -> PluginRole {
        PluginRole::Egress
    }

    async fn initialize(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        let options: ChannelOptions = config.parse()?;
        if options.poll_interval_ms == 0 {
            return Err(PluginError::config("poll_interval_ms must be positive"));
        }
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
            .ok_or_else(|| PluginError::runtime("channel egress not initialized"))?;

        let poll = PollConfig::default()
            .interval(Duration::from_millis(options.poll_interval_ms))
            .op_timeout(Duration::from_millis(options.op_timeout_ms));
        let scope = Scope {
            session_id: options.session_id.clone(),
            media_type: options.media_type.clone(),
        };
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

                for frame in unseen {
                    let index = frame.index;
                    if scope.matches(&frame) {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(PluginError::Cancelled),
                            sent = self.sink.send(frame) => {
                                if sent.is_err() {
                                    return Err(PluginError::Transport {
                                        message: "egress sink closed".to_string(),
                                    });
                                }
                            }
                        }
                    }
                    cursor.advance(index);
                }
            }
        }
    }
}
