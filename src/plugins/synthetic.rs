//! Synthetic camera ingress
//!
//! Writes a fixed payload as consecutive frames at a steady rate. Useful as a
//! stand-in for a capture device when exercising a pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::plugin::{Plugin, PluginConfig, PluginError, PluginRole};
use crate::storage::{Frame, FrameStore, MediaType, OpContext};

/// Registered name
pub const NAME: &str = "synthetic";

/// Highest rate whose tick period is still a whole nanosecond
pub const MAX_FPS: u32 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticOptions {
    /// Device identifier; also the session ID unless `session_id` is set
    pub device_id: String,
    pub session_id: Option<String>,
    /// Frames per second, between 1 and [`MAX_FPS`]
    pub fps: u32,
    /// Stop cleanly after this many frames
    pub frame_count: Option<u64>,
    pub media_type: MediaType,
    pub codec: String,
    pub payload: String,
    pub start_index: i64,
    pub op_timeout_ms: u64,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            device_id: "camera0".to_string(),
            session_id: None,
            fps: 30,
            frame_count: None,
            media_type: MediaType::Video,
            codec: String::new(),
            payload: "mock frame data".to_string(),
            start_index: 0,
            op_timeout_ms: 5000,
        }
    }
}

impl SyntheticOptions {
    fn validate(&self) -> Result<(), PluginError> {
        if self.fps == 0 {
            return Err(PluginError::config("fps must be a positive integer"));
        }
        if self.fps > MAX_FPS {
            return Err(PluginError::config(format!("fps must be at most {}", MAX_FPS)));
        }
        if self.session_id().is_empty() {
            return Err(PluginError::config("device_id or session_id must be set"));
        }
        Ok(())
    }

    pub fn session_id(&self) -> &str {
        self.session_id.as_deref().unwrap_or(&self.device_id)
    }
}

/// Ingress plugin producing synthetic frames
#[derive(Debug, Default)]
pub struct SyntheticIngress {
    options: Option<SyntheticOptions>,
}

impl SyntheticIngress {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Plugin for SyntheticIngress {
    fn role(&self) -> PluginRole {
        PluginRole::Ingress
    }

    async fn initialize(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        let options: SyntheticOptions = config.parse()?;
        options.validate()?;

        tracing::debug!(
            device = %options.device_id,
            session = %options.session_id(),
            fps = options.fps,
            "Synthetic ingress configured"
        );
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
            .ok_or_else(|| PluginError::runtime("synthetic ingress not initialized"))?;

        let session_id = options.session_id().to_string();
        let payload = Bytes::from(options.payload.clone());
        let op_timeout = Duration::from_millis(options.op_timeout_ms);
        let period = (Duration::from_secs(1) / options.fps).max(Duration::from_nanos(1));

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut index = options.start_index;
        let mut written: u64 = 0;

        loop {
            if options.frame_count.is_some_and(|max| written >= max) {
                tracing::info!(session = %session_id, frames = written, "Synthetic ingress done");
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PluginError::Cancelled),
                _ = ticker.tick() => {}
            }

            let frame = Frame::new(
                session_id.clone(),
                index,
                payload.clone(),
                options.media_type.clone(),
                options.codec.clone(),
            )
            .key_frame(written % u64::from(options.fps) == 0);

            let ctx = OpContext::with_cancel(cancel.clone()).timeout(op_timeout);
            if let Err(e) = store.put_frame(&ctx, frame).await {
                if cancel.is_cancelled() {
                    return Err(PluginError::Cancelled);
                }
                tracing::error!(session = %session_id, index, error = %e, "Ingress write failed");
                return Err(e.into());
            }

            index += 1;
            written += 1;
        }
    }
}
