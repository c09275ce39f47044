//! Per-session change notification
//!
//! Backends publish a [`FrameEvent`] after every successful put or delete.
//! Consumers that subscribe can react without waiting for their next poll tick.
//! Delivery is best-effort: a receiver that lags or subscribes late still has
//! to reconcile by listing the session.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Change to a session's frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A frame was stored (inserted or overwritten)
    Stored { session_id: String, index: i64 },
    /// The session and all its frames were removed
    SessionDeleted { session_id: String },
}

impl FrameEvent {
    pub fn session_id(&self) -> &str {
        match self {
            FrameEvent::Stored { session_id, .. } | FrameEvent::SessionDeleted { session_id } => {
                session_id
            }
        }
    }
}

/// Broadcast channels keyed by session ID, created on first subscribe
pub(crate) struct Notifier {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<FrameEvent>>>,
}

impl Notifier {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn subscribe(&self, session_id: &str) -> broadcast::Receiver<FrameEvent> {
        let mut channels = self.channels.lock();
        channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub(crate) fn stored(&self, session_id: &str, index: i64) {
        self.publish(
            session_id,
            FrameEvent::Stored {
                session_id: session_id.to_string(),
                index,
            },
        );
    }

    /// Publish the deletion and drop the channel; existing receivers see it closed afterwards
    pub(crate) fn deleted(&self, session_id: &str) {
        let tx = self.channels.lock().remove(session_id);
        if let Some(tx) = tx {
            let _ = tx.send(FrameEvent::SessionDeleted {
                session_id: session_id.to_string(),
            });
        }
    }

    /// Drop every channel; receivers observe `Closed`
    pub(crate) fn close(&self) {
        self.channels.lock().clear();
    }

    fn publish(&self, session_id: &str, event: FrameEvent) {
        let mut channels = self.channels.lock();
        if let Some(tx) = channels.get(session_id) {
            if tx.send(event).is_err() {
                // Every receiver is gone
                channels.remove(session_id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }
}
