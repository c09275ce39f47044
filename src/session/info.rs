//! Control-plane session records

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Free-form session metadata
pub type Metadata = HashMap<String, serde_json::Value>;

/// Control-plane view of a session
///
/// Independent of the frame store: a session here need not have frames, and
/// frames may be stored under IDs this registry never issued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    /// Unique session ID
    pub id: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Session type, e.g. "webrtc" or "rtsp"
    #[serde(rename = "type")]
    pub session_type: String,

    /// Caller-supplied metadata
    pub metadata: Metadata,
}

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Generate a session ID: a wall-clock stamp plus a process-wide sequence
///
/// The stamp keeps IDs readable and roughly time-ordered. The sequence makes
/// IDs created within the same second distinct.
pub(crate) fn generate_session_id(now: DateTime<Utc>) -> String {
    let seq = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("session_{}_{:06}", now.format("%Y%m%d%H%M%S"), seq)
}
