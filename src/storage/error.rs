//! Frame store error types

use std::time::Duration;

use crate::error::ErrorKind;

type Cause = Box<dyn std::error::Error + Send + Sync>;

/// Error type for frame store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Session has no frames in the store
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Session exists but has no frame at this index
    #[error("frame not found: session {session_id}, index {index}")]
    FrameNotFound { session_id: String, index: i64 },

    /// Frame rejected before reaching the backend
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Backend I/O or connection failure
    #[error("backend unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// Persisted entry could not be decoded
    #[error("corrupt frame in session {session_id}: {source}")]
    Corrupt {
        session_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline elapsed
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),
}

impl StoreError {
    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn closed() -> Self {
        Self::unavailable("store is closed")
    }

    /// True for unknown sessions and unknown frame indices
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::SessionNotFound(_) | StoreError::FrameNotFound { .. }
        )
    }

    /// True when the operation was abandoned by its caller's context
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled | StoreError::TimedOut(_))
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidFrame(_) => ErrorKind::Validation,
            StoreError::Cancelled | StoreError::TimedOut(_) => ErrorKind::Cancelled,
            _ => ErrorKind::Storage,
        }
    }
}
