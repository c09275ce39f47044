//! Crate-wide error type
//!
//! Module errors ([`StoreError`], [`PluginError`]) stay precise for callers that
//! match on variants. At component boundaries they fold into [`Error`], which
//! carries an [`ErrorKind`] so callers can branch on the category without
//! depending on message text.

use std::fmt;

use crate::plugin::PluginError;
use crate::storage::StoreError;

/// Result alias used at component boundaries
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad caller input
    Validation,
    /// Backend I/O or consistency failure
    Storage,
    /// Plugin lifecycle failure
    Plugin,
    /// Transport-level failure surfaced by runners
    Network,
    /// Operation cancelled or its deadline elapsed
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Storage => "storage",
            ErrorKind::Plugin => "plugin",
            ErrorKind::Network => "network",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorized error with an optional underlying cause
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create an error without a cause
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check the error category
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

// The converted message names the failing component only; details stay in
// the source so a walk of the chain prints each one once.
impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        Self::with_source(err.kind(), "frame store operation failed", err)
    }
}

impl From<PluginError> for Error {
    fn from(err: PluginError) -> Self {
        Self::with_source(err.kind(), "plugin operation failed", err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_store_error_conversion_keeps_kind_and_cause() {
        let err: Error = StoreError::SessionNotFound("s1".into()).into();

        assert!(err.is(ErrorKind::Storage));
        assert_eq!(err.message(), "frame store operation failed");
        assert!(err.source().unwrap().to_string().contains("s1"));
    }

    #[test]
    fn test_cause_text_appears_once_in_chain() {
        let err: Error = PluginError::NotRunning("camera".into()).into();

        let mut chain = vec![err.to_string()];
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        let mentions = chain.iter().filter(|line| line.contains("camera")).count();
        assert_eq!(mentions, 1);
        assert_eq!(chain[0], "plugin: plugin operation failed");
    }

    #[test]
    fn test_plugin_error_conversion() {
        let err: Error = PluginError::NotRunning("camera".into()).into();
        assert_eq!(err.kind(), ErrorKind::Plugin);

        let err: Error = PluginError::Config {
            message: "fps must be positive".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_display_includes_kind() {
        let err = Error::new(ErrorKind::Network, "sink closed");
        assert_eq!(err.to_string(), "network: sink closed");
        assert!(err.source().is_none());
    }
}
