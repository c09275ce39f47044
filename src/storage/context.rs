//! Per-operation cancellation and deadline
//!
//! Every store call takes an [`OpContext`]. Reads are abandoned as soon as the
//! token fires or the deadline passes. Writes check the token once before
//! starting and are then bounded only by the deadline, so a cancelled runner
//! never leaves a write half-applied.

use std::future::{pending, Future};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::StoreError;

/// Cancellation token and deadline attached to a store operation
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancel: Option<CancellationToken>,
    deadline: Option<(Instant, Duration)>,
}

impl OpContext {
    /// Context that never cancels and never times out
    pub fn background() -> Self {
        Self::default()
    }

    /// Context bound to a cancellation token
    pub fn with_cancel(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            deadline: None,
        }
    }

    /// Set a deadline relative to now
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some((Instant::now() + timeout, timeout));
        self
    }

    /// Whether the attached token has fired
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Fail fast if the context is already done
    pub fn check(&self) -> Result<(), StoreError> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        match self.deadline {
            Some((at, timeout)) if Instant::now() >= at => Err(StoreError::TimedOut(timeout)),
            _ => Ok(()),
        }
    }

    /// Run a read, abandoning it on cancellation or deadline
    pub async fn read<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        self.check()?;

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => pending().await,
            }
        };

        tokio::select! {
            biased;
            result = op => result,
            _ = cancelled => Err(StoreError::Cancelled),
            err = self.expired() => Err(err),
        }
    }

    /// Run a write: checked for cancellation up front, then bounded by the deadline only
    pub async fn write<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        self.check()?;

        tokio::select! {
            biased;
            result = op => result,
            err = self.expired() => Err(err),
        }
    }

    async fn expired(&self) -> StoreError {
        match self.deadline {
            Some((at, timeout)) => {
                tokio::time::sleep_until(at).await;
                StoreError::TimedOut(timeout)
            }
            None => pending().await,
        }
    }
}
