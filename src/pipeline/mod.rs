//! Runner loop building blocks
//!
//! Every runner follows the same shape:
//!
//! ```text
//!   loop {
//!       match poller.next() {
//!           Cancelled        => return Err(Cancelled)
//!           Tick | Changed   => list_frames ─► cursor.unseen() ─► process ─► cursor.advance()
//!       }
//!   }
//! ```
//!
//! A failed list or get is transient: the runner logs it and waits for the
//! next wake. Change notifications cut latency but are never the only signal;
//! the timer always reconciles.

pub mod cursor;
pub mod poller;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::storage::OpContext;

pub use cursor::{CursorSet, ReadCursor};
pub use poller::{Poller, Wake};

/// Timer and per-operation deadline for a runner loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Time between reconciling polls
    pub interval: Duration,

    /// Deadline for each store call
    pub op_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            op_timeout: Duration::from_secs(5),
        }
    }
}

impl PollConfig {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Context for one store call made by a runner
    pub fn op_context(&self, cancel: &CancellationToken) -> OpContext {
        OpContext::with_cancel(cancel.clone()).timeout(self.op_timeout)
    }

    pub fn poller(&self, cancel: CancellationToken) -> Poller {
        Poller::new(self.interval, cancel)
    }
}
