use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::storage::{FrameEvent, FrameStore};

/// Why a runner loop woke up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wake {
    /// Poll interval elapsed, or notifications were missed; reconcile by listing
    Tick,
    /// A watched session changed
    Changed(FrameEvent),
    /// The runner must finish and return
    Cancelled,
}

struct Watch {
    store: Arc<dyn FrameStore>,
    session_id: String,
    events: broadcast::Receiver<FrameEvent>,
}

/// Suspension point of a runner loop
///
/// Waits on the cancellation token, the poll timer and, when watching a
/// session, its change notifications. Cancellation wins when several are ready.
/// The first call returns [`Wake::Tick`] immediately.
pub struct Poller {
    ticker: Interval,
    cancel: CancellationToken,
    watch: Option<Watch>,
}

impl Poller {
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            cancel,
            watch: None,
        }
    }

    /// Also wake on changes to `session_id`
    pub fn watch(mut self, store: Arc<dyn FrameStore>, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let events = store.subscribe(&session_id);
        self.watch = Some(Watch {
            store,
            session_id,
            events,
        });
        self
    }

    pub async fn next(&mut self) -> Wake {
        let Self {
            ticker,
            cancel,
            watch,
        } = self;

        loop {
            let changed = async {
                match watch.as_mut() {
                    Some(watch) => watch.events.recv().await,
                    None => std::future::pending().await,
                }
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Wake::Cancelled,
                _ = ticker.tick() => return Wake::Tick,
                result = changed => result,
            };

            match result {
                Ok(event) => return Wake::Changed(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Change notifications lagged");
                    return Wake::Tick;
                }
                Err(RecvError::Closed) => {
                    // The channel is dropped on session delete; a new one
                    // is created if the session comes back
                    if let Some(watch) = watch.as_mut() {
                        watch.events = watch.store.subscribe(&watch.session_id);
                    }
                }
            }
        }
    }
}
