use std::collections::HashMap;

use crate::storage::Frame;

/// Consumer-local high-water mark for one session
///
/// Not persisted. A runner that restarts begins with an empty cursor and
/// rescans the session from its first frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCursor {
    last_seen: Option<i64>,
}

impl ReadCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor that treats every index up to and including `index` as seen
    pub fn starting_after(index: i64) -> Self {
        Self {
            last_seen: Some(index),
        }
    }

    pub fn last_seen(&self) -> Option<i64> {
        self.last_seen
    }

    /// The tail of a sorted listing that lies past the cursor
    pub fn unseen<'a>(&self, frames: &'a [Frame]) -> &'a [Frame] {
        match self.last_seen {
            None => frames,
            Some(last) => &frames[frames.partition_point(|f| f.index <= last)..],
        }
    }

    /// Mark `index` as seen; the cursor never moves backwards
    pub fn advance(&mut self, index: i64) {
        self.last_seen = Some(self.last_seen.map_or(index, |last| last.max(index)));
    }

    pub fn reset(&mut self) {
        self.last_seen = None;
    }
}

/// Read cursors keyed by session ID
#[derive(Debug, Default)]
pub struct CursorSet {
    cursors: HashMap<String, ReadCursor>,
}

impl CursorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> ReadCursor {
        self.cursors.get(session_id).copied().unwrap_or_default()
    }

    /// Cursor for `session_id`, created empty on first use
    pub fn get_mut(&mut self, session_id: &str) -> &mut ReadCursor {
        self.cursors.entry(session_id.to_string()).or_default()
    }

    pub fn remove(&mut self, session_id: &str) {
        self.cursors.remove(session_id);
    }

    /// Drop cursors for sessions not in `live`
    ///
    /// A session that was deleted and later reappears is then rescanned from
    /// its first frame.
    pub fn retain_sessions(&mut self, live: &[String]) {
        self.cursors
            .retain(|session_id, _| live.binary_search(session_id).is_ok());
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
