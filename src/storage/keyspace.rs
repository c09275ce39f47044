//! List/set keyspace used by the persistent store
//!
//! [`KvBackend`] is the small slice of a Redis-style keyspace that
//! [`PersistentStore`](super::PersistentStore) needs. Every method that touches
//! more than one key must apply atomically, so a reader never observes a list
//! without its set membership or the other way round.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::StoreError;

/// Atomic list + set operations
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Append `value` to `list_key` and add `member` to `set_key`, atomically
    async fn push_and_mark(
        &self,
        list_key: &str,
        value: String,
        set_key: &str,
        member: &str,
    ) -> Result<(), StoreError>;

    /// Read the whole of `list_key` if `member` is in `set_key`, atomically
    ///
    /// Returns `None` when `member` is absent.
    async fn read_if_member(
        &self,
        set_key: &str,
        member: &str,
        list_key: &str,
    ) -> Result<Option<Vec<String>>, StoreError>;

    /// All members of `set_key`, in no particular order
    async fn members(&self, set_key: &str) -> Result<Vec<String>, StoreError>;

    /// Delete `list_key` and remove `member` from `set_key`, atomically
    ///
    /// Returns whether `member` was present.
    async fn remove_and_unmark(
        &self,
        set_key: &str,
        member: &str,
        list_key: &str,
    ) -> Result<bool, StoreError>;

    /// Release connections
    async fn close(&self) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Keyspace {
    lists: HashMap<String, Vec<String>>,
    sets: HashMap<String, BTreeSet<String>>,
    closed: bool,
}

impl Keyspace {
    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::closed());
        }
        Ok(())
    }
}

/// Embedded keyspace with Redis list/set semantics
///
/// One mutex guards every key, which makes each method trivially atomic.
/// Useful for single-process deployments that want the persistent layout, and
/// for exercising [`PersistentStore`](super::PersistentStore) without a server.
#[derive(Default)]
pub struct MemoryKeyspace {
    inner: Mutex<Keyspace>,
}

impl MemoryKeyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entries of a list, in append order
    pub fn list(&self, key: &str) -> Vec<String> {
        self.inner.lock().lists.get(key).cloned().unwrap_or_default()
    }

    /// Raw members of a set, sorted
    pub fn set(&self, key: &str) -> Vec<String> {
        self.inner
            .lock()
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append a raw entry without touching any set
    pub fn push_raw(&self, key: &str, value: impl Into<String>) {
        self.inner
            .lock()
            .lists
            .entry(key.to_string())
            .or_default()
            .push(value.into());
    }
}

#[async_trait]
impl KvBackend for MemoryKeyspace {
    fn name(&self) -> &'static str {
        "keyspace"
    }

    async fn push_and_mark(
        &self,
        list_key: &str,
        value: String,
        set_key: &str,
        member: &str,
    ) -> Result<(), StoreError> {
        let mut ks = self.inner.lock();
        ks.check_open()?;
        ks.lists.entry(list_key.to_string()).or_default().push(value);
        ks.sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn read_if_member(
        &self,
        set_key: &str,
        member: &str,
        list_key: &str,
    ) -> Result<Option<Vec<String>>, StoreError> {
        let ks = self.inner.lock();
        ks.check_open()?;
        let is_member = ks.sets.get(set_key).is_some_and(|s| s.contains(member));
        if !is_member {
            return Ok(None);
        }
        Ok(Some(ks.lists.get(list_key).cloned().unwrap_or_default()))
    }

    async fn members(&self, set_key: &str) -> Result<Vec<String>, StoreError> {
        let ks = self.inner.lock();
        ks.check_open()?;
        Ok(ks
            .sets
            .get(set_key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_and_unmark(
        &self,
        set_key: &str,
        member: &str,
        list_key: &str,
    ) -> Result<bool, StoreError> {
        let mut ks = self.inner.lock();
        ks.check_open()?;
        ks.lists.remove(list_key);
        let was_member = ks
            .sets
            .get_mut(set_key)
            .is_some_and(|s| s.remove(member));
        if ks.sets.get(set_key).is_some_and(BTreeSet::is_empty) {
            ks.sets.remove(set_key);
        }
        Ok(was_member)
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut ks = self.inner.lock();
        ks.lists.clear();
        ks.sets.clear();
        ks.closed = true;
        Ok(())
    }
}
