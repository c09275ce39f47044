//! Redis keyspace backend
//!
//! Multi-key operations run inside `MULTI`/`EXEC`, so a concurrent client sees
//! either both the list and the set change or neither. Reads also run inside a
//! transaction: membership and range come from the same point in time.

use std::sync::atomic::{AtomicBool, Ordering};

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, RedisError};
use async_trait::async_trait;

use super::config::RedisConfig;
use super::error::StoreError;
use super::keyspace::KvBackend;

/// Redis-backed [`KvBackend`]
///
/// Wraps a reconnecting `ConnectionManager`; clones of it share one
/// multiplexed connection.
pub struct RedisBackend {
    conn: ConnectionManager,
    closed: AtomicBool,
}

fn unavailable(context: &str, err: RedisError) -> StoreError {
    StoreError::Unavailable {
        message: format!("{}: {}", context, err),
        source: Some(Box::new(err)),
    }
}

impl RedisBackend {
    /// Connect and verify the server answers `PING`
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(config.url.as_str())
            .map_err(|e| unavailable("invalid redis url", e))?;

        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| unavailable("redis connection failed", e))?;

        let _: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("redis ping failed", e))?;

        tracing::info!(url = %config.url, prefix = %config.prefix, "Connected to redis");

        Ok(Self {
            conn,
            closed: AtomicBool::new(false),
        })
    }

    fn connection(&self) -> Result<ConnectionManager, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::closed());
        }
        Ok(self.conn.clone())
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn push_and_mark(
        &self,
        list_key: &str,
        value: String,
        set_key: &str,
        member: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection()?;

        let _: () = ::redis::pipe()
            .atomic()
            .rpush(list_key, value)
            .ignore()
            .sadd(set_key, member)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("failed to store frame", e))?;

        Ok(())
    }

    async fn read_if_member(
        &self,
        set_key: &str,
        member: &str,
        list_key: &str,
    ) -> Result<Option<Vec<String>>, StoreError> {
        let mut conn = self.connection()?;

        let (is_member, entries): (bool, Vec<String>) = ::redis::pipe()
            .atomic()
            .sismember(set_key, member)
            .lrange(list_key, 0, -1)
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("failed to read frames", e))?;

        Ok(is_member.then_some(entries))
    }

    async fn members(&self, set_key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection()?;

        let members: Vec<String> = conn
            .smembers(set_key)
            .await
            .map_err(|e| unavailable("failed to list sessions", e))?;
        Ok(members)
    }

    async fn remove_and_unmark(
        &self,
        set_key: &str,
        member: &str,
        list_key: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection()?;

        let (was_member, _deleted, _removed): (bool, i64, i64) = ::redis::pipe()
            .atomic()
            .sismember(set_key, member)
            .del(list_key)
            .srem(set_key, member)
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("failed to delete session", e))?;

        Ok(was_member)
    }

    async fn close(&self) -> Result<(), StoreError> {
        // The multiplexed connection drops with the last clone
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
