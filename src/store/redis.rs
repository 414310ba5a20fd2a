//! Redis store backend.
//!
//! Uses `redis::aio::ConnectionManager`, which reconnects on transient
//! failures and is cheaply cloneable. Compound writes execute as atomic
//! `MULTI`/`EXEC` pipelines; the advisory-lock primitive maps to
//! `SET NX PX`. Construction pings the server and fails fast with
//! platform-specific installation hints when nothing answers.

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;

use super::{StoreBackend, StoreOp};
use crate::error::{backend_install_hint, SextantError};

pub struct RedisBackend {
    conn: redis::aio::ConnectionManager,
}

impl RedisBackend {
    /// Connect and ping. An unreachable server is fatal here, not at first
    /// use.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| SextantError::BackendUnreachable {
            url: url.to_string(),
            message: e.to_string(),
            hint: backend_install_hint().to_string(),
        })?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| SextantError::BackendUnreachable {
                url: url.to_string(),
                message: e.to_string(),
                hint: backend_install_hint().to_string(),
            })?;
        let backend = Self { conn };
        backend.ping().await.map_err(|e| SextantError::BackendUnreachable {
            url: url.to_string(),
            message: e.to_string(),
            hint: backend_install_hint().to_string(),
        })?;
        Ok(backend)
    }

    fn io(e: redis::RedisError) -> anyhow::Error {
        SextantError::StoreIo(e.to_string()).into()
    }
}

/// Escape glob metacharacters so a key prefix is matched literally by
/// `SCAN MATCH`.
fn escape_match_pattern(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 4);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl StoreBackend for RedisBackend {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(Self::io)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(Self::io)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        conn.hgetall(key).await.map_err(Self::io)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(Self::io)
    }

    async fn zset_range_desc(
        &self,
        key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<(String, f64)>> {
        let mut conn = self.conn.clone();
        let stop = limit.map(|n| n as isize - 1).unwrap_or(-1);
        redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(0)
            .arg(stop)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await
            .map_err(Self::io)
    }

    async fn zset_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut conn = self.conn.clone();
        conn.zscore(key, member).await.map_err(Self::io)
    }

    async fn set_nx_ttl(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(Self::io)?;
        Ok(reply.is_some())
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in ops {
            match op {
                StoreOp::Put { key, value } => {
                    pipe.set(key, value).ignore();
                }
                StoreOp::Delete { key } => {
                    pipe.del(key).ignore();
                }
                StoreOp::HashPut { key, fields } => {
                    pipe.hset_multiple(key, &fields).ignore();
                }
                StoreOp::HashSetField { key, field, value } => {
                    pipe.hset(key, field, value).ignore();
                }
                StoreOp::SetAdd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
                StoreOp::SetRemove { key, member } => {
                    pipe.srem(key, member).ignore();
                }
                StoreOp::ZAdd { key, member, score } => {
                    pipe.zadd(key, member, score).ignore();
                }
                StoreOp::ZRemove { key, member } => {
                    pipe.zrem(key, member).ignore();
                }
            }
        }
        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn).await.map_err(Self::io)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", escape_match_pattern(prefix));
        let mut keys = Vec::new();
        {
            let mut iter = conn
                .scan_match::<_, String>(&pattern)
                .await
                .map_err(Self::io)?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
