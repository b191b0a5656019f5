//! Redis backend for the [`Kv`] trait.
//!
//! The logical database number is baked into the connection URL and
//! selected once. [`redis::aio::ConnectionManager`] is the pooled
//! accessor: clones share one multiplexed connection and reconnect
//! transparently; errors during a command still propagate to the caller.

use crate::error::Result;
use crate::kv::{Kv, KvOp};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;

pub struct RedisKv {
    manager: ConnectionManager,
}

impl RedisKv {
    /// Connect to `host:port` and select logical database `db`.
    pub async fn connect(host: &str, port: u16, db: u32) -> Result<Self> {
        let url = format!("redis://{host}:{port}/{db}");
        let client = redis::Client::open(url.as_str())?;
        let manager = ConnectionManager::new(client).await?;
        tracing::info!(host = %host, port = port, db = db, "KV store connected");
        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl Kv for RedisKv {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let v: Option<String> = self.conn().hget(key, field).await?;
        Ok(v)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let _: i64 = self.conn().hset(key, field, value).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let v: HashMap<String, String> = self.conn().hgetall(key).await?;
        Ok(v)
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let v: i64 = self.conn().hincr(key, field, delta).await?;
        Ok(v)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let _: i64 = self.conn().sadd(key, member).await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        let _: i64 = self.conn().srem(key, member).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let v: Vec<String> = self.conn().smembers(key).await?;
        Ok(v)
    }

    async fn zadd(&self, key: &str, score: i64, member: &str) -> Result<()> {
        let _: i64 = self.conn().zadd(key, member, score).await?;
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        let _: i64 = self.conn().zrem(key, member).await?;
        Ok(())
    }

    async fn zrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, i64)>> {
        let v: Vec<(String, i64)> = self.conn().zrange_withscores(key, start, stop).await?;
        Ok(v)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let _: i64 = self.conn().del(key).await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let v: Vec<String> = self.conn().keys(pattern).await?;
        Ok(v)
    }

    async fn tx(&self, ops: Vec<KvOp>) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            match op {
                KvOp::Hset { key, field, value } => {
                    pipe.hset(key, field, value).ignore();
                }
                KvOp::HsetAll { key, fields } => {
                    pipe.hset_multiple(key, fields).ignore();
                }
                KvOp::Sadd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
                KvOp::Srem { key, member } => {
                    pipe.srem(key, member).ignore();
                }
                KvOp::Zadd { key, score, member } => {
                    pipe.zadd(key, member, *score).ignore();
                }
                KvOp::Zrem { key, member } => {
                    pipe.zrem(key, member).ignore();
                }
                KvOp::Del { key } => {
                    pipe.del(key).ignore();
                }
            }
        }
        let mut conn = self.conn();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
