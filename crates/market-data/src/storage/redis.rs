//! Redis cache 구현.

use async_trait::async_trait;
use market_core::RedisConfig;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisResult};
use std::future::Future;
use std::time::Duration;
use tracing::info;

use super::CacheStore;
use crate::error::{DataError, Result};

/// Redis 연결 래퍼.
///
/// `ConnectionManager`가 끊긴 연결을 자동으로 재수립하며, 모든 명령에
/// 타임아웃을 적용합니다.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    command_timeout: Duration,
}

impl RedisCache {
    /// 새로운 Redis cache 연결을 생성합니다.
    pub async fn connect(url: &str, config: &RedisConfig) -> Result<Self> {
        info!("Connecting to Redis...");

        let client = Client::open(url)?;
        let connect_timeout = Duration::from_secs(config.connection_timeout_secs);
        let connection = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| DataError::Timeout("redis connect".to_string()))??;

        info!("Redis connection established");

        Ok(Self {
            connection,
            command_timeout: config.command_timeout(),
        })
    }

    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, f(self.connection.clone())).await {
            Ok(result) => result.map_err(DataError::from),
            Err(_) => Err(DataError::Timeout(format!("redis {}", op))),
        }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run("GET", |mut conn| async move { conn.get(key).await })
            .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.run("SET", |mut conn| async move { conn.set(key, value).await })
            .await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.run("SETEX", |mut conn| async move {
            conn.set_ex(key, value, ttl_secs).await
        })
        .await
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.run("INCR", |mut conn| async move { conn.incr(key, 1).await })
            .await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        self.run("EXPIRE", |mut conn| async move {
            conn.expire(key, ttl_secs as i64).await
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        self.run("TTL", |mut conn| async move { conn.ttl(key).await })
            .await
    }

    async fn ping(&self) -> Result<()> {
        let pong: String = self
            .run("PING", |mut conn| async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(DataError::CacheError(format!("unexpected PING reply: {}", pong)))
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
