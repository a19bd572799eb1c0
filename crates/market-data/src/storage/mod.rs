//! 캐시 저장소.
//!
//! - [`CacheStore`]: 키별 TTL을 지원하는 키-값 저장소 추상화
//! - [`RedisCache`]: Redis 구현 (운영)
//! - `MemoryCache`: 인메모리 구현 (테스트, `test-utils` 기능)
//!
//! 여러 프로세스 간 조정(갱신 경쟁, rate limit 카운터)은 모두 저장소의
//! 원자적 연산에 위임합니다.

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryCache;
pub use self::redis::RedisCache;

/// 잘 알려진 캐시 키.
pub mod keys {
    /// 데이터셋 (JSON)
    pub const MARKET_DATA: &str = "market_data";
    /// 마지막 추세 시퀀스 갱신 시각 (epoch 밀리초 문자열)
    pub const LAST_TREND_UPDATE: &str = "last_sparkline_update";

    /// Rate limit 카운터 키.
    pub fn rate_limit(identity: &str) -> String {
        format!("rate:{}", identity)
    }
}

/// 키별 만료를 지원하는 원시 문자열 키-값 저장소.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 값을 가져옵니다. 없으면 `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 만료 없이 값을 설정합니다.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// TTL과 함께 값을 설정합니다.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// 정수 카운터를 원자적으로 1 증가시키고 증가된 값을 반환합니다.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// 기존 키에 TTL을 설정합니다. 키가 없으면 `false`.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool>;

    /// 남은 TTL(초). 키가 없으면 -2, 만료가 없으면 -1.
    async fn ttl(&self, key: &str) -> Result<i64>;

    /// 연결 상태를 확인합니다.
    async fn ping(&self) -> Result<()>;

    /// 백엔드 이름 (로그/헬스 체크용).
    fn backend(&self) -> &'static str;
}

/// JSON 직렬화 헬퍼.
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_json_ex<T>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_string(value)?;
        self.set_ex(key, &json, ttl_secs).await
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}
